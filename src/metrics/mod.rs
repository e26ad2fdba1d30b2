pub mod curves;
pub mod statistics;

pub use curves::ScoreCurves;
pub use statistics::{mean, median, Statistics};
