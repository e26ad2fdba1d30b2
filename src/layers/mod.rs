//! # Layers
//!
//! Building blocks of the action-value network. Every layer works on
//! mini-batches (`rows = samples`) and caches what it needs for the backward
//! pass only when run in [`Mode::Train`].

pub mod traits;
pub mod dense;
pub mod batch_norm;
pub mod dropout;
pub mod initialization;

pub use traits::{Layer, Mode};
pub use dense::DenseLayer;
pub use batch_norm::BatchNormLayer;
pub use dropout::DropoutLayer;
pub use initialization::fan_in_uniform;
