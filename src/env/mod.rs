//! # Environment collaborator
//!
//! The simulator is an external process; the training loop only needs
//! fixed-width vector observations and scalar reward/done signals, which is
//! all the [`Environment`] trait exposes.

pub mod process;

pub use process::ProcessEnvironment;

use ndarray::Array1;
use crate::error::Result;

/// Result of advancing the environment by one action
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutcome {
    pub next_state: Array1<f32>,
    pub reward: f32,
    pub done: bool,
}

/// Step/reset protocol of a single-agent episodic environment
pub trait Environment {
    /// Width of every observation
    fn state_size(&self) -> usize;

    /// Number of discrete actions
    fn action_size(&self) -> usize;

    /// Start a new episode and return the initial observation
    fn reset(&mut self, train_mode: bool) -> Result<Array1<f32>>;

    /// Apply `action` to the current episode
    fn step(&mut self, action: usize) -> Result<StepOutcome>;

    /// Release the underlying resources. Must be safe to call more than once.
    fn close(&mut self) -> Result<()>;
}
