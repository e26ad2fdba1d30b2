//! # Activation Functions
//!
//! Nonlinearities used between the fully-connected layers of the
//! action-value network. Hidden blocks use [`Activation::Relu`]; the output
//! layer applies none so that Q-value estimates are unbounded.

pub mod functions;

pub use functions::Activation;
