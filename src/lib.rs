//! # banana-dqn - Deep Q-Network agent for the banana collector task
//!
//! An agent moves through a square world, collecting yellow bananas (+1) and
//! avoiding blue ones (-1). It observes a 37-dimensional state vector and picks
//! one of 4 discrete actions. The task counts as solved once the average score
//! over 100 consecutive episodes reaches 13.
//!
//! The crate provides the pieces of a classic DQN setup, all on `ndarray`:
//!
//! - **Action-value model**: a feed-forward network with optional batch
//!   normalization and dropout per hidden layer
//! - **Experience buffer**: bounded FIFO replay memory with uniform sampling
//! - **Agent**: epsilon-greedy acting, periodic learning from replayed
//!   mini-batches, soft-updated target network
//! - **Training loop**: episode state machine with epsilon decay, a
//!   100-episode running average and a one-shot "solved" marker
//!
//! The simulator itself lives outside the crate and is reached through the
//! [`env::Environment`] trait.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use banana_dqn::agent::DqnAgentBuilder;
//! use banana_dqn::env::ProcessEnvironment;
//! use banana_dqn::trainer::{Trainer, TrainerConfig};
//!
//! let mut env = ProcessEnvironment::spawn("./Banana_Linux/Banana.x86_64", true).unwrap();
//! let mut agent = DqnAgentBuilder::new()
//!     .state_size(37)
//!     .action_size(4)
//!     .hidden_widths(&[64, 64])
//!     .seed(42)
//!     .build()
//!     .unwrap();
//!
//! let mut trainer = Trainer::new(TrainerConfig::default()).unwrap();
//! let outcome = trainer.run(&mut agent, &mut env).unwrap();
//! println!("solved at {:?}", outcome.solved_episode);
//! ```
//!
//! ## Module Organization
//!
//! - [`activations`] - Hidden-layer activation (ReLU)
//! - [`agent`] - The DQN agent and the [`agent::Agent`] trait
//! - [`builders`] - Builder patterns for convenient object construction
//! - [`config`] - Flat run configuration (JSON + CLI)
//! - [`env`] - Environment trait and the subprocess simulator client
//! - [`error`] - Error types and result handling
//! - [`layers`] - Neural network layers (Dense, BatchNorm, Dropout)
//! - [`loss`] - Loss functions for training
//! - [`metrics`] - Score statistics and running curves
//! - [`network`] - Action-value network and parameter snapshots
//! - [`optimizer`] - Optimization algorithms
//! - [`replay_buffer`] - Experience replay
//! - [`trainer`] - Training loop and greedy evaluation
//! - [`visualization`] - Score plot, CSV export and text summaries

pub mod activations;
pub mod agent;
pub mod builders;
pub mod config;
pub mod env;
pub mod error;
pub mod layers;
pub mod loss;
pub mod metrics;
pub mod network;
pub mod optimizer;
pub mod replay_buffer;
pub mod trainer;
pub mod visualization;

#[cfg(test)]
mod tests;
