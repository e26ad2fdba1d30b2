//! # Agents
//!
//! The [`DqnAgent`] learns an action-value function with experience replay
//! and a soft-updated target network:
//!
//! - **Acting**: epsilon-greedy over the local network, evaluated in
//!   inference mode (no dropout, running batch-norm statistics). The caller
//!   owns epsilon.
//! - **Stepping**: every transition is stored; every `update_every` steps,
//!   once the buffer holds a full batch, one learning update runs.
//! - **Learning**: TD targets `r + gamma * max_a' Q_target(s', a') * (1 - done)`,
//!   one MSE gradient step on the local network, then a Polyak update of the
//!   target network with rate `tau`.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use banana_dqn::agent::{Agent, DqnAgentBuilder};
//! use ndarray::array;
//!
//! let mut agent = DqnAgentBuilder::new()
//!     .state_size(4)
//!     .action_size(3)
//!     .hidden_widths(&[64, 64])
//!     .seed(42)
//!     .build()
//!     .unwrap();
//!
//! let state = array![0.1, 0.2, -0.3, 0.4];
//! let action = agent.act(state.view(), 0.1).unwrap();
//! let next_state = array![0.0, 0.1, -0.2, 0.5];
//! agent.step(state.view(), action, 1.0, next_state.view(), false).unwrap();
//! ```

pub mod traits;

mod dqn;
pub use dqn::{greedy_action, AgentConfig, DqnAgent, DqnAgentBuilder};
pub use traits::Agent;
