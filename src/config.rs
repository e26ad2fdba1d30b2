//! Flat run configuration and its projections onto component configs.
//!
//! A [`Config`] can be read from JSON (missing keys fall back to their
//! defaults) and is written next to the training artifacts so a run can be
//! reproduced.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::agent::AgentConfig;
use crate::error::{DqnError, Result};
use crate::network::NetworkConfig;
use crate::trainer::TrainerConfig;

/// Seed used for every random generator of a deterministic run
pub const DETERMINISTIC_SEED: u64 = 42;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Simulator executable
    pub env_path: PathBuf,
    /// Directory receiving model, plot, score CSV and config
    pub output_dir: PathBuf,
    pub no_graphics: bool,

    pub success_threshold: f32,
    /// Width of every hidden layer
    pub hidden_width: usize,
    /// Hidden layers beyond the first one
    pub hidden_count: usize,
    pub use_normalization: bool,
    pub dropout_prob: f32,
    /// Compute device; only the CPU is available
    pub device: Option<String>,
    pub deterministic: bool,

    pub batch_size: usize,
    pub buffer_size: usize,
    pub learning_rate: f32,
    pub n_episodes: usize,
    pub gamma: f32,
    pub tau: f32,
    pub update_every: usize,
    pub eps_start: f32,
    pub eps_end: f32,
    pub eps_decay: f32,
    pub max_t: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            env_path: PathBuf::from("./Banana_Linux/Banana.x86_64"),
            output_dir: PathBuf::from("./outputs"),
            no_graphics: false,
            success_threshold: 13.0,
            hidden_width: 64,
            hidden_count: 1,
            use_normalization: false,
            dropout_prob: 0.0,
            device: None,
            deterministic: false,
            batch_size: 64,
            buffer_size: 100_000,
            learning_rate: 5e-4,
            n_episodes: 500,
            gamma: 0.99,
            tau: 1e-3,
            update_every: 4,
            eps_start: 1.0,
            eps_end: 0.02,
            eps_decay: 0.98,
            max_t: 1000,
        }
    }
}

impl Config {
    /// Load a configuration file; absent keys keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Check every setting that does not depend on the environment
    pub fn validate(&self) -> Result<()> {
        if self.hidden_width == 0 {
            return Err(DqnError::invalid_parameter("hidden_width", "must be positive"));
        }
        if let Some(device) = &self.device {
            if device != "cpu" {
                return Err(DqnError::invalid_parameter(
                    "device".to_string(),
                    format!("unsupported device '{}', only 'cpu' is available", device),
                ));
            }
        }
        if !(0.0..1.0).contains(&self.dropout_prob) {
            return Err(DqnError::invalid_parameter(
                "dropout_prob".to_string(),
                format!("must be in [0, 1), got {}", self.dropout_prob),
            ));
        }
        self.agent_config().validate()?;
        self.trainer_config().validate()
    }

    /// Seed for the run's random generators, `None` for an entropy seed
    pub fn seed(&self) -> Option<u64> {
        if self.deterministic {
            Some(DETERMINISTIC_SEED)
        } else {
            None
        }
    }

    pub fn hidden_widths(&self) -> Vec<usize> {
        vec![self.hidden_width; 1 + self.hidden_count]
    }

    pub fn network_config(&self, state_size: usize, action_size: usize) -> NetworkConfig {
        NetworkConfig {
            state_size,
            action_size,
            hidden_widths: self.hidden_widths(),
            use_normalization: self.use_normalization,
            dropout_prob: self.dropout_prob,
        }
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            buffer_size: self.buffer_size,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            gamma: self.gamma,
            tau: self.tau,
            update_every: self.update_every,
        }
    }

    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig {
            n_episodes: self.n_episodes,
            max_t: self.max_t,
            eps_start: self.eps_start,
            eps_end: self.eps_end,
            eps_decay: self.eps_decay,
            success_threshold: self.success_threshold,
        }
    }
}
