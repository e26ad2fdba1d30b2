//! # Training loop
//!
//! Drives an [`Agent`] against an [`Environment`] for a fixed number of
//! episodes. The loop is an explicit state machine:
//!
//! ```text
//! EpisodeReset ──► Stepping ──(done | max_t)──► EpisodeEnd ──► EpisodeReset
//!      │
//!      └──(n_episodes reached)──► Finished
//! ```
//!
//! At the end of each episode the score enters the 100-episode window,
//! epsilon decays geometrically towards its floor and the success check runs.
//! "Solved" is an achievement marker: once set it is never cleared.

use std::collections::VecDeque;

use ndarray::Array1;
use serde::{Serialize, Deserialize};
use tracing::{debug, info, warn};

use crate::agent::{greedy_action, Agent};
use crate::env::{Environment, StepOutcome};
use crate::error::{DqnError, Result};
use crate::layers::Mode;
use crate::network::QNetwork;
use crate::visualization::training_progress;

/// Number of most recent episodes the running average is computed over
pub const SCORE_WINDOW: usize = 100;

/// Episodes between two progress lines
const PROGRESS_EVERY: usize = 100;

/// Loop-level settings of a training run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub n_episodes: usize,
    /// Step budget of one episode
    pub max_t: usize,
    pub eps_start: f32,
    pub eps_end: f32,
    pub eps_decay: f32,
    /// Running average over [`SCORE_WINDOW`] episodes that counts as solved
    pub success_threshold: f32,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            n_episodes: 2000,
            max_t: 1000,
            eps_start: 1.0,
            eps_end: 0.01,
            eps_decay: 0.995,
            success_threshold: 13.0,
        }
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_t == 0 {
            return Err(DqnError::invalid_parameter("max_t", "must be positive"));
        }
        if !self.success_threshold.is_finite() {
            return Err(DqnError::invalid_parameter("success_threshold", "must be finite"));
        }
        EpsilonSchedule::new(self.eps_start, self.eps_end, self.eps_decay).map(|_| ())
    }
}

/// Floor-clamped geometric decay: `eps <- max(end, decay * eps)` once per episode
#[derive(Clone, Debug, PartialEq)]
pub struct EpsilonSchedule {
    start: f32,
    end: f32,
    decay: f32,
    current: f32,
}

impl EpsilonSchedule {
    pub fn new(start: f32, end: f32, decay: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&start) || !(0.0..=1.0).contains(&end) {
            return Err(DqnError::invalid_parameter(
                "epsilon".to_string(),
                format!("start {} and end {} must lie in [0, 1]", start, end),
            ));
        }
        if end > start {
            return Err(DqnError::invalid_parameter(
                "eps_end".to_string(),
                format!("{} is above eps_start {}", end, start),
            ));
        }
        if !(decay > 0.0 && decay <= 1.0) {
            return Err(DqnError::invalid_parameter(
                "eps_decay".to_string(),
                format!("must be in (0, 1], got {}", decay),
            ));
        }
        Ok(EpsilonSchedule { start, end, decay, current: start })
    }

    pub fn epsilon(&self) -> f32 {
        self.current
    }

    pub fn start(&self) -> f32 {
        self.start
    }

    pub fn end(&self) -> f32 {
        self.end
    }

    /// Decay once and return the new value
    pub fn advance(&mut self) -> f32 {
        self.current = self.end.max(self.decay * self.current);
        self.current
    }
}

/// Sliding window over the most recent episode scores
#[derive(Clone, Debug, Default)]
pub struct ScoreWindow {
    scores: VecDeque<f32>,
    capacity: usize,
}

impl ScoreWindow {
    pub fn new(capacity: usize) -> Self {
        ScoreWindow {
            scores: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, score: f32) {
        if self.capacity == 0 {
            return;
        }
        if self.scores.len() == self.capacity {
            self.scores.pop_front();
        }
        self.scores.push_back(score);
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Mean of the window, 0 when empty
    pub fn mean(&self) -> f32 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().sum::<f32>() / self.scores.len() as f32
    }

    pub fn iter(&self) -> impl Iterator<Item = &f32> {
        self.scores.iter()
    }
}

/// Remembers the first episode whose running average reached the threshold
#[derive(Clone, Debug, PartialEq)]
pub struct SuccessTracker {
    threshold: f32,
    solved_episode: Option<usize>,
}

impl SuccessTracker {
    pub fn new(threshold: f32) -> Self {
        SuccessTracker { threshold, solved_episode: None }
    }

    /// Returns `true` exactly once: the first time `running_mean >= threshold`
    pub fn observe(&mut self, episode: usize, running_mean: f32) -> bool {
        if self.solved_episode.is_none() && running_mean >= self.threshold {
            self.solved_episode = Some(episode);
            return true;
        }
        false
    }

    pub fn solved(&self) -> bool {
        self.solved_episode.is_some()
    }

    pub fn solved_episode(&self) -> Option<usize> {
        self.solved_episode
    }
}

/// What happened at the end of one episode
#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeSummary {
    pub episode: usize,
    pub score: f32,
    pub running_mean: f32,
    pub epsilon: f32,
    /// Set only on the episode that first reached the threshold
    pub newly_solved: bool,
}

/// Result of a complete training run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingOutcome {
    /// Score of every episode, in order
    pub scores: Vec<f32>,
    /// 1-based episode at which the task was first solved
    pub solved_episode: Option<usize>,
    pub final_epsilon: f32,
    pub total_steps: usize,
}

enum Phase {
    EpisodeReset,
    Stepping { state: Array1<f32>, t: usize, score: f32 },
    EpisodeEnd { score: f32 },
    Finished,
}

/// Episode/step driver holding the run state
pub struct Trainer {
    config: TrainerConfig,
    schedule: EpsilonSchedule,
    window: ScoreWindow,
    success: SuccessTracker,
    scores: Vec<f32>,
    episode: usize,
    total_steps: usize,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Result<Self> {
        config.validate()?;
        let schedule = EpsilonSchedule::new(config.eps_start, config.eps_end, config.eps_decay)?;
        let success = SuccessTracker::new(config.success_threshold);
        Ok(Trainer {
            config,
            schedule,
            window: ScoreWindow::new(SCORE_WINDOW),
            success,
            scores: Vec::new(),
            episode: 0,
            total_steps: 0,
        })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn epsilon(&self) -> f32 {
        self.schedule.epsilon()
    }

    pub fn episode(&self) -> usize {
        self.episode
    }

    pub fn window(&self) -> &ScoreWindow {
        &self.window
    }

    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    pub fn solved(&self) -> bool {
        self.success.solved()
    }

    /// Run the configured number of episodes, then close `env`.
    ///
    /// The environment is closed on every exit path; an error from the run
    /// takes precedence over an error from closing.
    pub fn run<A, E>(&mut self, agent: &mut A, env: &mut E) -> Result<TrainingOutcome>
    where
        A: Agent,
        E: Environment,
    {
        let result = self.drive(agent, env);
        let closed = env.close();
        match (result, closed) {
            (Ok(outcome), Ok(())) => Ok(outcome),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!("closing environment after failure also failed: {}", close_err);
                Err(e)
            }
        }
    }

    fn drive<A, E>(&mut self, agent: &mut A, env: &mut E) -> Result<TrainingOutcome>
    where
        A: Agent,
        E: Environment,
    {
        if agent.state_size() != env.state_size() || agent.action_size() != env.action_size() {
            return Err(DqnError::dimension_mismatch(
                format!("environment {}x{}", agent.state_size(), agent.action_size()),
                format!("{}x{}", env.state_size(), env.action_size()),
            ));
        }

        let mut phase = Phase::EpisodeReset;
        loop {
            phase = match phase {
                Phase::EpisodeReset => {
                    if self.episode >= self.config.n_episodes {
                        Phase::Finished
                    } else {
                        let state = env.reset(true)?;
                        Phase::Stepping { state, t: 0, score: 0.0 }
                    }
                }
                Phase::Stepping { state, t, score } => {
                    if t >= self.config.max_t {
                        Phase::EpisodeEnd { score }
                    } else {
                        let action = agent.act(state.view(), self.schedule.epsilon())?;
                        let StepOutcome { next_state, reward, done } = env.step(action)?;
                        agent.step(state.view(), action, reward, next_state.view(), done)?;
                        self.total_steps += 1;

                        let score = score + reward;
                        if done {
                            Phase::EpisodeEnd { score }
                        } else {
                            Phase::Stepping { state: next_state, t: t + 1, score }
                        }
                    }
                }
                Phase::EpisodeEnd { score } => {
                    self.end_episode(score);
                    Phase::EpisodeReset
                }
                Phase::Finished => break,
            };
        }

        Ok(TrainingOutcome {
            scores: self.scores.clone(),
            solved_episode: self.success.solved_episode(),
            final_epsilon: self.schedule.epsilon(),
            total_steps: self.total_steps,
        })
    }

    /// Book-keeping for a finished episode: history, window, epsilon decay
    /// and the one-shot success check.
    pub fn end_episode(&mut self, score: f32) -> EpisodeSummary {
        self.episode += 1;
        self.scores.push(score);
        self.window.push(score);
        let epsilon = self.schedule.advance();

        let running_mean = self.window.mean();
        debug!(episode = self.episode, score, running_mean, epsilon, "episode finished");

        if self.episode % PROGRESS_EVERY == 0 {
            info!(
                "{}",
                training_progress(self.episode, self.config.n_episodes, running_mean, epsilon)
            );
        }

        let newly_solved = self.success.observe(self.episode, running_mean);
        if newly_solved {
            info!(
                "Solved in {} episodes! avg score: {:.2} eps: {:.4}",
                self.episode, running_mean, epsilon
            );
        }

        EpisodeSummary {
            episode: self.episode,
            score,
            running_mean,
            epsilon,
            newly_solved,
        }
    }
}

/// Play `episodes` greedy episodes with a trained network, then close `env`.
///
/// The network runs in inference mode and no learning happens. Returns the
/// score of each episode.
pub fn evaluate<E: Environment>(
    network: &mut QNetwork,
    env: &mut E,
    episodes: usize,
    max_t: usize,
) -> Result<Vec<f32>> {
    let result = play_greedy(network, env, episodes, max_t);
    let closed = env.close();
    let scores = result?;
    closed?;
    Ok(scores)
}

fn play_greedy<E: Environment>(
    network: &mut QNetwork,
    env: &mut E,
    episodes: usize,
    max_t: usize,
) -> Result<Vec<f32>> {
    if network.state_size() != env.state_size() || network.action_size() != env.action_size() {
        return Err(DqnError::dimension_mismatch(
            format!("environment {}x{}", network.state_size(), network.action_size()),
            format!("{}x{}", env.state_size(), env.action_size()),
        ));
    }

    let mut scores = Vec::with_capacity(episodes);
    for episode in 1..=episodes {
        let mut state = env.reset(false)?;
        let mut score = 0.0;
        for _ in 0..max_t {
            let q_values = network.forward(state.view(), Mode::Eval)?;
            let action = greedy_action(q_values.view())?;
            let StepOutcome { next_state, reward, done } = env.step(action)?;
            score += reward;
            state = next_state;
            if done {
                break;
            }
        }
        info!(episode, score, "evaluation episode finished");
        scores.push(score);
    }
    Ok(scores)
}
