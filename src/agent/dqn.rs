use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::builders::ReplayBufferBuilder;
use crate::error::{DqnError, Result};
use crate::layers::Mode;
use crate::loss::{Loss, MSE};
use crate::network::{NetworkConfig, QNetwork};
use crate::optimizer::{Adam, OptimizerWrapper};
use crate::replay_buffer::{ReplayBuffer, Transition};
use super::traits::Agent;

/// Learning hyperparameters of a [`DqnAgent`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Replay buffer capacity
    pub buffer_size: usize,
    /// Mini-batch size
    pub batch_size: usize,
    pub learning_rate: f32,
    /// Discount factor
    pub gamma: f32,
    /// Soft update rate of the target network
    pub tau: f32,
    /// Environment steps between learning attempts
    pub update_every: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            buffer_size: 100_000,
            batch_size: 64,
            learning_rate: 5e-4,
            gamma: 0.99,
            tau: 1e-3,
            update_every: 4,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(DqnError::invalid_parameter("buffer_size", "must be positive"));
        }
        if self.batch_size == 0 {
            return Err(DqnError::invalid_parameter("batch_size", "must be positive"));
        }
        if self.batch_size > self.buffer_size {
            return Err(DqnError::invalid_parameter(
                "batch_size".to_string(),
                format!("{} exceeds buffer_size {}", self.batch_size, self.buffer_size),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(DqnError::invalid_parameter("learning_rate", "must be a positive number"));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(DqnError::invalid_parameter("gamma", "must be in [0, 1]"));
        }
        if !(self.tau > 0.0 && self.tau <= 1.0) {
            return Err(DqnError::invalid_parameter("tau", "must be in (0, 1]"));
        }
        if self.update_every == 0 {
            return Err(DqnError::invalid_parameter("update_every", "must be positive"));
        }
        Ok(())
    }
}

/// Index of the largest value, the lowest index winning ties
pub fn greedy_action(q_values: ArrayView1<f32>) -> Result<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &q) in q_values.iter().enumerate() {
        if q.is_nan() {
            return Err(DqnError::NumericalError(format!("Q-value for action {} is NaN", i)));
        }
        match best {
            Some((_, b)) if q <= b => {}
            _ => best = Some((i, q)),
        }
    }
    best.map(|(i, _)| i)
        .ok_or_else(|| DqnError::NumericalError("No valid Q-values".to_string()))
}

/// Deep Q-Network agent with experience replay and a soft-updated target network
///
/// # Example
///
/// ```rust
/// use banana_dqn::agent::{AgentConfig, DqnAgent};
/// use banana_dqn::network::NetworkConfig;
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
///
/// let mut rng = ChaCha8Rng::seed_from_u64(42);
/// let network = NetworkConfig::new(37, 4, vec![64, 64]);
/// let agent = DqnAgent::new(network, AgentConfig::default(), &mut rng).unwrap();
/// assert_eq!(agent.memory().len(), 0);
/// ```
pub struct DqnAgent {
    /// Network trained by gradient descent and used for acting
    pub local: QNetwork,

    /// Slowly tracking copy used to compute learning targets
    pub target: QNetwork,

    memory: ReplayBuffer,
    optimizer: OptimizerWrapper,
    config: AgentConfig,
    t_step: usize,
    learn_steps: usize,
    last_loss: Option<f32>,
    rng: ChaCha8Rng,
}

impl DqnAgent {
    /// Create an agent with an Adam optimizer. Both networks and the agent's
    /// own sampling stream are drawn from `rng`.
    pub fn new<R: Rng + ?Sized>(network: NetworkConfig, config: AgentConfig, rng: &mut R) -> Result<Self> {
        Self::with_optimizer(network, config, OptimizerWrapper::Adam(Adam::default()), rng)
    }

    pub fn with_optimizer<R: Rng + ?Sized>(
        network: NetworkConfig,
        config: AgentConfig,
        optimizer: OptimizerWrapper,
        rng: &mut R,
    ) -> Result<Self> {
        config.validate()?;
        let local = QNetwork::new(network.clone(), rng)?;
        let target = QNetwork::new(network, rng)?;
        let memory = ReplayBufferBuilder::new().capacity(config.buffer_size).build()?;

        Ok(DqnAgent {
            local,
            target,
            memory,
            optimizer,
            config,
            t_step: 0,
            learn_steps: 0,
            last_loss: None,
            rng: ChaCha8Rng::seed_from_u64(rng.gen()),
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn memory(&self) -> &ReplayBuffer {
        &self.memory
    }

    pub fn state_size(&self) -> usize {
        self.local.state_size()
    }

    pub fn action_size(&self) -> usize {
        self.local.action_size()
    }

    /// Environment steps recorded so far
    pub fn t_step(&self) -> usize {
        self.t_step
    }

    /// Learning updates performed so far
    pub fn learn_steps(&self) -> usize {
        self.learn_steps
    }

    /// Loss of the most recent learning update
    pub fn last_loss(&self) -> Option<f32> {
        self.last_loss
    }

    fn check_state(&self, state: ArrayView1<f32>) -> Result<()> {
        if state.len() != self.state_size() {
            return Err(DqnError::dimension_mismatch(
                format!("state of length {}", self.state_size()),
                format!("length {}", state.len()),
            ));
        }
        Ok(())
    }

    /// Epsilon-greedy action selection
    pub fn act(&mut self, state: ArrayView1<f32>, epsilon: f32) -> Result<usize> {
        self.check_state(state)?;

        if self.rng.gen::<f32>() < epsilon {
            Ok(self.rng.gen_range(0..self.action_size()))
        } else {
            let q_values = self.local.forward(state, Mode::Eval)?;
            greedy_action(q_values.view())
        }
    }

    /// Store a transition and run a learning update when one is due
    pub fn step(
        &mut self,
        state: ArrayView1<f32>,
        action: usize,
        reward: f32,
        next_state: ArrayView1<f32>,
        done: bool,
    ) -> Result<()> {
        self.check_state(state)?;
        self.check_state(next_state)?;
        if action >= self.action_size() {
            return Err(DqnError::InvalidAction {
                action,
                max_actions: self.action_size(),
            });
        }

        self.memory.push(Transition::new(
            state.to_owned(),
            action,
            reward,
            next_state.to_owned(),
            done,
        ));
        self.t_step += 1;

        if self.t_step % self.config.update_every == 0 && self.memory.len() >= self.config.batch_size {
            let batch: Vec<Transition> = self
                .memory
                .sample(self.config.batch_size, &mut self.rng)?
                .into_iter()
                .cloned()
                .collect();
            let loss = self.learn(&batch)?;
            debug!(t_step = self.t_step, learn_steps = self.learn_steps, loss, "learning update");
        }
        Ok(())
    }

    /// TD targets `r + gamma * max_a Q_target(s', a) * (1 - done)` for a batch
    pub fn td_targets(&mut self, batch: &[Transition]) -> Result<Array1<f32>> {
        let next_states = stack_rows(batch.iter().map(|t| t.next_state.view()), self.state_size())?;
        let next_q = self.target.forward_batch(next_states.view(), Mode::Eval)?;

        Ok(batch
            .iter()
            .zip(next_q.outer_iter())
            .map(|(t, q)| {
                let max_next = q.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                let not_done = if t.done { 0.0 } else { 1.0 };
                t.reward + self.config.gamma * max_next * not_done
            })
            .collect())
    }

    /// One learning update on `batch`; returns the MSE loss before the update
    pub fn learn(&mut self, batch: &[Transition]) -> Result<f32> {
        if batch.is_empty() {
            return Err(DqnError::InsufficientExperience { requested: 1, available: 0 });
        }

        let targets = self.td_targets(batch)?;

        let states = stack_rows(batch.iter().map(|t| t.state.view()), self.state_size())?;
        let q_values = self.local.forward_batch(states.view(), Mode::Train)?;
        let predicted: Array1<f32> = batch
            .iter()
            .enumerate()
            .map(|(i, t)| q_values[[i, t.action]])
            .collect();

        let loss = MSE.compute(predicted.view(), targets.view());
        if !loss.is_finite() {
            return Err(DqnError::NumericalError(format!("loss diverged to {}", loss)));
        }

        // Only the taken action carries error
        let grad = MSE.gradient(predicted.view(), targets.view());
        let mut output_errors = Array2::zeros(q_values.dim());
        for (i, t) in batch.iter().enumerate() {
            output_errors[[i, t.action]] = grad[i];
        }
        self.local.backward(output_errors.view())?;
        self.local.apply_gradients(&mut self.optimizer, self.config.learning_rate);

        self.target.soft_update_from(&self.local, self.config.tau)?;

        self.learn_steps += 1;
        self.last_loss = Some(loss);
        Ok(loss)
    }

    /// Persist the local network's parameters
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.local.save(path)
    }
}

impl Agent for DqnAgent {
    fn state_size(&self) -> usize {
        DqnAgent::state_size(self)
    }

    fn action_size(&self) -> usize {
        DqnAgent::action_size(self)
    }

    fn act(&mut self, state: ArrayView1<f32>, epsilon: f32) -> Result<usize> {
        DqnAgent::act(self, state, epsilon)
    }

    fn step(
        &mut self,
        state: ArrayView1<f32>,
        action: usize,
        reward: f32,
        next_state: ArrayView1<f32>,
        done: bool,
    ) -> Result<()> {
        DqnAgent::step(self, state, action, reward, next_state, done)
    }
}

fn stack_rows<'a, I>(rows: I, width: usize) -> Result<Array2<f32>>
where
    I: ExactSizeIterator<Item = ArrayView1<'a, f32>>,
{
    let mut stacked = Array2::zeros((rows.len(), width));
    for (mut dst, src) in stacked.outer_iter_mut().zip(rows) {
        if src.len() != width {
            return Err(DqnError::dimension_mismatch(
                format!("row of length {}", width),
                format!("length {}", src.len()),
            ));
        }
        dst.assign(&src);
    }
    Ok(stacked)
}

/// Builder pattern for DqnAgent
pub struct DqnAgentBuilder {
    state_size: usize,
    action_size: usize,
    hidden_widths: Vec<usize>,
    use_normalization: bool,
    dropout_prob: f32,
    config: AgentConfig,
    optimizer: Option<OptimizerWrapper>,
    seed: Option<u64>,
}

impl DqnAgentBuilder {
    pub fn new() -> Self {
        DqnAgentBuilder {
            state_size: 0,
            action_size: 0,
            hidden_widths: vec![64, 64],
            use_normalization: false,
            dropout_prob: 0.0,
            config: AgentConfig::default(),
            optimizer: None,
            seed: None,
        }
    }

    pub fn state_size(mut self, size: usize) -> Self {
        self.state_size = size;
        self
    }

    pub fn action_size(mut self, size: usize) -> Self {
        self.action_size = size;
        self
    }

    pub fn hidden_widths(mut self, widths: &[usize]) -> Self {
        self.hidden_widths = widths.to_vec();
        self
    }

    pub fn use_normalization(mut self, enabled: bool) -> Self {
        self.use_normalization = enabled;
        self
    }

    pub fn dropout_prob(mut self, prob: f32) -> Self {
        self.dropout_prob = prob;
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.config.buffer_size = buffer_size;
        self
    }

    pub fn learning_rate(mut self, learning_rate: f32) -> Self {
        self.config.learning_rate = learning_rate;
        self
    }

    pub fn gamma(mut self, gamma: f32) -> Self {
        self.config.gamma = gamma;
        self
    }

    pub fn tau(mut self, tau: f32) -> Self {
        self.config.tau = tau;
        self
    }

    pub fn update_every(mut self, steps: usize) -> Self {
        self.config.update_every = steps;
        self
    }

    pub fn optimizer(mut self, optimizer: OptimizerWrapper) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    /// Seed for network initialization and sampling; entropy-seeded when unset
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<DqnAgent> {
        let network = NetworkConfig {
            state_size: self.state_size,
            action_size: self.action_size,
            hidden_widths: self.hidden_widths,
            use_normalization: self.use_normalization,
            dropout_prob: self.dropout_prob,
        };
        let mut rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let optimizer = self
            .optimizer
            .unwrap_or_else(|| OptimizerWrapper::Adam(Adam::default()));
        DqnAgent::with_optimizer(network, self.config, optimizer, &mut rng)
    }
}

impl Default for DqnAgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}
