use ndarray::ArrayView1;
use crate::error::Result;

/// What the training loop needs from a learning agent
pub trait Agent {
    /// Width of the observations the agent accepts
    fn state_size(&self) -> usize;

    /// Number of discrete actions the agent chooses from
    fn action_size(&self) -> usize;

    /// Select an action for `state`, exploring with probability `epsilon`
    fn act(&mut self, state: ArrayView1<f32>, epsilon: f32) -> Result<usize>;

    /// Record one environment step and learn when due
    fn step(
        &mut self,
        state: ArrayView1<f32>,
        action: usize,
        reward: f32,
        next_state: ArrayView1<f32>,
        done: bool,
    ) -> Result<()>;
}
