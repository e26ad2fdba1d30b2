use crate::replay_buffer::ReplayBuffer;
use crate::error::{Result, DqnError};

/// Builder for ReplayBuffer
pub struct ReplayBufferBuilder {
    capacity: Option<usize>,
}

impl ReplayBufferBuilder {
    /// Create a new replay buffer builder
    pub fn new() -> Self {
        ReplayBufferBuilder { capacity: None }
    }

    /// Set the capacity
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Build the replay buffer
    pub fn build(self) -> Result<ReplayBuffer> {
        let capacity = self.capacity.ok_or_else(|| DqnError::InvalidParameter {
            name: "buffer_size".to_string(),
            reason: "Capacity not specified".to_string(),
        })?;

        if capacity == 0 {
            return Err(DqnError::InvalidParameter {
                name: "buffer_size".to_string(),
                reason: "Capacity must be greater than 0".to_string(),
            });
        }

        Ok(ReplayBuffer::new(capacity))
    }
}

impl Default for ReplayBufferBuilder {
    fn default() -> Self {
        Self::new()
    }
}
