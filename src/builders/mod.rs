pub mod replay_buffer;

pub use replay_buffer::ReplayBufferBuilder;
