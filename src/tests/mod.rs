pub mod test_layers;
pub mod test_optimizer;
pub mod test_trainer;
