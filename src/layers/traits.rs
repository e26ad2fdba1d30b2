use ndarray::{Array2, ArrayView2, ArrayViewD, ArrayViewMutD};
use crate::error::Result;
use crate::optimizer::OptimizerWrapper;

/// Evaluation mode of a layer.
///
/// `Train` enables batch statistics and dropout and records activations for
/// backpropagation. `Eval` is a pure function of the parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

/// Trait defining the interface for network layers
pub trait Layer: Send + Sync {
    /// Forward a batch of inputs
    fn forward_batch(&mut self, inputs: ArrayView2<f32>, mode: Mode) -> Array2<f32>;

    /// Backpropagate output errors, storing parameter gradients.
    ///
    /// Returns the error with respect to the layer inputs. Fails if the last
    /// forward pass was not run in [`Mode::Train`].
    fn backward_batch(&mut self, output_errors: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Apply the stored gradients through `optimizer`.
    ///
    /// `slot` numbers the trainable tensors of a network so that stateful
    /// optimizers can keep per-tensor moments; it is advanced by one per tensor.
    fn apply_gradients(&mut self, optimizer: &mut OptimizerWrapper, slot: &mut usize, learning_rate: f32);

    /// Named tensors held by the layer, trainable or not
    fn parameters(&self) -> Vec<(&'static str, ArrayViewD<'_, f32>)>;

    /// Mutable access to the same tensors, in the same order as [`Layer::parameters`]
    fn parameters_mut(&mut self) -> Vec<(&'static str, ArrayViewMutD<'_, f32>)>;

    /// Get the input size of the layer
    fn input_size(&self) -> usize;

    /// Get the output size of the layer
    fn output_size(&self) -> usize;
}
