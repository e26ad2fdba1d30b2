use ndarray::{Array1, Array2, ArrayView2, ArrayViewD, ArrayViewMutD, Axis};
use rand::Rng;
use crate::error::{DqnError, Result};
use crate::optimizer::{Optimizer, OptimizerWrapper};
use super::initialization::fan_in_uniform;
use super::traits::{Layer, Mode};

/// A fully connected (affine) layer: `y = x W + b`
#[derive(Clone, Debug)]
pub struct DenseLayer {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
    inputs: Option<Array2<f32>>,
    weight_gradients: Option<Array2<f32>>,
    bias_gradients: Option<Array1<f32>>,
}

impl DenseLayer {
    /// Create a dense layer, drawing its parameters from `rng` with the
    /// fan-in uniform initialization.
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, rng: &mut R) -> Self {
        let (weights, biases) = fan_in_uniform(input_size, output_size, rng);
        DenseLayer {
            weights,
            biases,
            inputs: None,
            weight_gradients: None,
            bias_gradients: None,
        }
    }

    pub fn with_weights(mut self, weights: Array2<f32>) -> Self {
        assert_eq!(weights.dim(), self.weights.dim());
        self.weights = weights;
        self
    }

    pub fn with_biases(mut self, biases: Array1<f32>) -> Self {
        assert_eq!(biases.dim(), self.biases.dim());
        self.biases = biases;
        self
    }

    /// Gradients computed by the last backward pass
    pub fn gradients(&self) -> Option<(&Array2<f32>, &Array1<f32>)> {
        match (&self.weight_gradients, &self.bias_gradients) {
            (Some(w), Some(b)) => Some((w, b)),
            _ => None,
        }
    }
}

impl Layer for DenseLayer {
    fn forward_batch(&mut self, inputs: ArrayView2<f32>, mode: Mode) -> Array2<f32> {
        self.inputs = match mode {
            Mode::Train => Some(inputs.to_owned()),
            Mode::Eval => None,
        };
        inputs.dot(&self.weights) + &self.biases.view().insert_axis(Axis(0))
    }

    fn backward_batch(&mut self, output_errors: ArrayView2<f32>) -> Result<Array2<f32>> {
        let inputs = self.inputs.as_ref().ok_or_else(|| {
            DqnError::NumericalError("dense backward called without a training-mode forward pass".to_string())
        })?;

        self.weight_gradients = Some(inputs.t().dot(&output_errors));
        self.bias_gradients = Some(output_errors.sum_axis(Axis(0)));

        Ok(output_errors.dot(&self.weights.t()))
    }

    fn apply_gradients(&mut self, optimizer: &mut OptimizerWrapper, slot: &mut usize, learning_rate: f32) {
        if let (Some(wg), Some(bg)) = (self.weight_gradients.take(), self.bias_gradients.take()) {
            optimizer.update(*slot, self.weights.view_mut().into_dyn(), wg.view().into_dyn(), learning_rate);
            optimizer.update(*slot + 1, self.biases.view_mut().into_dyn(), bg.view().into_dyn(), learning_rate);
        }
        *slot += 2;
    }

    fn parameters(&self) -> Vec<(&'static str, ArrayViewD<'_, f32>)> {
        vec![
            ("weight", self.weights.view().into_dyn()),
            ("bias", self.biases.view().into_dyn()),
        ]
    }

    fn parameters_mut(&mut self) -> Vec<(&'static str, ArrayViewMutD<'_, f32>)> {
        vec![
            ("weight", self.weights.view_mut().into_dyn()),
            ("bias", self.biases.view_mut().into_dyn()),
        ]
    }

    fn input_size(&self) -> usize {
        self.weights.shape()[0]
    }

    fn output_size(&self) -> usize {
        self.weights.shape()[1]
    }
}
