use ndarray::{Array1, Array2, ArrayView2, ArrayViewD, ArrayViewMutD, Axis};
use crate::error::{DqnError, Result};
use crate::optimizer::{Optimizer, OptimizerWrapper};
use super::traits::{Layer, Mode};

/// Batch Normalization Layer
///
/// Normalizes the inputs across the batch dimension to have mean 0 and variance 1,
/// then scales and shifts using learnable parameters gamma and beta.
///
/// In [`Mode::Train`] the batch statistics are used and folded into the running
/// estimates; in [`Mode::Eval`] (and for single-sample batches, which carry no
/// variance) the running estimates are used instead.
#[derive(Clone, Debug)]
pub struct BatchNormLayer {
    /// Scale parameter (gamma)
    pub gamma: Array1<f32>,

    /// Shift parameter (beta)
    pub beta: Array1<f32>,

    /// Running mean for inference
    pub running_mean: Array1<f32>,

    /// Running variance for inference
    pub running_var: Array1<f32>,

    /// Momentum for running statistics
    pub momentum: f32,

    /// Small constant for numerical stability
    pub epsilon: f32,

    cache: Option<NormCache>,
    grad_gamma: Option<Array1<f32>>,
    grad_beta: Option<Array1<f32>>,
}

#[derive(Clone, Debug)]
struct NormCache {
    normalized: Array2<f32>,
    std: Array1<f32>,
    batch_statistics: bool,
}

impl BatchNormLayer {
    /// Create a new batch normalization layer
    pub fn new(num_features: usize, momentum: f32, epsilon: f32) -> Self {
        BatchNormLayer {
            gamma: Array1::ones(num_features),
            beta: Array1::zeros(num_features),
            running_mean: Array1::zeros(num_features),
            running_var: Array1::ones(num_features),
            momentum,
            epsilon,
            cache: None,
            grad_gamma: None,
            grad_beta: None,
        }
    }

    /// Layer with the usual momentum (0.1) and epsilon (1e-5)
    pub fn with_defaults(num_features: usize) -> Self {
        Self::new(num_features, 0.1, 1e-5)
    }

    fn normalize(&self, inputs: ArrayView2<f32>, mean: &Array1<f32>, std: &Array1<f32>) -> Array2<f32> {
        (&inputs - &mean.view().insert_axis(Axis(0))) / &std.view().insert_axis(Axis(0))
    }

    fn scale_shift(&self, normalized: &Array2<f32>) -> Array2<f32> {
        normalized * &self.gamma.view().insert_axis(Axis(0)) + &self.beta.view().insert_axis(Axis(0))
    }
}

impl Layer for BatchNormLayer {
    fn forward_batch(&mut self, inputs: ArrayView2<f32>, mode: Mode) -> Array2<f32> {
        let batch_size = inputs.nrows();

        if mode == Mode::Train && batch_size > 1 {
            let n = batch_size as f32;
            let mean = inputs.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(inputs.ncols()));
            let var = inputs.var_axis(Axis(0), 0.0);
            let std = var.mapv(|v| (v + self.epsilon).sqrt());
            let normalized = self.normalize(inputs, &mean, &std);

            // Running variance tracks the unbiased estimate
            let unbiased = &var * (n / (n - 1.0));
            self.running_mean = &self.running_mean * (1.0 - self.momentum) + &mean * self.momentum;
            self.running_var = &self.running_var * (1.0 - self.momentum) + &unbiased * self.momentum;

            let output = self.scale_shift(&normalized);
            self.cache = Some(NormCache { normalized, std, batch_statistics: true });
            output
        } else {
            let std = self.running_var.mapv(|v| (v + self.epsilon).sqrt());
            let normalized = self.normalize(inputs, &self.running_mean, &std);
            let output = self.scale_shift(&normalized);
            self.cache = match mode {
                Mode::Train => Some(NormCache { normalized, std, batch_statistics: false }),
                Mode::Eval => None,
            };
            output
        }
    }

    fn backward_batch(&mut self, output_errors: ArrayView2<f32>) -> Result<Array2<f32>> {
        let cache = self.cache.as_ref().ok_or_else(|| {
            DqnError::NumericalError(
                "batch norm backward called without a training-mode forward pass".to_string(),
            )
        })?;

        let grad_gamma = (&output_errors * &cache.normalized).sum_axis(Axis(0));
        let grad_beta = output_errors.sum_axis(Axis(0));
        let scale = (&self.gamma / &cache.std).insert_axis(Axis(0));

        let grad_input = if cache.batch_statistics {
            // dx = gamma/std * (dy - mean(dy) - x_hat * mean(dy * x_hat))
            let n = output_errors.nrows() as f32;
            let mean_dy = (&grad_beta / n).insert_axis(Axis(0));
            let mean_dy_xhat = (&grad_gamma / n).insert_axis(Axis(0));
            (&output_errors - &mean_dy - &(&cache.normalized * &mean_dy_xhat)) * &scale
        } else {
            &output_errors * &scale
        };

        self.grad_gamma = Some(grad_gamma);
        self.grad_beta = Some(grad_beta);
        Ok(grad_input)
    }

    fn apply_gradients(&mut self, optimizer: &mut OptimizerWrapper, slot: &mut usize, learning_rate: f32) {
        if let (Some(gg), Some(gb)) = (self.grad_gamma.take(), self.grad_beta.take()) {
            optimizer.update(*slot, self.gamma.view_mut().into_dyn(), gg.view().into_dyn(), learning_rate);
            optimizer.update(*slot + 1, self.beta.view_mut().into_dyn(), gb.view().into_dyn(), learning_rate);
        }
        *slot += 2;
    }

    fn parameters(&self) -> Vec<(&'static str, ArrayViewD<'_, f32>)> {
        vec![
            ("gamma", self.gamma.view().into_dyn()),
            ("beta", self.beta.view().into_dyn()),
            ("running_mean", self.running_mean.view().into_dyn()),
            ("running_var", self.running_var.view().into_dyn()),
        ]
    }

    fn parameters_mut(&mut self) -> Vec<(&'static str, ArrayViewMutD<'_, f32>)> {
        vec![
            ("gamma", self.gamma.view_mut().into_dyn()),
            ("beta", self.beta.view_mut().into_dyn()),
            ("running_mean", self.running_mean.view_mut().into_dyn()),
            ("running_var", self.running_var.view_mut().into_dyn()),
        ]
    }

    fn input_size(&self) -> usize {
        self.gamma.len()
    }

    fn output_size(&self) -> usize {
        self.gamma.len()
    }
}
