use ndarray::{Array2, ArrayView2, ArrayViewD, ArrayViewMutD};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use crate::error::{DqnError, Result};
use crate::optimizer::OptimizerWrapper;
use super::traits::{Layer, Mode};

/// Dropout Layer
///
/// Randomly sets input units to 0 with probability p during training and
/// rescales the survivors by `1 / (1 - p)`. Identity in [`Mode::Eval`].
#[derive(Clone, Debug)]
pub struct DropoutLayer {
    /// Dropout probability (probability of dropping a unit)
    pub dropout_rate: f32,

    size: usize,
    rng: ChaCha8Rng,
    cached_mask: Option<Array2<f32>>,
}

impl DropoutLayer {
    /// Create a new dropout layer with its own mask generator seeded from `seed`
    pub fn new(size: usize, dropout_rate: f32, seed: u64) -> Result<Self> {
        if !(0.0..1.0).contains(&dropout_rate) {
            return Err(DqnError::invalid_parameter(
                "dropout_prob".to_string(),
                format!("must be in [0, 1), got {}", dropout_rate),
            ));
        }

        Ok(DropoutLayer {
            dropout_rate,
            size,
            rng: ChaCha8Rng::seed_from_u64(seed),
            cached_mask: None,
        })
    }
}

impl Layer for DropoutLayer {
    fn forward_batch(&mut self, inputs: ArrayView2<f32>, mode: Mode) -> Array2<f32> {
        if mode == Mode::Eval || self.dropout_rate == 0.0 {
            self.cached_mask = None;
            return inputs.to_owned();
        }

        let keep = 1.0 - self.dropout_rate;
        let scale = 1.0 / keep;
        let rng = &mut self.rng;
        let mask = Array2::from_shape_fn(inputs.dim(), |_| {
            if rng.gen::<f32>() < keep { scale } else { 0.0 }
        });

        let output = &inputs * &mask;
        self.cached_mask = Some(mask);
        output
    }

    fn backward_batch(&mut self, output_errors: ArrayView2<f32>) -> Result<Array2<f32>> {
        match &self.cached_mask {
            Some(mask) => Ok(&output_errors * mask),
            None => Ok(output_errors.to_owned()),
        }
    }

    fn apply_gradients(&mut self, _optimizer: &mut OptimizerWrapper, _slot: &mut usize, _learning_rate: f32) {}

    fn parameters(&self) -> Vec<(&'static str, ArrayViewD<'_, f32>)> {
        Vec::new()
    }

    fn parameters_mut(&mut self) -> Vec<(&'static str, ArrayViewMutD<'_, f32>)> {
        Vec::new()
    }

    fn input_size(&self) -> usize {
        self.size
    }

    fn output_size(&self) -> usize {
        self.size
    }
}
