//! # Optimizers
//!
//! Parameter update rules. A network hands each trainable tensor to the
//! optimizer together with a stable `slot` index so that stateful rules
//! (Adam) can keep their moment estimates per tensor.

use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Zip};
use serde::{Serialize, Deserialize};

pub trait Optimizer {
    fn update(&mut self, slot: usize, param: ArrayViewMutD<f32>, gradient: ArrayViewD<f32>, learning_rate: f32);
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum OptimizerWrapper {
    SGD(SGD),
    Adam(Adam),
}

impl Optimizer for OptimizerWrapper {
    fn update(&mut self, slot: usize, param: ArrayViewMutD<f32>, gradient: ArrayViewD<f32>, learning_rate: f32) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.update(slot, param, gradient, learning_rate),
            OptimizerWrapper::Adam(optimizer) => optimizer.update(slot, param, gradient, learning_rate),
        }
    }
}

/// Plain stochastic gradient descent
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SGD;

impl SGD {
    pub fn new() -> SGD {
        SGD
    }
}

impl Default for SGD {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer for SGD {
    fn update(&mut self, _slot: usize, mut param: ArrayViewMutD<f32>, gradient: ArrayViewD<f32>, learning_rate: f32) {
        param.zip_mut_with(&gradient, |w, &g| *w -= learning_rate * g);
    }
}

/// Adam with bias-corrected first and second moments
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Adam {
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    moments: Vec<Option<AdamMoments>>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct AdamMoments {
    m: ArrayD<f32>,
    v: ArrayD<f32>,
    t: i32,
}

impl Adam {
    pub fn new(beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Adam {
            beta1,
            beta2,
            epsilon,
            moments: Vec::new(),
        }
    }

    /// Number of update steps taken for `slot`
    pub fn steps(&self, slot: usize) -> usize {
        self.moments
            .get(slot)
            .and_then(|m| m.as_ref())
            .map(|m| m.t as usize)
            .unwrap_or(0)
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(0.9, 0.999, 1e-8)
    }
}

impl Optimizer for Adam {
    fn update(&mut self, slot: usize, param: ArrayViewMutD<f32>, gradient: ArrayViewD<f32>, learning_rate: f32) {
        if self.moments.len() <= slot {
            self.moments.resize(slot + 1, None);
        }
        let state = self.moments[slot].get_or_insert_with(|| AdamMoments {
            m: ArrayD::zeros(gradient.raw_dim()),
            v: ArrayD::zeros(gradient.raw_dim()),
            t: 0,
        });
        state.t += 1;

        let (beta1, beta2, epsilon) = (self.beta1, self.beta2, self.epsilon);
        let bias1 = 1.0 - beta1.powi(state.t);
        let bias2 = 1.0 - beta2.powi(state.t);

        Zip::from(param)
            .and(&mut state.m)
            .and(&mut state.v)
            .and(&gradient)
            .for_each(|w, m, v, &g| {
                *m = beta1 * *m + (1.0 - beta1) * g;
                *v = beta2 * *v + (1.0 - beta2) * g * g;
                let m_hat = *m / bias1;
                let v_hat = *v / bias2;
                *w -= learning_rate * m_hat / (v_hat.sqrt() + epsilon);
            });
    }
}
