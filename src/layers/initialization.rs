use ndarray::{Array1, Array2};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Uniform;

/// Default linear-layer initialization: weights `(fan_in, fan_out)` and
/// biases `fan_out`, all uniform in `[-1/sqrt(fan_in), 1/sqrt(fan_in)]`.
pub fn fan_in_uniform<R: Rng + ?Sized>(fan_in: usize, fan_out: usize, rng: &mut R) -> (Array2<f32>, Array1<f32>) {
    let limit = 1.0 / (fan_in.max(1) as f32).sqrt();
    let dist = Uniform::new_inclusive(-limit, limit);
    let weights = Array2::random_using((fan_in, fan_out), dist, rng);
    let biases = Array1::random_using(fan_out, dist, rng);
    (weights, biases)
}
