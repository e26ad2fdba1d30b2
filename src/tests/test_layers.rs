use ndarray::{arr1, arr2, Array2, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use crate::layers::{BatchNormLayer, DenseLayer, DropoutLayer, Layer, Mode};

fn dense(input: usize, output: usize) -> DenseLayer {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    DenseLayer::new(input, output, &mut rng)
}

#[test]
fn test_dense_layer_creation() {
    let layer = dense(3, 2);
    assert_eq!(layer.weights.shape(), [3, 2]);
    assert_eq!(layer.biases.shape(), [2]);
    assert_eq!(layer.input_size(), 3);
    assert_eq!(layer.output_size(), 2);
}

#[test]
fn test_dense_layer_forward() {
    let mut layer = dense(2, 2)
        .with_weights(arr2(&[[1.0, -1.0], [2.0, -2.0]]))
        .with_biases(arr1(&[0.5, 0.0]));

    // affine only: negative outputs pass through
    let output = layer.forward_batch(arr2(&[[1.0, 1.0]]).view(), Mode::Eval);
    assert_eq!(output, arr2(&[[3.5, -3.0]]));
}

#[test]
fn test_dense_layer_gradients() {
    let mut layer = dense(2, 1)
        .with_weights(arr2(&[[2.0], [3.0]]))
        .with_biases(arr1(&[0.0]));

    let inputs = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
    layer.forward_batch(inputs.view(), Mode::Train);
    let input_errors = layer.backward_batch(arr2(&[[1.0], [0.5]]).view()).unwrap();

    let (weight_grad, bias_grad) = layer.gradients().unwrap();
    // dW = X^T * dY
    assert_eq!(weight_grad, &arr2(&[[2.5], [4.0]]));
    assert_eq!(bias_grad, &arr1(&[1.5]));
    assert_eq!(input_errors, arr2(&[[2.0, 3.0], [1.0, 1.5]]));
}

#[test]
fn test_dense_backward_requires_train_forward() {
    let mut layer = dense(2, 2);
    layer.forward_batch(arr2(&[[1.0, 1.0]]).view(), Mode::Eval);
    assert!(layer.backward_batch(arr2(&[[1.0, 1.0]]).view()).is_err());
}

#[test]
fn test_batch_norm_normalizes_in_training() {
    let mut layer = BatchNormLayer::with_defaults(2);
    let input = arr2(&[[1.0, 10.0], [3.0, 20.0], [5.0, 30.0]]);
    let output = layer.forward_batch(input.view(), Mode::Train);

    let mean = output.mean_axis(Axis(0)).unwrap();
    let var = output.var_axis(Axis(0), 0.0);
    for j in 0..2 {
        assert!(mean[j].abs() < 1e-5);
        assert!((var[j] - 1.0).abs() < 1e-3);
    }

    // running stats move a tenth of the way towards the batch stats
    assert!((layer.running_mean[0] - 0.3).abs() < 1e-6);
    assert!((layer.running_mean[1] - 2.0).abs() < 1e-5);
    // unbiased variance of [1, 3, 5] is 4
    assert!((layer.running_var[0] - (0.9 + 0.4)).abs() < 1e-5);
}

#[test]
fn test_batch_norm_eval_uses_running_stats() {
    let mut layer = BatchNormLayer::with_defaults(1);
    layer.running_mean = arr1(&[2.0]);
    layer.running_var = arr1(&[4.0]);

    let output = layer.forward_batch(arr2(&[[4.0], [6.0]]).view(), Mode::Eval);
    assert!((output[[0, 0]] - 1.0).abs() < 1e-4);
    assert!((output[[1, 0]] - 2.0).abs() < 1e-4);
    // eval never touches the running estimates
    assert_eq!(layer.running_mean, arr1(&[2.0]));
}

#[test]
fn test_batch_norm_single_sample_training() {
    let mut layer = BatchNormLayer::with_defaults(2);
    let output = layer.forward_batch(arr2(&[[1.0, -1.0]]).view(), Mode::Train);
    assert!(output.iter().all(|v| v.is_finite()));
    assert_eq!(layer.running_mean, arr1(&[0.0, 0.0]));
    assert!(layer.backward_batch(arr2(&[[1.0, 1.0]]).view()).is_ok());
}

#[test]
fn test_batch_norm_backward_shapes() {
    let mut layer = BatchNormLayer::with_defaults(3);
    let input = arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [0.0, 1.0, -1.0]]);
    layer.forward_batch(input.view(), Mode::Train);
    let grad = layer.backward_batch(Array2::ones((3, 3)).view()).unwrap();
    assert_eq!(grad.dim(), (3, 3));
    // a uniform upstream error carries no information through batch statistics
    assert!(grad.iter().all(|g| g.abs() < 1e-4));
}

#[test]
fn test_dropout_layer() {
    let mut layer = DropoutLayer::new(1000, 0.5, 7).unwrap();
    let input = Array2::ones((1, 1000));

    let eval = layer.forward_batch(input.view(), Mode::Eval);
    assert_eq!(eval, input);

    let train = layer.forward_batch(input.view(), Mode::Train);
    assert!(train.iter().all(|&v| v == 0.0 || (v - 2.0).abs() < 1e-6));
    let dropped = train.iter().filter(|&&v| v == 0.0).count();
    assert!(dropped > 350 && dropped < 650);

    let grad = layer.backward_batch(input.view()).unwrap();
    assert_eq!(grad, train);
}

#[test]
fn test_dropout_rejects_invalid_rate() {
    assert!(DropoutLayer::new(4, 1.0, 0).is_err());
    assert!(DropoutLayer::new(4, -0.1, 0).is_err());
}
