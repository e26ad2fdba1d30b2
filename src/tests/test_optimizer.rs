use ndarray::{arr1, arr2, Array1};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use crate::layers::Mode;
use crate::network::{NetworkConfig, QNetwork};
use crate::optimizer::{Adam, Optimizer, OptimizerWrapper, SGD};

#[test]
fn test_adam_keeps_state_per_slot() {
    let mut adam = Adam::default();
    let mut a = Array1::<f32>::zeros(2);
    let mut b = Array1::<f32>::zeros(3);

    for _ in 0..3 {
        adam.update(0, a.view_mut().into_dyn(), arr1(&[1.0, 1.0]).view().into_dyn(), 0.001);
    }
    adam.update(1, b.view_mut().into_dyn(), arr1(&[1.0, 1.0, 1.0]).view().into_dyn(), 0.001);

    assert_eq!(adam.steps(0), 3);
    assert_eq!(adam.steps(1), 1);
    // a constant gradient moves by lr every step
    assert!((a[0] + 0.003).abs() < 1e-5);
    assert!((b[2] + 0.001).abs() < 1e-5);
}

#[test]
fn test_adam_zero_gradient_is_noop() {
    let mut adam = Adam::default();
    let mut w = arr1(&[0.5f32, -0.5]);
    adam.update(0, w.view_mut().into_dyn(), Array1::<f32>::zeros(2).view().into_dyn(), 0.1);
    assert_eq!(w, arr1(&[0.5, -0.5]));
}

#[test]
fn test_wrapper_dispatch() {
    let mut sgd = OptimizerWrapper::SGD(SGD::new());
    let mut w = arr1(&[1.0f32]);
    sgd.update(0, w.view_mut().into_dyn(), arr1(&[2.0]).view().into_dyn(), 0.5);
    assert!((w[0] - 0.0).abs() < 1e-6);
}

#[test]
fn test_network_assigns_one_slot_per_trainable_tensor() {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let config = NetworkConfig {
        use_normalization: true,
        ..NetworkConfig::new(2, 2, vec![4, 4])
    };
    let mut net = QNetwork::new(config, &mut rng).unwrap();
    let mut optimizer = OptimizerWrapper::Adam(Adam::default());

    let states = arr2(&[[1.0, 0.0], [0.0, 1.0], [0.5, 0.5]]);
    for _ in 0..2 {
        let q = net.forward_batch(states.view(), Mode::Train).unwrap();
        net.backward((&q * 0.1).view()).unwrap();
        net.apply_gradients(&mut optimizer, 1e-3);
    }

    let adam = match &optimizer {
        OptimizerWrapper::Adam(adam) => adam,
        OptimizerWrapper::SGD(_) => unreachable!(),
    };
    // 2 blocks x (weight, bias, gamma, beta) + output (weight, bias)
    for slot in 0..10 {
        assert_eq!(adam.steps(slot), 2, "slot {}", slot);
    }
    assert_eq!(adam.steps(10), 0);
}
