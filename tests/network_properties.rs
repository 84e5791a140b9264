use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use fcnn::{Activation, Layer, Network, NetworkConfig};

fn assert_close(analytic: f64, numeric: f64, abs_tol: f64, rel_tol: f64, what: &str) {
    let diff = (analytic - numeric).abs();
    let scale = analytic.abs().max(numeric.abs());
    assert!(
        diff <= abs_tol || diff / scale <= rel_tol,
        "{what}: analytic={analytic} numeric={numeric} diff={diff}"
    );
}

fn random_images(rows: usize, dim: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..rows * dim).map(|_| rng.sample(StandardNormal)).collect()
}

fn total_loss(net: &Network, images: &[f64], labels: &[usize], reg: f64) -> f64 {
    net.loss_and_gradients(images, labels, reg)
        .unwrap()
        .0
        .total()
}

#[test]
fn analytic_gradients_match_finite_differences() {
    let config = NetworkConfig {
        input_dim: 5,
        hidden1: 4,
        hidden2: 3,
        num_classes: 3,
        weight_scale: 1.0,
    };
    let mut net = Network::new_with_seed(&config, 11).unwrap();
    let images = random_images(3, 5, 12);
    let labels = [2, 0, 1];
    let reg = 0.1;

    let (_, grads) = net.loss_and_gradients(&images, &labels, reg).unwrap();
    let eps = 1e-5;

    for layer_idx in 0..net.num_layers() {
        let w_len = net.layers()[layer_idx].weights().as_slice().len();
        for p in 0..w_len {
            let orig = net.layers()[layer_idx].weights().as_slice()[p];
            let set = |net: &mut Network, v: f64| {
                net.layer_mut(layer_idx).unwrap().weights_mut().as_mut_slice()[p] = v;
            };

            set(&mut net, orig + eps);
            let plus = total_loss(&net, &images, &labels, reg);
            set(&mut net, orig - eps);
            let minus = total_loss(&net, &images, &labels, reg);
            set(&mut net, orig);

            let numeric = (plus - minus) / (2.0 * eps);
            let analytic = grads.d_weights(layer_idx).as_slice()[p];
            assert_close(analytic, numeric, 1e-8, 1e-4, &format!("W{layer_idx}[{p}]"));
        }

        let b_len = net.layers()[layer_idx].biases().len();
        for p in 0..b_len {
            let orig = net.layers()[layer_idx].biases()[p];
            let set = |net: &mut Network, v: f64| {
                net.layer_mut(layer_idx).unwrap().biases_mut()[p] = v;
            };

            set(&mut net, orig + eps);
            let plus = total_loss(&net, &images, &labels, reg);
            set(&mut net, orig - eps);
            let minus = total_loss(&net, &images, &labels, reg);
            set(&mut net, orig);

            let numeric = (plus - minus) / (2.0 * eps);
            let analytic = grads.d_biases(layer_idx)[p];
            assert_close(analytic, numeric, 1e-8, 1e-4, &format!("b{layer_idx}[{p}]"));
        }
    }
}

#[test]
fn regularization_loss_is_half_reg_times_sum_of_squared_weights() {
    let net = Network::new_with_seed(
        &NetworkConfig {
            input_dim: 6,
            hidden1: 5,
            hidden2: 4,
            num_classes: 3,
            weight_scale: 0.3,
        },
        3,
    )
    .unwrap();
    let reg = 0.25;

    let sum_sq: f64 = net
        .layers()
        .iter()
        .flat_map(|l| l.weights().as_slice())
        .map(|w| w * w)
        .sum();
    let expected = 0.5 * reg * sum_sq;

    let (loss, _) = net
        .loss_and_gradients(&random_images(2, 6, 4), &[0, 2], reg)
        .unwrap();
    assert!((loss.regularization - expected).abs() <= 1e-12 * expected.max(1.0));
    assert!((loss.total() - (loss.data + loss.regularization)).abs() < 1e-15);
    assert!((net.regularization_loss(reg) - expected).abs() <= 1e-12 * expected.max(1.0));
}

#[test]
fn all_zero_images_still_predict_valid_labels() {
    let config = NetworkConfig::default();
    let net = Network::new_with_seed(&config, 0).unwrap();
    let images = vec![0.0; 5 * config.input_dim];

    let scores = net.forward(&images).unwrap();
    assert_eq!(scores.shape(), (5, config.num_classes));
    assert!(scores.as_slice().iter().all(|s| s.is_finite()));

    let labels = net.predict(&images).unwrap();
    assert_eq!(labels.len(), 5);
    assert!(labels.iter().all(|&l| l < config.num_classes));
}

#[test]
fn one_step_on_a_misclassified_example_does_not_increase_its_loss() {
    let config = NetworkConfig {
        input_dim: 6,
        hidden1: 8,
        hidden2: 5,
        num_classes: 3,
        weight_scale: 0.5,
    };
    let mut net = Network::new_with_seed(&config, 21).unwrap();
    let image = random_images(1, 6, 22);
    let predicted = net.predict(&image).unwrap()[0];
    let label = [(predicted + 1) % config.num_classes];

    let (before, grads) = net.loss_and_gradients(&image, &label, 0.0).unwrap();
    net.sgd_step(&grads, 1e-2).unwrap();
    let (after, _) = net.loss_and_gradients(&image, &label, 0.0).unwrap();

    assert!(
        after.total() <= before.total(),
        "loss went from {} to {}",
        before.total(),
        after.total()
    );
}

#[test]
fn dead_rectifier_units_pass_no_gradient_to_the_layer_below() {
    // x = [1, 1] gives first-layer pre-activations [2, -2, 0]: unit 1 is negative
    // and unit 2 is exactly zero.
    let l1 = Layer::from_parts(
        2,
        3,
        Activation::ReLU,
        vec![1.0, -1.0, 1.0, 1.0, -1.0, -1.0],
        vec![0.0; 3],
    )
    .unwrap();
    let l2 = Layer::from_parts(
        3,
        2,
        Activation::ReLU,
        vec![0.5, -0.4, 0.3, 0.2, 0.7, 0.1],
        vec![0.0; 2],
    )
    .unwrap();
    let l3 = Layer::from_parts(
        2,
        2,
        Activation::Identity,
        vec![1.0, -1.0, 0.5, 0.5],
        vec![0.0; 2],
    )
    .unwrap();
    let net = Network::from_layers(vec![l1, l2, l3]).unwrap();

    let images = [1.0, 1.0];
    let cache = net.forward_cached(&images).unwrap();
    assert_eq!(cache.layer_output(0).row(0), &[2.0, 0.0, 0.0]);

    let (_, grads) = net.loss_and_gradients(&images, &[0], 0.0).unwrap();
    let d_w1 = grads.d_weights(0);
    for input in 0..2 {
        assert_ne!(d_w1.get(input, 0), 0.0);
        assert_eq!(d_w1.get(input, 1), 0.0);
        assert_eq!(d_w1.get(input, 2), 0.0);
    }
    assert_ne!(grads.d_biases(0)[0], 0.0);
    assert_eq!(grads.d_biases(0)[1], 0.0);
    assert_eq!(grads.d_biases(0)[2], 0.0);
}

#[test]
fn huge_scores_give_a_finite_loss() {
    let l1 = Layer::from_parts(1, 1, Activation::ReLU, vec![1.0], vec![0.0]).unwrap();
    let l2 = Layer::from_parts(1, 1, Activation::ReLU, vec![1.0], vec![0.0]).unwrap();
    let l3 = Layer::from_parts(1, 2, Activation::Identity, vec![1.0, -1.0], vec![0.0; 2]).unwrap();
    let net = Network::from_layers(vec![l1, l2, l3]).unwrap();

    let (loss, grads) = net.loss_and_gradients(&[1e4], &[1], 0.0).unwrap();
    assert!(loss.total().is_finite());
    assert!((loss.data - 2e4).abs() < 1e-6);
    assert!(grads.d_biases(2).iter().all(|g| g.is_finite()));
}
