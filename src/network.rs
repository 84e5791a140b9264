use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::data::check_labels;
use crate::{loss, Activation, Error, Layer, Matrix, NetworkConfig, Result};

/// Fully-connected classifier: two ReLU hidden layers and a linear output layer.
///
/// The network owns the six parameter tensors. Nothing mutates them except
/// [`Network::sgd_step`].
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    layers: Vec<Layer>,
}

/// Cached forward-pass outputs, one `(batch, out_dim)` matrix per layer.
///
/// The last entry holds the class scores.
#[derive(Debug, Clone)]
pub struct Activations {
    outputs: Vec<Matrix>,
}

/// Parameter gradients, shaped like the network's parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    d_weights: Vec<Matrix>,
    d_biases: Vec<Vec<f64>>,
}

/// Loss of one batch, split into its two terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchLoss {
    /// Mean negative log-probability of the true class.
    pub data: f64,
    /// `0.5 * reg * sum(W^2)` over all weight matrices.
    pub regularization: f64,
}

impl BatchLoss {
    #[inline]
    pub fn total(&self) -> f64 {
        self.data + self.regularization
    }
}

impl Network {
    pub fn new_with_seed(config: &NetworkConfig, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::new_with_rng(config, &mut rng)
    }

    /// Weights are drawn layer by layer, in order, from `rng`.
    pub fn new_with_rng<R: Rng + ?Sized>(config: &NetworkConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;

        let sizes = config.sizes();
        let last = sizes.len() - 2;
        let mut layers = Vec::with_capacity(sizes.len() - 1);
        for (idx, w) in sizes.windows(2).enumerate() {
            let activation = if idx == last {
                Activation::Identity
            } else {
                Activation::ReLU
            };
            layers.push(Layer::new_with_rng(
                w[0],
                w[1],
                config.weight_scale,
                activation,
                rng,
            )?);
        }
        Ok(Self { layers })
    }

    /// Assemble a network from explicit layers.
    ///
    /// Consecutive layers must be dimensionally compatible. Every hidden layer
    /// must be `ReLU` and the output layer `Identity`: the loss treats the last
    /// layer's outputs as raw class scores.
    pub fn from_layers(layers: Vec<Layer>) -> Result<Self> {
        if layers.is_empty() {
            return Err(Error::InvalidConfig(
                "network must have at least one layer".to_owned(),
            ));
        }
        for (i, pair) in layers.windows(2).enumerate() {
            if pair[0].out_dim() != pair[1].in_dim() {
                return Err(Error::ShapeMismatch(format!(
                    "layer {} in_dim {} does not match layer {i} out_dim {}",
                    i + 1,
                    pair[1].in_dim(),
                    pair[0].out_dim()
                )));
            }
        }
        let last = layers.len() - 1;
        for (i, layer) in layers.iter().enumerate() {
            let expected = if i == last {
                Activation::Identity
            } else {
                Activation::ReLU
            };
            if layer.activation() != expected {
                return Err(Error::InvalidConfig(format!(
                    "layer {i} must use {expected:?} activation, got {:?}",
                    layer.activation()
                )));
            }
        }
        Ok(Self { layers })
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.layers[0].in_dim()
    }

    #[inline]
    pub fn num_classes(&self) -> usize {
        self.layers[self.layers.len() - 1].out_dim()
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    #[inline]
    pub fn layer(&self, idx: usize) -> Option<&Layer> {
        self.layers.get(idx)
    }

    #[inline]
    pub fn layer_mut(&mut self, idx: usize) -> Option<&mut Layer> {
        self.layers.get_mut(idx)
    }

    pub fn gradients(&self) -> Gradients {
        Gradients::new(self)
    }

    /// Number of examples in `images`, or a shape error.
    ///
    /// The row count is `images.len() / input_dim`. A buffer of, say, two
    /// 4-pixel images fed to an 8-input network is one example; callers that
    /// know their batch size should compare it with the returned count.
    pub fn check_images(&self, images: &[f64]) -> Result<usize> {
        let d = self.input_dim();
        if images.is_empty() {
            return Err(Error::ShapeMismatch("batch must not be empty".to_owned()));
        }
        if images.len() % d != 0 {
            return Err(Error::ShapeMismatch(format!(
                "images length {} is not a multiple of input_dim {d}",
                images.len()
            )));
        }
        Ok(images.len() / d)
    }

    /// Forward pass, keeping every layer's output.
    pub fn forward_cached(&self, images: &[f64]) -> Result<Activations> {
        let rows = self.check_images(images)?;

        let mut outputs: Vec<Matrix> = Vec::with_capacity(self.layers.len());
        for (idx, layer) in self.layers.iter().enumerate() {
            let mut out = Matrix::zeros(rows, layer.out_dim());
            let input = if idx == 0 {
                images
            } else {
                outputs[idx - 1].as_slice()
            };
            layer.forward_batch(input, rows, &mut out);
            outputs.push(out);
        }
        Ok(Activations { outputs })
    }

    /// Class scores, shape `(batch, num_classes)`.
    ///
    /// `images` is a flat row-major buffer; the batch size is inferred from
    /// its length (see [`Network::check_images`]).
    pub fn forward(&self, images: &[f64]) -> Result<Matrix> {
        let mut cache = self.forward_cached(images)?;
        Ok(cache
            .outputs
            .pop()
            .expect("network must have at least one layer"))
    }

    /// Highest-scoring class per example; ties go to the lowest index.
    ///
    /// One label per `input_dim` values of `images`.
    pub fn predict(&self, images: &[f64]) -> Result<Vec<usize>> {
        let scores = self.forward(images)?;
        Ok((0..scores.rows())
            .map(|r| loss::argmax(scores.row(r)))
            .collect())
    }

    /// `0.5 * reg * sum(W^2)` over every weight matrix; biases are excluded.
    pub fn regularization_loss(&self, reg: f64) -> f64 {
        0.5 * reg
            * self
                .layers
                .iter()
                .map(|l| l.weights().sum_of_squares())
                .sum::<f64>()
    }

    /// Softmax cross-entropy loss with L2 regularization, and its gradient with
    /// respect to every parameter.
    pub fn loss_and_gradients(
        &self,
        images: &[f64],
        labels: &[usize],
        reg: f64,
    ) -> Result<(BatchLoss, Gradients)> {
        let mut grads = self.gradients();
        let loss = self.loss_and_gradients_into(images, labels, reg, &mut grads)?;
        Ok((loss, grads))
    }

    /// Like [`Network::loss_and_gradients`], overwriting a reusable `grads`.
    pub fn loss_and_gradients_into(
        &self,
        images: &[f64],
        labels: &[usize],
        reg: f64,
        grads: &mut Gradients,
    ) -> Result<BatchLoss> {
        let rows = self.check_images(images)?;
        if labels.len() != rows {
            return Err(Error::ShapeMismatch(format!(
                "{} labels for a batch of {rows} images",
                labels.len()
            )));
        }
        check_labels(labels, self.num_classes())?;
        self.check_gradients(grads)?;

        let cache = self.forward_cached(images)?;
        let last = self.layers.len() - 1;

        let mut d_z = Matrix::zeros(rows, self.num_classes());
        let data = loss::softmax_cross_entropy_backward(&cache.outputs[last], labels, &mut d_z);
        let regularization = self.regularization_loss(reg);

        for idx in (0..self.layers.len()).rev() {
            let layer = &self.layers[idx];
            let input = if idx == 0 {
                images
            } else {
                cache.outputs[idx - 1].as_slice()
            };

            if idx == 0 {
                layer.backward_batch(
                    input,
                    &d_z,
                    &mut grads.d_weights[idx],
                    &mut grads.d_biases[idx],
                    None,
                );
            } else {
                let mut d_prev = Matrix::zeros(rows, layer.in_dim());
                layer.backward_batch(
                    input,
                    &d_z,
                    &mut grads.d_weights[idx],
                    &mut grads.d_biases[idx],
                    Some(&mut d_prev),
                );
                let below = &self.layers[idx - 1];
                below
                    .activation()
                    .backward_in_place(cache.outputs[idx - 1].as_slice(), d_prev.as_mut_slice());
                d_z = d_prev;
            }

            if reg != 0.0 {
                let w = layer.weights().as_slice();
                for (g, &w) in grads.d_weights[idx].as_mut_slice().iter_mut().zip(w) {
                    *g += reg * w;
                }
            }
        }

        Ok(BatchLoss {
            data,
            regularization,
        })
    }

    /// In-place gradient descent: `p -= lr * g` for every weight and bias.
    pub fn sgd_step(&mut self, grads: &Gradients, lr: f64) -> Result<()> {
        if !(lr.is_finite() && lr > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning rate must be finite and > 0, got {lr}"
            )));
        }
        self.check_gradients(grads)?;

        for (idx, layer) in self.layers.iter_mut().enumerate() {
            for (p, g) in layer
                .weights_mut()
                .as_mut_slice()
                .iter_mut()
                .zip(grads.d_weights[idx].as_slice())
            {
                *p -= lr * g;
            }
            for (p, g) in layer.biases_mut().iter_mut().zip(&grads.d_biases[idx]) {
                *p -= lr * g;
            }
        }
        Ok(())
    }

    fn check_gradients(&self, grads: &Gradients) -> Result<()> {
        let compatible = grads.d_weights.len() == self.layers.len()
            && grads.d_biases.len() == self.layers.len()
            && self.layers.iter().enumerate().all(|(i, l)| {
                grads.d_weights[i].shape() == l.weights().shape()
                    && grads.d_biases[i].len() == l.out_dim()
            });
        if compatible {
            Ok(())
        } else {
            Err(Error::ShapeMismatch(
                "gradients were not built for this network".to_owned(),
            ))
        }
    }
}

impl Activations {
    /// Output of layer `idx` (post-activation).
    #[inline]
    pub fn layer_output(&self, idx: usize) -> &Matrix {
        &self.outputs[idx]
    }

    #[inline]
    pub fn scores(&self) -> &Matrix {
        &self.outputs[self.outputs.len() - 1]
    }
}

impl Gradients {
    pub fn new(network: &Network) -> Self {
        Self {
            d_weights: network
                .layers
                .iter()
                .map(|l| Matrix::zeros(l.in_dim(), l.out_dim()))
                .collect(),
            d_biases: network
                .layers
                .iter()
                .map(|l| vec![0.0; l.out_dim()])
                .collect(),
        }
    }

    #[inline]
    pub fn d_weights(&self, layer_idx: usize) -> &Matrix {
        &self.d_weights[layer_idx]
    }

    #[inline]
    pub fn d_biases(&self, layer_idx: usize) -> &[f64] {
        &self.d_biases[layer_idx]
    }

    #[inline]
    pub fn d_weights_mut(&mut self, layer_idx: usize) -> &mut Matrix {
        &mut self.d_weights[layer_idx]
    }

    #[inline]
    pub fn d_biases_mut(&mut self, layer_idx: usize) -> &mut [f64] {
        &mut self.d_biases[layer_idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config() -> NetworkConfig {
        NetworkConfig {
            input_dim: 4,
            hidden1: 3,
            hidden2: 2,
            num_classes: 2,
            weight_scale: 0.5,
        }
    }

    #[test]
    fn seeded_init_is_deterministic() {
        let a = Network::new_with_seed(&tiny_config(), 123).unwrap();
        let b = Network::new_with_seed(&tiny_config(), 123).unwrap();
        assert_eq!(a, b);

        let c = Network::new_with_seed(&tiny_config(), 124).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn init_shapes_and_activations() {
        let net = Network::new_with_seed(&tiny_config(), 0).unwrap();
        assert_eq!(net.num_layers(), 3);
        assert_eq!(net.input_dim(), 4);
        assert_eq!(net.num_classes(), 2);

        let shapes: Vec<_> = net.layers().iter().map(|l| l.weights().shape()).collect();
        assert_eq!(shapes, vec![(4, 3), (3, 2), (2, 2)]);
        for layer in net.layers() {
            assert!(layer.biases().iter().all(|&b| b == 0.0));
        }
        assert_eq!(net.layers()[0].activation(), Activation::ReLU);
        assert_eq!(net.layers()[1].activation(), Activation::ReLU);
        assert_eq!(net.layers()[2].activation(), Activation::Identity);
    }

    #[test]
    fn from_layers_rejects_incompatible_dims() {
        let a = Layer::from_parts(2, 3, Activation::ReLU, vec![0.0; 6], vec![0.0; 3]).unwrap();
        let b = Layer::from_parts(2, 1, Activation::Identity, vec![0.0; 2], vec![0.0]).unwrap();
        let err = Network::from_layers(vec![a, b]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch(_)));
    }

    #[test]
    fn from_layers_rejects_activation_layouts_the_loss_cannot_train() {
        let hidden = |act| Layer::from_parts(1, 1, act, vec![1.0], vec![0.0]).unwrap();
        let output = |act| Layer::from_parts(1, 2, act, vec![1.0, -1.0], vec![0.0; 2]).unwrap();

        let err = Network::from_layers(vec![
            hidden(Activation::ReLU),
            hidden(Activation::ReLU),
            output(Activation::ReLU),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let err = Network::from_layers(vec![
            hidden(Activation::Identity),
            hidden(Activation::ReLU),
            output(Activation::Identity),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        assert!(Network::from_layers(vec![
            hidden(Activation::ReLU),
            hidden(Activation::ReLU),
            output(Activation::Identity),
        ])
        .is_ok());
    }

    #[test]
    fn row_count_comes_from_the_buffer_length() {
        let net = Network::new_with_seed(&tiny_config(), 0).unwrap();
        // Eight values at input_dim 4 are two rows.
        assert_eq!(net.check_images(&[0.0; 8]).unwrap(), 2);
        // Labels pin the batch size: one label for two rows is rejected.
        let err = net.loss_and_gradients(&[0.0; 8], &[0], 0.0).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch(_)));
    }

    #[test]
    fn forward_rejects_bad_shapes() {
        let net = Network::new_with_seed(&tiny_config(), 0).unwrap();
        assert!(matches!(net.forward(&[]), Err(Error::ShapeMismatch(_))));
        assert!(matches!(net.forward(&[0.0; 5]), Err(Error::ShapeMismatch(_))));
        assert_eq!(net.forward(&[0.0; 8]).unwrap().shape(), (2, 2));
    }

    #[test]
    fn loss_and_gradients_rejects_bad_labels() {
        let net = Network::new_with_seed(&tiny_config(), 0).unwrap();
        let images = [0.1; 8];

        let err = net.loss_and_gradients(&images, &[0], 0.0).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch(_)));

        let err = net.loss_and_gradients(&images, &[0, 2], 0.0).unwrap_err();
        assert!(matches!(err, Error::LabelOutOfRange { index: 1, .. }));
    }

    #[test]
    fn zero_parameters_give_uniform_loss() {
        let net = Network::new_with_seed(
            &NetworkConfig {
                weight_scale: 0.0,
                ..tiny_config()
            },
            0,
        )
        .unwrap();
        let (loss, grads) = net.loss_and_gradients(&[1.0; 8], &[0, 1], 0.3).unwrap();
        assert!((loss.data - 2.0_f64.ln()).abs() < 1e-12);
        assert_eq!(loss.regularization, 0.0);
        // Only the output bias sees a gradient, and it cancels across the two labels.
        assert_eq!(grads.d_biases(2), &[0.0, 0.0]);
        assert!(grads.d_weights(0).as_slice().iter().all(|&g| g == 0.0));
    }

    #[test]
    fn sgd_step_rejects_foreign_gradients() {
        let mut net = Network::new_with_seed(&tiny_config(), 0).unwrap();
        let other = Network::new_with_seed(
            &NetworkConfig {
                hidden1: 5,
                ..tiny_config()
            },
            0,
        )
        .unwrap();
        let err = net.sgd_step(&other.gradients(), 0.1).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch(_)));
        let own = net.gradients();
        assert!(net.sgd_step(&own, 0.0).is_err());
    }

    #[test]
    fn sgd_step_moves_against_the_gradient() {
        let mut net = Network::new_with_seed(&tiny_config(), 0).unwrap();
        let before = net.clone();
        let mut grads = net.gradients();
        grads.d_weights_mut(1).set(0, 1, 2.0);
        grads.d_biases_mut(2)[0] = -1.0;

        net.sgd_step(&grads, 0.5).unwrap();

        let w_before = before.layers()[1].weights().get(0, 1);
        assert_eq!(net.layers()[1].weights().get(0, 1), w_before - 1.0);
        assert_eq!(net.layers()[2].biases()[0], 0.5);
        assert_eq!(net.layers()[0], before.layers()[0]);
    }
}
