//! The training loop.
//!
//! `Trainer` owns the network and a fixed set of hyperparameters. Each step
//! computes gradients against the current weights and applies them before the
//! next step reads the weights; there is no asynchrony and no staleness.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::metrics::{self, EvalReport};
use crate::{
    loss, BatchLoss, Dataset, Error, Gradients, Matrix, Network, Result, Shuffle, TrainConfig,
};

/// Progress snapshot, taken every `log_every` iterations.
///
/// Reporting is read-only; it never changes the training trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressReport {
    /// 1-based epoch.
    pub epoch: usize,
    /// 0-based iteration within the epoch.
    pub iteration: usize,
    pub iterations_per_epoch: usize,
    /// Total loss of the batch just trained on, computed before its update.
    pub loss: f64,
    /// Accuracy on that batch, with the updated parameters.
    pub train_accuracy: f64,
    pub validation_accuracy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub epochs: usize,
    pub steps: u64,
    /// Total loss of the last training batch.
    pub final_loss: f64,
    pub history: Vec<ProgressReport>,
}

#[derive(Debug, Clone)]
pub struct Trainer {
    network: Network,
    config: TrainConfig,
    grads: Gradients,
    steps: u64,
}

impl Trainer {
    /// Validate `config` and initialize a fresh network from `config.seed`.
    pub fn new(config: TrainConfig) -> Result<Self> {
        config.validate()?;
        let network = Network::new_with_seed(&config.network, config.seed)?;
        Self::with_network(network, config)
    }

    /// Train an existing network. Its shape must match `config.network`.
    pub fn with_network(network: Network, config: TrainConfig) -> Result<Self> {
        config.validate()?;
        let expected = config.network.sizes();
        let actual: Vec<usize> = std::iter::once(network.input_dim())
            .chain(network.layers().iter().map(|l| l.out_dim()))
            .collect();
        if actual != expected {
            return Err(Error::ShapeMismatch(format!(
                "network sizes {actual:?} do not match configured sizes {expected:?}"
            )));
        }

        let grads = network.gradients();
        Ok(Self {
            network,
            config,
            grads,
            steps: 0,
        })
    }

    #[inline]
    pub fn network(&self) -> &Network {
        &self.network
    }

    #[inline]
    pub fn into_network(self) -> Network {
        self.network
    }

    #[inline]
    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Number of parameter updates applied so far.
    #[inline]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn forward(&self, images: &[f64]) -> Result<Matrix> {
        self.network.forward(images)
    }

    pub fn predict(&self, images: &[f64]) -> Result<Vec<usize>> {
        self.network.predict(images)
    }

    /// Loss and gradients at the configured regularization strength.
    pub fn loss_and_gradients(
        &self,
        images: &[f64],
        labels: &[usize],
    ) -> Result<(BatchLoss, Gradients)> {
        self.network
            .loss_and_gradients(images, labels, self.config.reg)
    }

    /// Plain SGD at the configured learning rate.
    pub fn update(&mut self, grads: &Gradients) -> Result<()> {
        self.network.sgd_step(grads, self.config.learning_rate)?;
        self.steps += 1;
        Ok(())
    }

    /// One iteration: forward, loss, backward, update.
    ///
    /// A non-finite loss is returned as [`Error::NonFiniteLoss`] and the update
    /// is skipped.
    pub fn step(&mut self, images: &[f64], labels: &[usize]) -> Result<BatchLoss> {
        let loss = self.network.loss_and_gradients_into(
            images,
            labels,
            self.config.reg,
            &mut self.grads,
        )?;
        if !loss.total().is_finite() {
            log::error!(
                "non-finite loss {} at step {}; parameters left unchanged",
                loss.total(),
                self.steps
            );
            return Err(Error::NonFiniteLoss {
                step: self.steps,
                loss: loss.total(),
            });
        }

        self.network
            .sgd_step(&self.grads, self.config.learning_rate)?;
        self.steps += 1;
        Ok(loss)
    }

    /// Train for `config.epochs` epochs.
    pub fn fit(&mut self, train: &Dataset, validation: Option<&Dataset>) -> Result<FitReport> {
        self.fit_with_callback(train, validation, |_| {})
    }

    /// Train for `config.epochs` epochs, handing every progress report to
    /// `on_progress` as well as the log.
    pub fn fit_with_callback<F>(
        &mut self,
        train: &Dataset,
        validation: Option<&Dataset>,
        mut on_progress: F,
    ) -> Result<FitReport>
    where
        F: FnMut(&ProgressReport),
    {
        self.check_dataset(train, "train")?;
        let validation = match validation {
            Some(v) => {
                self.check_dataset(v, "validation")?;
                let n = self.config.validation_sample.unwrap_or(v.len()).min(v.len());
                Some(v.batch(0..n)?)
            }
            None => None,
        };

        let batch_size = self.config.batch_size;
        let iterations = train.batches(batch_size).len();
        if iterations == 0 {
            return Err(Error::InvalidConfig(format!(
                "train partition of {} examples is smaller than one batch of {batch_size}",
                train.len()
            )));
        }

        let mut order: Vec<usize> = (0..train.len()).collect();
        let mut shuffle_rng = match self.config.shuffle {
            Shuffle::None => None,
            Shuffle::Seeded(seed) => Some(StdRng::seed_from_u64(seed)),
        };
        let mut batch_images = Vec::with_capacity(batch_size * train.input_dim());
        let mut batch_labels = Vec::with_capacity(batch_size);

        let mut history = Vec::new();
        let mut final_loss = f64::NAN;

        for epoch in 1..=self.config.epochs {
            log::debug!("epoch {epoch}/{} started", self.config.epochs);
            if let Some(rng) = shuffle_rng.as_mut() {
                order.shuffle(rng);
            }

            let mut contiguous = train.batches(batch_size);
            for i in 0..iterations {
                let (images, labels) = match &shuffle_rng {
                    None => match contiguous.next() {
                        Some(batch) => (batch.images, batch.labels),
                        None => break,
                    },
                    Some(_) => {
                        batch_images.clear();
                        batch_labels.clear();
                        for &idx in &order[i * batch_size..(i + 1) * batch_size] {
                            batch_images.extend_from_slice(train.image(idx));
                            batch_labels.push(train.label(idx));
                        }
                        (batch_images.as_slice(), batch_labels.as_slice())
                    }
                };

                let loss = self.step(images, labels)?;
                final_loss = loss.total();

                if self.config.log_every > 0 && i % self.config.log_every == 0 {
                    let train_accuracy = metrics::accuracy(&self.predict(images)?, labels)?;
                    let validation_accuracy = match validation {
                        Some(v) => Some(metrics::accuracy(&self.predict(v.images)?, v.labels)?),
                        None => None,
                    };
                    let report = ProgressReport {
                        epoch,
                        iteration: i,
                        iterations_per_epoch: iterations,
                        loss: final_loss,
                        train_accuracy,
                        validation_accuracy,
                    };
                    log_progress(&report);
                    on_progress(&report);
                    history.push(report);
                }
            }
        }

        Ok(FitReport {
            epochs: self.config.epochs,
            steps: self.steps,
            final_loss,
            history,
        })
    }

    /// Mean data loss and accuracy over `data`, in chunks of `batch_size`.
    ///
    /// Unlike training, the final partial chunk is included.
    pub fn evaluate(&self, data: &Dataset) -> Result<EvalReport> {
        self.check_dataset(data, "evaluation")?;

        let mut loss_sum = 0.0_f64;
        let mut correct = 0_usize;
        for start in (0..data.len()).step_by(self.config.batch_size) {
            let end = (start + self.config.batch_size).min(data.len());
            let batch = data.batch(start..end)?;
            let scores = self.network.forward(batch.images)?;

            loss_sum += loss::softmax_cross_entropy(&scores, batch.labels) * batch.len() as f64;
            correct += (0..scores.rows())
                .filter(|&r| loss::argmax(scores.row(r)) == batch.labels[r])
                .count();
        }

        Ok(EvalReport {
            loss: loss_sum / data.len() as f64,
            accuracy: correct as f64 / data.len() as f64,
            len: data.len(),
        })
    }

    pub fn accuracy(&self, data: &Dataset) -> Result<f64> {
        Ok(self.evaluate(data)?.accuracy)
    }

    fn check_dataset(&self, data: &Dataset, name: &str) -> Result<()> {
        if data.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "{name} partition must not be empty"
            )));
        }
        if data.input_dim() != self.network.input_dim() {
            return Err(Error::ShapeMismatch(format!(
                "{name} input_dim {} does not match network input_dim {}",
                data.input_dim(),
                self.network.input_dim()
            )));
        }
        if data.num_classes() != self.network.num_classes() {
            return Err(Error::ShapeMismatch(format!(
                "{name} num_classes {} does not match network num_classes {}",
                data.num_classes(),
                self.network.num_classes()
            )));
        }
        Ok(())
    }
}

fn log_progress(report: &ProgressReport) {
    match report.validation_accuracy {
        Some(val_acc) => log::info!(
            "epoch {} iteration {} / {}: loss {:.6} val_acc {:.4} train_acc {:.4}",
            report.epoch,
            report.iteration,
            report.iterations_per_epoch,
            report.loss,
            val_acc,
            report.train_accuracy
        ),
        None => log::info!(
            "epoch {} iteration {} / {}: loss {:.6} train_acc {:.4}",
            report.epoch,
            report.iteration,
            report.iterations_per_epoch,
            report.loss,
            report.train_accuracy
        ),
    }
}
