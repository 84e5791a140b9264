//! Run configuration.
//!
//! Every hyperparameter is fixed at construction; there are no schedules. The
//! defaults reproduce the reference MNIST run: a 784-500-200-10 network,
//! minibatches of 64, learning rate 1e-3, L2 strength 0.1, 10 epochs.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Network architecture: `input_dim -> hidden1 -> hidden2 -> num_classes`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkConfig {
    pub input_dim: usize,
    pub hidden1: usize,
    pub hidden2: usize,
    pub num_classes: usize,
    /// Standard deviation of the Gaussian weight initializer.
    pub weight_scale: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            input_dim: 784,
            hidden1: 500,
            hidden2: 200,
            num_classes: 10,
            weight_scale: 0.005,
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, dim) in [
            ("input_dim", self.input_dim),
            ("hidden1", self.hidden1),
            ("hidden2", self.hidden2),
            ("num_classes", self.num_classes),
        ] {
            if dim == 0 {
                return Err(Error::InvalidConfig(format!("{name} must be > 0")));
            }
        }
        if !(self.weight_scale.is_finite() && self.weight_scale >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "weight_scale must be finite and >= 0, got {}",
                self.weight_scale
            )));
        }
        Ok(())
    }

    /// Layer widths including input and output.
    #[inline]
    pub fn sizes(&self) -> [usize; 4] {
        [self.input_dim, self.hidden1, self.hidden2, self.num_classes]
    }
}

/// Example ordering within an epoch.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", content = "seed", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shuffle {
    /// Contiguous batches in dataset order; the cut points repeat every epoch.
    #[default]
    None,
    /// A fresh permutation every epoch, drawn from an RNG seeded once per run.
    Seeded(u64),
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainConfig {
    pub network: NetworkConfig,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// L2 regularization strength.
    pub reg: f64,
    pub epochs: usize,
    /// Seed for weight initialization.
    pub seed: u64,
    /// Report progress every `log_every` iterations within an epoch (0 disables).
    pub log_every: usize,
    pub shuffle: Shuffle,
    /// Evaluate progress on only the first `n` validation examples.
    pub validation_sample: Option<usize>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            batch_size: 64,
            learning_rate: 1e-3,
            reg: 1e-1,
            epochs: 10,
            seed: 0,
            log_every: 100,
            shuffle: Shuffle::None,
            validation_sample: None,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        self.network.validate()?;
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be > 0".to_owned()));
        }
        if self.epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be > 0".to_owned()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning_rate must be finite and > 0, got {}",
                self.learning_rate
            )));
        }
        if !(self.reg.is_finite() && self.reg >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "reg must be finite and >= 0, got {}",
                self.reg
            )));
        }
        if self.validation_sample == Some(0) {
            return Err(Error::InvalidConfig(
                "validation_sample must be > 0 when set".to_owned(),
            ));
        }
        Ok(())
    }
}
