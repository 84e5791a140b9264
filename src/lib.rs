//! A from-scratch fully-connected classifier trainer.
//!
//! `fcnn` trains a three-layer network (two ReLU hidden layers, a linear output
//! layer) with softmax cross-entropy, L2 weight regularization and plain
//! minibatch gradient descent. It is built for deterministic single-process
//! batch jobs such as MNIST digit classification.
//!
//! # Design goals
//!
//! - Determinism: a fixed seed, fixed hyperparameters and fixed data give
//!   bit-identical parameter trajectories.
//! - Clear contracts: shapes are explicit and validated at the API boundary.
//! - No global state: parameters live in a [`Network`], hyperparameters in a
//!   [`TrainConfig`], and a [`Trainer`] ties them together.
//!
//! # Panics vs `Result`
//!
//! - Low-level helpers ([`loss`], layer internals) assert their shape
//!   contracts and panic on misuse.
//! - Everything on [`Network`] and [`Trainer`] validates its inputs and returns
//!   [`Result`]. A non-finite training loss surfaces as
//!   [`Error::NonFiniteLoss`] before any parameter is touched.
//!
//! # Data layout and shapes
//!
//! - Scalars are `f64`.
//! - Image batches are flat row-major buffers of shape `(batch, input_dim)`.
//! - Layer weights are row-major with shape `(in_dim, out_dim)`.
//!
//! # Quick start
//!
//! ```rust
//! use fcnn::{Dataset, NetworkConfig, TrainConfig, Trainer};
//!
//! # fn main() -> fcnn::Result<()> {
//! let images = vec![
//!     vec![1.0, 0.0, 0.0, 1.0],
//!     vec![0.0, 1.0, 1.0, 0.0],
//! ];
//! let train = Dataset::from_rows(&images, &[0, 1], 2)?;
//!
//! let mut trainer = Trainer::new(TrainConfig {
//!     network: NetworkConfig {
//!         input_dim: 4,
//!         hidden1: 8,
//!         hidden2: 8,
//!         num_classes: 2,
//!         weight_scale: 0.5,
//!     },
//!     batch_size: 2,
//!     learning_rate: 0.1,
//!     reg: 0.0,
//!     epochs: 50,
//!     log_every: 0,
//!     ..TrainConfig::default()
//! })?;
//!
//! let report = trainer.fit(&train, None)?;
//! assert_eq!(report.steps, 50);
//! let _labels = trainer.predict(train.images())?;
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod config;
pub mod data;
pub mod error;
pub mod layer;
pub mod loss;
pub(crate) mod matmul;
pub mod matrix;
pub mod metrics;
pub mod mnist;
pub mod network;
pub mod train;

#[cfg(feature = "serde")]
pub mod serde_model;

pub use activation::Activation;
pub use config::{NetworkConfig, Shuffle, TrainConfig};
pub use data::{Batch, Batches, Dataset, Partitions};
pub use error::{Error, Result};
pub use layer::Layer;
pub use matrix::Matrix;
pub use metrics::EvalReport;
pub use network::{Activations, BatchLoss, Gradients, Network};
pub use train::{FitReport, ProgressReport, Trainer};
