//! Metrics.
//!
//! Metrics are evaluation helpers; they never participate in backprop.

use crate::{Error, Result};

/// Fraction of `predicted` labels equal to `labels`.
pub fn accuracy(predicted: &[usize], labels: &[usize]) -> Result<f64> {
    if predicted.len() != labels.len() {
        return Err(Error::ShapeMismatch(format!(
            "predicted len {} does not match labels len {}",
            predicted.len(),
            labels.len()
        )));
    }
    if labels.is_empty() {
        return Err(Error::InvalidData(
            "accuracy of an empty set is undefined".to_owned(),
        ));
    }

    let correct = predicted.iter().zip(labels).filter(|(p, l)| p == l).count();
    Ok(correct as f64 / labels.len() as f64)
}

/// Forward-only evaluation of a dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalReport {
    /// Mean data loss (regularization excluded).
    pub loss: f64,
    pub accuracy: f64,
    pub len: usize,
}
