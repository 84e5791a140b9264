use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("label {label} at index {index} is outside [0, {num_classes})")]
    LabelOutOfRange {
        index: usize,
        label: usize,
        num_classes: usize,
    },

    /// The loss of a training step was NaN or infinite.
    ///
    /// Raised before the parameter update, so the network still holds the
    /// parameters of the previous step.
    #[error("non-finite loss {loss} at step {step}")]
    NonFiniteLoss { step: u64, loss: f64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serde")]
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
