//! Controller error types.

use thiserror::Error;

/// Errors raised by the decision engine and its boundaries.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("metric source error: {0}")]
    MetricSource(String),

    #[error("configuration store error: {0}")]
    Store(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ControllerResult<T> = Result<T, ControllerError>;
