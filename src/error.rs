//! Error types for the avalanche prediction pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, AvalancheError>;

/// Main error type for the avalanche prediction pipeline
#[derive(Error, Debug)]
pub enum AvalancheError {
    #[error("Load error: {0}")]
    Load(String),

    #[error("Required column missing: {0}")]
    MissingColumn(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Unknown model: {0} (expected one of: mlp, logistic, hac)")]
    UnknownModel(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Shape mismatch: expected {expected} features, got {actual}")]
    Shape { expected: usize, actual: usize },

    #[error("Model not fitted")]
    NotFitted,

    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<polars::error::PolarsError> for AvalancheError {
    fn from(err: polars::error::PolarsError) -> Self {
        AvalancheError::Load(err.to_string())
    }
}
