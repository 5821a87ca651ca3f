//! Structured error types for the Microval workspace.

use thiserror::Error;

/// Unified error type for all Microval operations.
#[derive(Debug, Error)]
pub enum MicrovalError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error (malformed table, non-numeric abundance cell)
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid input (bad arguments, out-of-range values)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A target-row value matches neither configured class label.
    #[error("unmapped label: sample '{sample}' has value '{value}', expected the positive or negative label")]
    UnmappedLabel { sample: String, value: String },

    /// A value is outside the domain of the requested transform.
    #[error("invalid transform input: sample '{sample}', feature '{feature}' has value {value}")]
    InvalidTransformInput {
        sample: String,
        feature: String,
        value: f64,
    },

    /// The fold count exceeds what the minority class can stratify.
    #[error(
        "insufficient samples: {n_folds} folds need at least {n_folds} samples per class \
         (positive: {n_positive}, negative: {n_negative})"
    )]
    InsufficientSamples {
        n_folds: usize,
        n_positive: usize,
        n_negative: usize,
    },

    /// Every evaluated fold was degenerate, so there is nothing to aggregate.
    #[error("no valid folds to aggregate")]
    NoValidFolds,

    /// Failure reported by a black-box predictor during fit or scoring.
    #[error("predictor error: {0}")]
    Predictor(String),

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the Microval workspace.
pub type Result<T> = std::result::Result<T, MicrovalError>;
