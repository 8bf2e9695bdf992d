//! Error types for model fitting and scoring.

use thiserror::Error;

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors that can occur while building, fitting, or scoring a model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The factory does not know the requested identifier.
    #[error("Unknown model identifier: {0}")]
    UnknownModel(String),

    /// `score` was called before `fit`.
    #[error("Model has not been fitted")]
    NotFitted,

    /// Too few rows to fit.
    #[error("Insufficient data: need at least {required} rows, got {actual}")]
    InsufficientData {
        /// Required number of rows
        required: usize,
        /// Actual number of rows
        actual: usize,
    },

    /// Feature or row dimensions disagree.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// A configuration value is out of range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The normal-equation matrix could not be factorized.
    #[error("Matrix is singular or not positive definite")]
    SingularMatrix,

    /// A requested feature column is absent from the frame.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// The target column contains nulls.
    #[error("Target column contains {nulls} null value(s)")]
    MissingTarget {
        /// Number of null targets encountered
        nulls: usize,
    },

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}
