//! Error types for feature computation.

use thiserror::Error;

/// Errors surfaced while computing feature groups.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// The input frame lacks columns a group needs.
    #[error("feature group '{group}' requires missing columns: {columns:?}")]
    MissingColumns {
        /// Group that raised the error.
        group: String,
        /// Columns absent from the input.
        columns: Vec<String>,
    },

    /// A group would overwrite a column that already exists.
    #[error("feature column '{0}' already exists in the input frame")]
    ColumnCollision(String),

    /// A group was constructed with unusable parameters.
    #[error("invalid feature configuration: {0}")]
    InvalidConfig(String),

    /// Underlying polars failure.
    #[error(transparent)]
    Polars(#[from] polars::error::PolarsError),
}

/// Convenience alias for feature results.
pub type Result<T> = std::result::Result<T, FeatureError>;
