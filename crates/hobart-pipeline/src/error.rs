//! Error types for pipeline operations.

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised while walking years, selecting submissions, or writing
/// artifacts.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The training window holds fewer rows than the configured minimum.
    #[error("Year {year}: {rows} training row(s), {required} required")]
    DataInsufficient {
        /// Evaluation year that was skipped.
        year: i32,
        /// Non-null training rows available.
        rows: usize,
        /// Configured minimum.
        required: usize,
    },

    /// The evaluation year has no rows to score.
    #[error("Year {year}: empty prediction set")]
    EmptyPredictionSet {
        /// Evaluation year that was skipped.
        year: i32,
    },

    /// Configured feature columns are absent from the year's frames.
    #[error("Year {year}: feature column(s) {missing:?} absent")]
    SchemaMismatch {
        /// Evaluation year the mismatch was detected for.
        year: i32,
        /// Configured columns the frames do not carry.
        missing: Vec<String>,
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No distinct, collision-free artifact name could be produced.
    #[error("Could not find a free artifact name after {attempts} attempt(s)")]
    ArtifactCollision {
        /// Timestamp advances tried before giving up.
        attempts: usize,
    },

    /// Panel error.
    #[error("Panel error: {0}")]
    Panel(#[from] hobart_panel::PanelError),

    /// Model error.
    #[error("Model error: {0}")]
    Model(#[from] hobart_model::ModelError),

    /// Polars error.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// CSV serialization error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether this error skips one year and lets the batch continue.
    pub const fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::DataInsufficient { .. } | Self::EmptyPredictionSet { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_classification() {
        let skip = PipelineError::DataInsufficient {
            year: 2021,
            rows: 400,
            required: 500,
        };
        assert!(skip.is_skip());

        let fatal = PipelineError::SchemaMismatch {
            year: 2021,
            missing: vec!["rsi_14".to_string()],
        };
        assert!(!fatal.is_skip());
    }
}
