//! Error types for grader operations.

use thiserror::Error;

/// Result type for grader operations.
pub type Result<T> = std::result::Result<T, GraderError>;

/// Errors raised while talking to the grading service.
#[derive(Debug, Error)]
pub enum GraderError {
    /// Network or protocol error from the HTTP client.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("Grader returned HTTP {status} for {context}")]
    Http {
        /// Status code the service answered with.
        status: reqwest::StatusCode,
        /// What was being attempted.
        context: String,
    },

    /// Retries were exhausted without a successful round trip.
    #[error("Gave up after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        /// Attempts made before giving up.
        attempts: usize,
        /// The last transport error observed.
        #[source]
        source: reqwest::Error,
    },

    /// A required configuration value is absent.
    #[error("Missing configuration: set {0}")]
    MissingConfig(String),

    /// The artifact file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_names_variable() {
        let err = GraderError::MissingConfig("HOBART_GRADER_URL".to_string());
        assert!(err.to_string().contains("HOBART_GRADER_URL"));
    }
}
