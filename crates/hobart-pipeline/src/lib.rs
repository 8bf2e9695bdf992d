#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod jobs;
pub mod report;
pub mod selector;
pub mod trainer;

pub use error::{PipelineError, Result};
pub use jobs::{JobOutcome, JobRegistry};
pub use report::{BatchReport, RunStatus};
pub use selector::{select, Submission, SubmissionRow};
pub use trainer::{TrainerConfig, WalkForwardTrainer, YearOutcome};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
