#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod client;
pub mod error;
pub mod parse;

pub use client::{GraderClient, GraderConfig};
pub use error::{GraderError, Result};
pub use parse::parse_score;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
