#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod group;
pub mod oscillators;
pub mod registry;
pub mod returns;
pub mod trend;
pub mod volatility;
pub mod volume;

pub use error::{FeatureError, Result};
pub use group::FeatureGroup;
pub use registry::{FeatureInfo, augment, augment_with, available_groups, default_groups};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
