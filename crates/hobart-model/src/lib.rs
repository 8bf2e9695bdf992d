#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod compact;
pub mod error;
pub mod gbt;
pub mod matrix;
pub mod ranking;
pub mod ridge;
mod tree;

pub use compact::{CompactConfig, CompactLearner};
pub use error::{ModelError, Result};
pub use gbt::{GbtConfig, GradientBoostedTrees};
pub use matrix::{FeatureMatrix, feature_matrix, target_vector};
pub use ranking::{AVAILABLE_MODELS, RankingModel, from_spec};
pub use ridge::{RidgeConfig, RidgeModel};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
