#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod actions;
pub mod cache;
pub mod error;
pub mod macros;
pub mod yahoo;

pub use actions::ActionStore;
pub use cache::QuoteCache;
pub use error::{DataError, Result};
pub use macros::MacroProvider;
pub use yahoo::QuoteProvider;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
