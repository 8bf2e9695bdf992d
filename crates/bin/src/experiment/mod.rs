//! Experiment glue for the command-line interface.
//!
//! Wires data acquisition, panel assembly, and artifact discovery
//! together so the command handlers stay thin.

pub(crate) mod artifacts;
pub(crate) mod assemble;
pub(crate) mod cache_manager;
pub(crate) mod data_pipeline;
