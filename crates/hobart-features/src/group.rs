//! The transform interface shared by all feature groups.

use polars::prelude::*;

use crate::error::Result;

/// A family of related indicator columns computed per ticker.
///
/// Implementations append their [`output_columns`](Self::output_columns)
/// to the input frame; existing columns pass through untouched. All
/// windowed expressions partition by ticker, so one instrument's history
/// never leaks into another's.
pub trait FeatureGroup: std::fmt::Debug {
    /// Group identifier.
    fn name(&self) -> &str;

    /// Columns the input frame must provide.
    fn required_columns(&self) -> &[&str];

    /// Columns this group appends, in output order.
    fn output_columns(&self) -> Vec<String>;

    /// Append this group's columns to the frame.
    fn compute(&self, data: LazyFrame) -> Result<LazyFrame>;
}
