//! Cross-sectional normalization.
//!
//! Adds per-date z-score and rank columns for a configurable column
//! subset. Every date is an independent group: the statistics for date d
//! are computed from the rows of d alone, never from neighboring dates.

use polars::prelude::*;

use crate::builder::Panel;
use crate::error::{PanelError, Result};
use crate::schema;

/// Configuration for [`CrossSectionalNormalizer`].
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Floor applied to the per-date standard deviation before dividing.
    pub sigma_floor: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self { sigma_floor: 1e-12 }
    }
}

/// Computes per-date z-scores and ordinal ranks for feature columns.
#[derive(Debug)]
pub struct CrossSectionalNormalizer {
    config: NormalizerConfig,
}

impl CrossSectionalNormalizer {
    /// Create a normalizer, validating the configuration.
    pub fn new(config: NormalizerConfig) -> Result<Self> {
        if !(config.sigma_floor > 0.0) {
            return Err(PanelError::InvalidSigmaFloor(config.sigma_floor));
        }
        Ok(Self { config })
    }

    /// The active configuration.
    pub const fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Append `{col}_zs` and `{col}_rank` columns for each named column.
    ///
    /// Z-score is `(x - mean_d) / max(std_d, floor)` with the population
    /// standard deviation of date d; a zero-spread date therefore yields
    /// zeros. Rank is the ordinal position in the date's ascending sort
    /// mapped to `[0, 1]`; a date with a single observation gets 0.5.
    /// Null inputs yield null outputs and do not contribute to the
    /// statistics.
    pub fn normalize(&self, panel: &Panel, columns: &[String]) -> Result<Panel> {
        let mut exprs: Vec<Expr> = Vec::with_capacity(columns.len() * 2);
        for name in columns {
            ensure_numeric(panel.frame(), name)?;
            exprs.push(self.zscore_expr(name));
            exprs.push(rank_expr(name));
        }
        let df = panel.lazy().with_columns(exprs).collect()?;
        Ok(Panel::with_state(df, panel.shift_applied()))
    }

    fn zscore_expr(&self, name: &str) -> Expr {
        let value = col(name).cast(DataType::Float64);
        let mean = value.clone().mean().over([col(schema::DATE)]);
        let sigma = value.clone().std(0).over([col(schema::DATE)]);
        let floored = when(sigma.clone().gt(lit(self.config.sigma_floor)))
            .then(sigma)
            .otherwise(lit(self.config.sigma_floor));
        ((value - mean) / floored).alias(schema::zscore_column(name).as_str())
    }
}

fn rank_expr(name: &str) -> Expr {
    let value = col(name).cast(DataType::Float64);
    let count = value.clone().count().over([col(schema::DATE)]);
    let ordinal = value
        .clone()
        .rank(
            RankOptions {
                method: RankMethod::Ordinal,
                descending: false,
            },
            None,
        )
        .over([col(schema::DATE)]);
    when(count.clone().gt(lit(1)))
        .then(
            (ordinal.cast(DataType::Float64) - lit(1.0))
                / (count.cast(DataType::Float64) - lit(1.0)),
        )
        .otherwise(
            when(value.is_not_null())
                .then(lit(0.5))
                .otherwise(lit(NULL)),
        )
        .alias(schema::rank_column(name).as_str())
}

fn ensure_numeric(df: &DataFrame, name: &str) -> Result<()> {
    let column = df
        .column(name)
        .map_err(|_| PanelError::UnknownColumn(name.to_string()))?;
    match column.dtype() {
        DataType::Float64
        | DataType::Float32
        | DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => Ok(()),
        other => Err(PanelError::InvalidColumnType {
            column: name.to_string(),
            dtype: other.to_string(),
        }),
    }
}
