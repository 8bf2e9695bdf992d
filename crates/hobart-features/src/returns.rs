//! Trailing return features.
//!
//! Simple percentage changes of the close over several lookback
//! horizons, each computed within its own ticker's sequence.

use hobart_panel::schema;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};
use crate::group::FeatureGroup;

/// Configuration for [`RollingReturns`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingReturnsConfig {
    /// Lookback horizons in trading days (default: 1, 5, 20, 63, 126).
    pub horizons: Vec<usize>,
}

impl Default for RollingReturnsConfig {
    fn default() -> Self {
        Self {
            horizons: vec![1, 5, 20, 63, 126],
        }
    }
}

/// Trailing close-to-close returns over multiple horizons.
#[derive(Debug)]
pub struct RollingReturns {
    config: RollingReturnsConfig,
}

impl RollingReturns {
    /// Create the group, validating the configuration.
    pub fn new(config: RollingReturnsConfig) -> Result<Self> {
        if config.horizons.is_empty() {
            return Err(FeatureError::InvalidConfig(
                "returns group needs at least one horizon".to_string(),
            ));
        }
        if config.horizons.contains(&0) {
            return Err(FeatureError::InvalidConfig(
                "return horizons must be >= 1".to_string(),
            ));
        }
        Ok(Self { config })
    }
}

impl Default for RollingReturns {
    fn default() -> Self {
        Self {
            config: RollingReturnsConfig::default(),
        }
    }
}

impl FeatureGroup for RollingReturns {
    fn name(&self) -> &str {
        "returns"
    }

    fn required_columns(&self) -> &[&str] {
        &[schema::TICKER, schema::DATE, schema::CLOSE]
    }

    fn output_columns(&self) -> Vec<String> {
        self.config
            .horizons
            .iter()
            .map(|h| format!("return_{h}d"))
            .collect()
    }

    fn compute(&self, data: LazyFrame) -> Result<LazyFrame> {
        let exprs: Vec<Expr> = self
            .config
            .horizons
            .iter()
            .map(|&h| {
                (col(schema::CLOSE) / col(schema::CLOSE).shift(lit(h as i64)) - lit(1.0))
                    .over([col(schema::TICKER)])
                    .alias(format!("return_{h}d"))
            })
            .collect();
        Ok(data.with_columns(exprs))
    }
}
