//! Realized-volatility features.
//!
//! Rolling standard deviation of daily returns over several windows,
//! plus an average-true-range ratio so gap risk is captured alongside
//! close-to-close noise.

use hobart_panel::schema;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};
use crate::group::FeatureGroup;

/// Configuration for [`VolatilitySignals`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilitySignalsConfig {
    /// Rolling windows for return volatility (default: 20, 63).
    pub windows: Vec<usize>,
    /// Average-true-range period (default: 14).
    pub atr_period: usize,
}

impl Default for VolatilitySignalsConfig {
    fn default() -> Self {
        Self {
            windows: vec![20, 63],
            atr_period: 14,
        }
    }
}

/// Rolling volatility and ATR indicators.
#[derive(Debug)]
pub struct VolatilitySignals {
    config: VolatilitySignalsConfig,
}

impl VolatilitySignals {
    /// Create the group, validating the configuration.
    pub fn new(config: VolatilitySignalsConfig) -> Result<Self> {
        if config.windows.is_empty() {
            return Err(FeatureError::InvalidConfig(
                "volatility group needs at least one window".to_string(),
            ));
        }
        if config.windows.iter().any(|w| *w < 2) || config.atr_period == 0 {
            return Err(FeatureError::InvalidConfig(
                "volatility windows must be >= 2 and atr_period >= 1".to_string(),
            ));
        }
        Ok(Self { config })
    }

    fn daily_return() -> Expr {
        col(schema::CLOSE) / col(schema::CLOSE).shift(lit(1)) - lit(1.0)
    }

    /// True range: the widest of today's span and either gap from the
    /// prior close.
    fn true_range() -> Expr {
        let span = col(schema::HIGH) - col(schema::LOW);
        let gap_up = (col(schema::HIGH) - col(schema::CLOSE).shift(lit(1))).abs();
        let gap_down = (col(schema::LOW) - col(schema::CLOSE).shift(lit(1))).abs();
        when(span.clone().gt_eq(gap_up.clone()).and(span.clone().gt_eq(gap_down.clone())))
            .then(span)
            .otherwise(
                when(gap_up.clone().gt_eq(gap_down.clone()))
                    .then(gap_up)
                    .otherwise(gap_down),
            )
    }
}

impl Default for VolatilitySignals {
    fn default() -> Self {
        Self {
            config: VolatilitySignalsConfig::default(),
        }
    }
}

impl FeatureGroup for VolatilitySignals {
    fn name(&self) -> &str {
        "volatility"
    }

    fn required_columns(&self) -> &[&str] {
        &[
            schema::TICKER,
            schema::DATE,
            schema::HIGH,
            schema::LOW,
            schema::CLOSE,
        ]
    }

    fn output_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self
            .config
            .windows
            .iter()
            .map(|w| format!("volatility_{w}d"))
            .collect();
        columns.push(format!("atr_{}_ratio", self.config.atr_period));
        columns
    }

    fn compute(&self, data: LazyFrame) -> Result<LazyFrame> {
        let ticker = [col(schema::TICKER)];
        let mut exprs: Vec<Expr> = self
            .config
            .windows
            .iter()
            .map(|&w| {
                Self::daily_return()
                    .rolling_std(RollingOptionsFixedWindow {
                        window_size: w,
                        min_periods: w,
                        ..Default::default()
                    })
                    .over(ticker.clone())
                    .alias(format!("volatility_{w}d"))
            })
            .collect();

        let atr = Self::true_range()
            .rolling_mean(RollingOptionsFixedWindow {
                window_size: self.config.atr_period,
                min_periods: self.config.atr_period,
                ..Default::default()
            })
            / col(schema::CLOSE);
        exprs.push(
            atr.over(ticker)
                .alias(format!("atr_{}_ratio", self.config.atr_period)),
        );
        Ok(data.with_columns(exprs))
    }
}
