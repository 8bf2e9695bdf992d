//! Trend-following features.
//!
//! Price position relative to moving averages, a fast/slow average
//! crossover ratio, and the MACD family. MACD terms are divided by the
//! close so the columns are comparable across price levels.

use hobart_panel::schema;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};
use crate::group::FeatureGroup;

/// Configuration for [`TrendSignals`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendSignalsConfig {
    /// Fast moving-average window (default: 20).
    pub short_window: usize,
    /// Slow moving-average window (default: 50).
    pub long_window: usize,
    /// MACD fast EMA span (default: 12).
    pub macd_fast: usize,
    /// MACD slow EMA span (default: 26).
    pub macd_slow: usize,
    /// MACD signal EMA span (default: 9).
    pub macd_signal: usize,
}

impl Default for TrendSignalsConfig {
    fn default() -> Self {
        Self {
            short_window: 20,
            long_window: 50,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
        }
    }
}

/// Moving-average and MACD trend indicators.
#[derive(Debug)]
pub struct TrendSignals {
    config: TrendSignalsConfig,
}

impl TrendSignals {
    /// Create the group, validating the configuration.
    pub fn new(config: TrendSignalsConfig) -> Result<Self> {
        if config.short_window == 0 || config.macd_fast == 0 || config.macd_signal == 0 {
            return Err(FeatureError::InvalidConfig(
                "trend windows must be >= 1".to_string(),
            ));
        }
        if config.short_window >= config.long_window {
            return Err(FeatureError::InvalidConfig(
                "short_window must be smaller than long_window".to_string(),
            ));
        }
        if config.macd_fast >= config.macd_slow {
            return Err(FeatureError::InvalidConfig(
                "macd_fast must be smaller than macd_slow".to_string(),
            ));
        }
        Ok(Self { config })
    }

    fn sma(window: usize) -> Expr {
        col(schema::CLOSE).rolling_mean(RollingOptionsFixedWindow {
            window_size: window,
            min_periods: window,
            ..Default::default()
        })
    }

    fn ema(span: usize, input: Expr) -> Expr {
        input.ewm_mean(EWMOptions {
            alpha: 2.0 / (span as f64 + 1.0),
            adjust: false,
            min_periods: span,
            ignore_nulls: true,
            ..Default::default()
        })
    }

    /// MACD line before per-ticker partitioning.
    fn macd_line(&self) -> Expr {
        (Self::ema(self.config.macd_fast, col(schema::CLOSE))
            - Self::ema(self.config.macd_slow, col(schema::CLOSE)))
            / col(schema::CLOSE)
    }

    fn signal_line(&self) -> Expr {
        Self::ema(
            self.config.macd_signal,
            Self::ema(self.config.macd_fast, col(schema::CLOSE))
                - Self::ema(self.config.macd_slow, col(schema::CLOSE)),
        ) / col(schema::CLOSE)
    }
}

impl Default for TrendSignals {
    fn default() -> Self {
        Self {
            config: TrendSignalsConfig::default(),
        }
    }
}

impl FeatureGroup for TrendSignals {
    fn name(&self) -> &str {
        "trend"
    }

    fn required_columns(&self) -> &[&str] {
        &[schema::TICKER, schema::DATE, schema::CLOSE]
    }

    fn output_columns(&self) -> Vec<String> {
        vec![
            format!("price_to_sma_{}", self.config.short_window),
            format!("price_to_sma_{}", self.config.long_window),
            format!("sma_{}_to_{}", self.config.short_window, self.config.long_window),
            "macd".to_string(),
            "macd_signal".to_string(),
            "macd_histogram".to_string(),
        ]
    }

    fn compute(&self, data: LazyFrame) -> Result<LazyFrame> {
        let short = self.config.short_window;
        let long = self.config.long_window;
        let ticker = [col(schema::TICKER)];

        Ok(data.with_columns([
            (col(schema::CLOSE) / Self::sma(short) - lit(1.0))
                .over(ticker.clone())
                .alias(format!("price_to_sma_{short}")),
            (col(schema::CLOSE) / Self::sma(long) - lit(1.0))
                .over(ticker.clone())
                .alias(format!("price_to_sma_{long}")),
            (Self::sma(short) / Self::sma(long) - lit(1.0))
                .over(ticker.clone())
                .alias(format!("sma_{short}_to_{long}")),
            self.macd_line().over(ticker.clone()).alias("macd"),
            self.signal_line().over(ticker.clone()).alias("macd_signal"),
            (self.macd_line() - self.signal_line())
                .over(ticker)
                .alias("macd_histogram"),
        ]))
    }
}
