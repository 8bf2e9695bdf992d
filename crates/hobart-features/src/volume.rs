//! Volume and turnover features.
//!
//! Relative volume against its rolling average, cumulative on-balance
//! volume, and log dollar volume as a liquidity proxy.

use hobart_panel::schema;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};
use crate::group::FeatureGroup;

/// Configuration for [`VolumeSignals`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeSignalsConfig {
    /// Rolling window for the average-volume baseline (default: 20).
    pub window: usize,
}

impl Default for VolumeSignalsConfig {
    fn default() -> Self {
        Self { window: 20 }
    }
}

/// Relative volume, OBV, and dollar-volume indicators.
#[derive(Debug)]
pub struct VolumeSignals {
    config: VolumeSignalsConfig,
}

impl VolumeSignals {
    /// Create the group, validating the configuration.
    pub fn new(config: VolumeSignalsConfig) -> Result<Self> {
        if config.window < 2 {
            return Err(FeatureError::InvalidConfig(
                "volume window must be >= 2".to_string(),
            ));
        }
        Ok(Self { config })
    }

    fn volume() -> Expr {
        col(schema::VOLUME).cast(DataType::Float64)
    }

    /// Volume signed by the day's price direction, accumulated.
    fn on_balance_volume() -> Expr {
        let prior = col(schema::CLOSE).shift(lit(1));
        let signed = when(col(schema::CLOSE).gt(prior.clone()))
            .then(Self::volume())
            .otherwise(
                when(col(schema::CLOSE).lt(prior))
                    .then(-Self::volume())
                    .otherwise(lit(0.0)),
            );
        signed.fill_null(lit(0.0)).cum_sum(false)
    }
}

impl Default for VolumeSignals {
    fn default() -> Self {
        Self {
            config: VolumeSignalsConfig::default(),
        }
    }
}

impl FeatureGroup for VolumeSignals {
    fn name(&self) -> &str {
        "volume"
    }

    fn required_columns(&self) -> &[&str] {
        &[
            schema::TICKER,
            schema::DATE,
            schema::CLOSE,
            schema::VOLUME,
        ]
    }

    fn output_columns(&self) -> Vec<String> {
        vec![
            format!("volume_ratio_{}", self.config.window),
            "obv".to_string(),
            "log_dollar_volume".to_string(),
        ]
    }

    fn compute(&self, data: LazyFrame) -> Result<LazyFrame> {
        let ticker = [col(schema::TICKER)];
        let baseline = Self::volume().rolling_mean(RollingOptionsFixedWindow {
            window_size: self.config.window,
            min_periods: self.config.window,
            ..Default::default()
        });

        Ok(data.with_columns([
            (Self::volume() / baseline)
                .over(ticker.clone())
                .alias(format!("volume_ratio_{}", self.config.window)),
            Self::on_balance_volume().over(ticker).alias("obv"),
            (col(schema::CLOSE) * Self::volume())
                .log1p()
                .alias("log_dollar_volume"),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quotes() -> LazyFrame {
        df!(
            "ticker" => ["AAA", "AAA", "AAA", "AAA"],
            "date" => [0i32, 1, 2, 3],
            "close" => [100.0, 102.0, 101.0, 101.0],
            "volume" => [1000i64, 2000, 1500, 3000],
        )
        .unwrap()
        .lazy()
    }

    #[test]
    fn test_volume_ratio_against_rolling_mean() {
        let group = VolumeSignals::new(VolumeSignalsConfig { window: 2 }).unwrap();
        let out = group.compute(quotes()).unwrap().collect().unwrap();
        let ratio = out.column("volume_ratio_2").unwrap().f64().unwrap();

        assert!(ratio.get(0).is_none());
        assert_relative_eq!(ratio.get(1).unwrap(), 2000.0 / 1500.0, epsilon = 1e-12);
        assert_relative_eq!(ratio.get(3).unwrap(), 3000.0 / 2250.0, epsilon = 1e-12);
    }

    #[test]
    fn test_obv_accumulates_signed_volume() {
        let group = VolumeSignals::new(VolumeSignalsConfig { window: 2 }).unwrap();
        let out = group.compute(quotes()).unwrap().collect().unwrap();
        let obv = out.column("obv").unwrap().f64().unwrap();

        // Day 0 has no direction, then +2000, -1500, and a flat day.
        assert_relative_eq!(obv.get(0).unwrap(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(obv.get(1).unwrap(), 2000.0, epsilon = 1e-12);
        assert_relative_eq!(obv.get(2).unwrap(), 500.0, epsilon = 1e-12);
        assert_relative_eq!(obv.get(3).unwrap(), 500.0, epsilon = 1e-12);
    }

    #[test]
    fn test_log_dollar_volume() {
        let group = VolumeSignals::default();
        let out = group.compute(quotes()).unwrap().collect().unwrap();
        let dollar = out.column("log_dollar_volume").unwrap().f64().unwrap();
        assert_relative_eq!(
            dollar.get(0).unwrap(),
            (100.0f64 * 1000.0 + 1.0).ln(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_tiny_window_rejected() {
        assert!(VolumeSignals::new(VolumeSignalsConfig { window: 1 }).is_err());
    }
}
