//! Bounded oscillator features.
//!
//! RSI with Wilder smoothing, the stochastic %K/%D pair, and position
//! inside the Bollinger band. All are scale-free by construction, so no
//! price normalization is applied on top.

use hobart_panel::schema;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};
use crate::group::FeatureGroup;

/// Configuration for [`Oscillators`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OscillatorsConfig {
    /// RSI smoothing period (default: 14).
    pub rsi_period: usize,
    /// Stochastic lookback period (default: 14).
    pub stoch_period: usize,
    /// Stochastic %D smoothing window (default: 3).
    pub stoch_smooth: usize,
    /// Bollinger band window (default: 20).
    pub bollinger_window: usize,
}

impl Default for OscillatorsConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            stoch_period: 14,
            stoch_smooth: 3,
            bollinger_window: 20,
        }
    }
}

/// RSI, stochastic, and Bollinger-position indicators.
#[derive(Debug)]
pub struct Oscillators {
    config: OscillatorsConfig,
}

impl Oscillators {
    /// Create the group, validating the configuration.
    pub fn new(config: OscillatorsConfig) -> Result<Self> {
        if config.rsi_period == 0
            || config.stoch_period == 0
            || config.stoch_smooth == 0
            || config.bollinger_window < 2
        {
            return Err(FeatureError::InvalidConfig(
                "oscillator windows must be >= 1 (bollinger >= 2)".to_string(),
            ));
        }
        Ok(Self { config })
    }

    fn wilder(input: Expr, period: usize) -> Expr {
        input.ewm_mean(EWMOptions {
            alpha: 1.0 / period as f64,
            adjust: false,
            min_periods: period,
            ignore_nulls: true,
            ..Default::default()
        })
    }

    fn rsi(&self) -> Expr {
        let delta = col(schema::CLOSE) - col(schema::CLOSE).shift(lit(1));
        let gains = when(delta.clone().gt(lit(0.0)))
            .then(delta.clone())
            .otherwise(lit(0.0));
        let losses = when(delta.clone().lt(lit(0.0)))
            .then(-delta)
            .otherwise(lit(0.0));
        let avg_gain = Self::wilder(gains, self.config.rsi_period);
        let avg_loss = Self::wilder(losses, self.config.rsi_period);
        lit(100.0) * avg_gain.clone() / (avg_gain + avg_loss)
    }

    fn stochastic_k(&self) -> Expr {
        let options = RollingOptionsFixedWindow {
            window_size: self.config.stoch_period,
            min_periods: self.config.stoch_period,
            ..Default::default()
        };
        let lowest = col(schema::LOW).rolling_min(options.clone());
        let highest = col(schema::HIGH).rolling_max(options);
        lit(100.0) * (col(schema::CLOSE) - lowest.clone()) / (highest - lowest)
    }

    fn bollinger_position(&self) -> Expr {
        let options = RollingOptionsFixedWindow {
            window_size: self.config.bollinger_window,
            min_periods: self.config.bollinger_window,
            ..Default::default()
        };
        let center = col(schema::CLOSE).rolling_mean(options.clone());
        let band = col(schema::CLOSE).rolling_std(options);
        (col(schema::CLOSE) - center) / (lit(2.0) * band)
    }
}

impl Default for Oscillators {
    fn default() -> Self {
        Self {
            config: OscillatorsConfig::default(),
        }
    }
}

impl FeatureGroup for Oscillators {
    fn name(&self) -> &str {
        "oscillators"
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
        vec![
            format!("rsi_{}", self.config.rsi_period),
            format!("stoch_k_{}", self.config.stoch_period),
            format!("stoch_d_{}", self.config.stoch_period),
            format!("bollinger_position_{}", self.config.bollinger_window),
        ]
    }

    fn compute(&self, data: LazyFrame) -> Result<LazyFrame> {
        let ticker = [col(schema::TICKER)];
        let smooth = RollingOptionsFixedWindow {
            window_size: self.config.stoch_smooth,
            min_periods: self.config.stoch_smooth,
            ..Default::default()
        };

        Ok(data.with_columns([
            self.rsi()
                .over(ticker.clone())
                .alias(format!("rsi_{}", self.config.rsi_period)),
            self.stochastic_k()
                .over(ticker.clone())
                .alias(format!("stoch_k_{}", self.config.stoch_period)),
            self.stochastic_k()
                .rolling_mean(smooth)
                .over(ticker.clone())
                .alias(format!("stoch_d_{}", self.config.stoch_period)),
            self.bollinger_position()
                .over(ticker)
                .alias(format!("bollinger_position_{}", self.config.bollinger_window)),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alternating_quotes(n: usize) -> LazyFrame {
        // Rises two days out of three with a mild pullback between.
        let mut close = Vec::with_capacity(n);
        let mut price = 100.0;
        for i in 0..n {
            price += if i % 3 == 2 { -1.0 } else { 2.0 };
            close.push(price);
        }
        let high: Vec<f64> = close.iter().map(|c| c + 1.0).collect();
        let low: Vec<f64> = close.iter().map(|c| c - 1.0).collect();
        df!(
            "ticker" => vec!["AAA"; n],
            "date" => (0..n as i32).collect::<Vec<_>>(),
            "high" => high,
            "low" => low,
            "close" => close,
        )
        .unwrap()
        .lazy()
    }

    fn small_config() -> OscillatorsConfig {
        OscillatorsConfig {
            rsi_period: 3,
            stoch_period: 4,
            stoch_smooth: 2,
            bollinger_window: 4,
        }
    }

    #[test]
    fn test_rsi_stays_in_bounds() {
        let group = Oscillators::new(small_config()).unwrap();
        let out = group
            .compute(alternating_quotes(30))
            .unwrap()
            .collect()
            .unwrap();
        let rsi = out.column("rsi_3").unwrap().f64().unwrap();

        let mut observed = 0;
        for value in rsi.iter().flatten() {
            assert!((0.0..=100.0).contains(&value), "rsi out of range: {value}");
            observed += 1;
        }
        assert!(observed > 20);
    }

    #[test]
    fn test_rsi_high_when_only_gains() {
        let n = 12;
        let close: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        let frame = df!(
            "ticker" => vec!["AAA"; n],
            "date" => (0..n as i32).collect::<Vec<_>>(),
            "high" => close.iter().map(|c| c + 1.0).collect::<Vec<_>>(),
            "low" => close.iter().map(|c| c - 1.0).collect::<Vec<_>>(),
            "close" => close,
        )
        .unwrap()
        .lazy();

        let group = Oscillators::new(small_config()).unwrap();
        let out = group.compute(frame).unwrap().collect().unwrap();
        let rsi = out.column("rsi_3").unwrap().f64().unwrap();
        assert!(rsi.get(n - 1).unwrap() > 99.0);
    }

    #[test]
    fn test_stochastic_k_in_bounds() {
        let group = Oscillators::new(small_config()).unwrap();
        let out = group
            .compute(alternating_quotes(30))
            .unwrap()
            .collect()
            .unwrap();
        let k = out.column("stoch_k_4").unwrap().f64().unwrap();

        for value in k.iter().flatten() {
            assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn test_bollinger_position_warmup_nulls() {
        let group = Oscillators::new(small_config()).unwrap();
        let out = group
            .compute(alternating_quotes(10))
            .unwrap()
            .collect()
            .unwrap();
        let position = out.column("bollinger_position_4").unwrap().f64().unwrap();
        for i in 0..3 {
            assert!(position.get(i).is_none());
        }
        assert!(position.get(5).is_some());
    }

    #[test]
    fn test_invalid_window_rejected() {
        let config = OscillatorsConfig {
            rsi_period: 0,
            ..OscillatorsConfig::default()
        };
        assert!(Oscillators::new(config).is_err());
    }
}
