//! Feature group registry.
//!
//! Central lookup for the available groups plus the `augment` entry
//! point that runs them over a quote panel.

use polars::prelude::*;

use crate::error::{FeatureError, Result};
use crate::group::FeatureGroup;
use crate::oscillators::Oscillators;
use crate::returns::RollingReturns;
use crate::trend::TrendSignals;
use crate::volatility::VolatilitySignals;
use crate::volume::VolumeSignals;

/// Feature group metadata.
#[derive(Debug, Clone)]
pub struct FeatureInfo {
    /// Group name (unique identifier).
    pub name: &'static str,
    /// Brief description of what the group measures.
    pub description: &'static str,
    /// Required column names in input data.
    pub required_columns: &'static [&'static str],
}

/// Metadata for every group `default_groups` instantiates.
pub fn available_groups() -> Vec<FeatureInfo> {
    vec![
        FeatureInfo {
            name: "returns",
            description: "Trailing returns over multiple horizons",
            required_columns: &["ticker", "date", "close"],
        },
        FeatureInfo {
            name: "trend",
            description: "Moving-average ratios and MACD",
            required_columns: &["ticker", "date", "close"],
        },
        FeatureInfo {
            name: "oscillators",
            description: "RSI, stochastic, and Bollinger position",
            required_columns: &["ticker", "date", "high", "low", "close"],
        },
        FeatureInfo {
            name: "volatility",
            description: "Rolling return volatility and ATR ratio",
            required_columns: &["ticker", "date", "high", "low", "close"],
        },
        FeatureInfo {
            name: "volume",
            description: "Relative volume, OBV, and dollar volume",
            required_columns: &["ticker", "date", "close", "volume"],
        },
    ]
}

/// Get group info by name.
pub fn get_group_info(name: &str) -> Option<FeatureInfo> {
    available_groups().into_iter().find(|g| g.name == name)
}

/// List all group names.
pub fn list_group_names() -> Vec<&'static str> {
    available_groups().into_iter().map(|g| g.name).collect()
}

/// Instantiate every group with default configuration.
pub fn default_groups() -> Vec<Box<dyn FeatureGroup>> {
    vec![
        Box::new(RollingReturns::default()),
        Box::new(TrendSignals::default()),
        Box::new(Oscillators::default()),
        Box::new(VolatilitySignals::default()),
        Box::new(VolumeSignals::default()),
    ]
}

/// Run the default groups over a panel frame.
///
/// See [`augment_with`].
pub fn augment(frame: &DataFrame) -> Result<DataFrame> {
    augment_with(frame, &default_groups())
}

/// Append the given groups' columns to a panel frame.
///
/// Validates required and colliding columns up front, then computes all
/// groups in one lazy pass. Non-finite results are scrubbed to nulls so
/// cross-sectional statistics downstream stay well defined.
pub fn augment_with(frame: &DataFrame, groups: &[Box<dyn FeatureGroup>]) -> Result<DataFrame> {
    let existing: Vec<&str> = frame
        .get_column_names()
        .iter()
        .map(|name| name.as_str())
        .collect();

    let mut appended: Vec<String> = Vec::new();
    for group in groups {
        let missing: Vec<String> = group
            .required_columns()
            .iter()
            .filter(|name| !existing.contains(*name))
            .map(|name| (*name).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(FeatureError::MissingColumns {
                group: group.name().to_string(),
                columns: missing,
            });
        }
        for column in group.output_columns() {
            if existing.contains(&column.as_str()) || appended.contains(&column) {
                return Err(FeatureError::ColumnCollision(column));
            }
            appended.push(column);
        }
    }

    let mut lazy = frame.clone().lazy();
    for group in groups {
        lazy = group.compute(lazy)?;
    }
    lazy = scrub_non_finite(lazy, &appended);

    log::debug!(
        "computed {} feature columns from {} groups",
        appended.len(),
        groups.len()
    );
    Ok(lazy.collect()?)
}

/// Replace NaN and infinity in the named columns with nulls.
fn scrub_non_finite(lazy: LazyFrame, columns: &[String]) -> LazyFrame {
    let exprs: Vec<Expr> = columns
        .iter()
        .map(|name| {
            when(
                col(name.as_str())
                    .eq(lit(f64::INFINITY))
                    .or(col(name.as_str()).eq(lit(f64::NEG_INFINITY))),
            )
            .then(lit(NULL))
            .otherwise(col(name.as_str()).fill_nan(lit(NULL)))
            .alias(name.as_str())
        })
        .collect();
    lazy.with_columns(exprs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel_frame(rows_per_ticker: usize) -> DataFrame {
        let mut ticker = Vec::new();
        let mut date = Vec::new();
        let mut close = Vec::new();
        let mut volume = Vec::new();
        for symbol in ["AAA", "BBB"] {
            for i in 0..rows_per_ticker {
                ticker.push(symbol);
                date.push(i as i32);
                let base = if symbol == "AAA" { 100.0 } else { 40.0 };
                close.push(base + (i as f64) + if i % 4 == 0 { -1.5 } else { 0.5 });
                volume.push(10_000 + (i as i64) * 37);
            }
        }
        let high: Vec<f64> = close.iter().map(|c| c + 1.0).collect();
        let low: Vec<f64> = close.iter().map(|c| c - 1.0).collect();
        df!(
            "ticker" => ticker,
            "date" => date,
            "high" => high,
            "low" => low,
            "close" => close,
            "volume" => volume,
        )
        .unwrap()
    }

    #[test]
    fn test_augment_appends_all_default_columns() {
        let frame = panel_frame(140);
        let out = augment(&frame).unwrap();

        let expected: usize = default_groups()
            .iter()
            .map(|g| g.output_columns().len())
            .sum();
        assert_eq!(out.width(), frame.width() + expected);
        assert_eq!(out.height(), frame.height());
        for group in default_groups() {
            for column in group.output_columns() {
                assert!(out.column(&column).is_ok(), "missing {column}");
            }
        }
    }

    #[test]
    fn test_augment_outputs_are_finite_or_null() {
        let frame = panel_frame(140);
        let out = augment(&frame).unwrap();

        for group in default_groups() {
            for column in group.output_columns() {
                let values = out.column(&column).unwrap().f64().unwrap();
                for value in values.iter().flatten() {
                    assert!(value.is_finite(), "{column} produced {value}");
                }
            }
        }
    }

    #[test]
    fn test_augment_missing_column_fails() {
        let frame = panel_frame(30).drop("volume").unwrap();
        let err = augment(&frame).unwrap_err();
        assert!(matches!(err, FeatureError::MissingColumns { group, .. } if group == "volume"));
    }

    #[test]
    fn test_augment_rejects_collision() {
        let mut frame = panel_frame(30);
        let obv = Column::new("obv".into(), vec![0.0; frame.height()]);
        frame.with_column(obv).unwrap();

        let err = augment(&frame).unwrap_err();
        assert!(matches!(err, FeatureError::ColumnCollision(name) if name == "obv"));
    }

    #[test]
    fn test_group_info_lookup() {
        let info = get_group_info("oscillators").unwrap();
        assert!(info.required_columns.contains(&"high"));
        assert!(get_group_info("sentiment").is_none());
    }

    #[test]
    fn test_list_group_names() {
        let names = list_group_names();
        assert_eq!(names.len(), 5);
        assert!(names.contains(&"returns"));
        assert!(names.contains(&"volume"));
    }
}
