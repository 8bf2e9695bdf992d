//! Leakage guard: one-step feature shift within each ticker's sequence.
//!
//! With the shift enabled, the feature values attributed to (ticker, d_i)
//! are the values that were true as of (ticker, d_{i-1}), so a model can
//! only see information that existed strictly before the row it scores.
//! Training and prediction must run with the same `enabled` value; the
//! panel's `shift_applied` flag records what was done, but enforcing the
//! agreement is the caller's contract.

use polars::prelude::*;

use crate::builder::Panel;
use crate::error::{PanelError, Result};
use crate::schema;

/// Shift the named feature columns one step back within each ticker.
///
/// The first row of every ticker becomes null for the shifted columns.
/// `target_return` and `target_date` are silently excluded. With
/// `enabled = false` this is a no-op and the panel is returned unchanged.
pub fn apply_shift(panel: &Panel, columns: &[String], enabled: bool) -> Result<Panel> {
    if !enabled {
        return Ok(panel.clone());
    }

    let mut exprs: Vec<Expr> = Vec::with_capacity(columns.len());
    for name in columns {
        if schema::TARGET_COLUMNS.contains(&name.as_str()) {
            continue;
        }
        if panel.frame().column(name).is_err() {
            return Err(PanelError::UnknownColumn(name.clone()));
        }
        exprs.push(
            col(name.as_str())
                .shift(lit(1))
                .over([col(schema::TICKER)])
                .alias(name.as_str()),
        );
    }

    let df = panel.lazy().with_columns(exprs).collect()?;
    Ok(Panel::with_state(df, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> Panel {
        let df = df!(
            "ticker" => &["A", "A", "A", "B", "B"],
            "date" => &[1i32, 2, 3, 1, 2],
            "f" => &[1.0, 2.0, 3.0, 10.0, 20.0],
            "target_return" => &[0.1, 0.2, 0.3, 0.4, 0.5],
        )
        .unwrap()
        .lazy()
        .with_column(col("date").cast(DataType::Date))
        .collect()
        .unwrap();
        Panel::from_frame(df).unwrap()
    }

    fn values(panel: &Panel, name: &str) -> Vec<Option<f64>> {
        panel
            .frame()
            .column(name)
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_shift_lags_within_ticker() {
        let shifted = apply_shift(&panel(), &["f".to_string()], true).unwrap();
        assert_eq!(
            values(&shifted, "f"),
            vec![None, Some(1.0), Some(2.0), None, Some(10.0)]
        );
        assert!(shifted.shift_applied());
    }

    #[test]
    fn test_disabled_is_noop() {
        let original = panel();
        let untouched = apply_shift(&original, &["f".to_string()], false).unwrap();
        assert_eq!(values(&untouched, "f"), values(&original, "f"));
        assert!(!untouched.shift_applied());
    }

    #[test]
    fn test_targets_never_shifted() {
        let shifted = apply_shift(
            &panel(),
            &["f".to_string(), "target_return".to_string()],
            true,
        )
        .unwrap();
        assert_eq!(
            values(&shifted, "target_return"),
            vec![Some(0.1), Some(0.2), Some(0.3), Some(0.4), Some(0.5)]
        );
    }

    #[test]
    fn test_unknown_column_rejected() {
        let err = apply_shift(&panel(), &["nope".to_string()], true);
        assert!(matches!(err, Err(PanelError::UnknownColumn(name)) if name == "nope"));
    }

    #[test]
    fn test_shift_matches_prior_unshifted_value() {
        let original = panel();
        let shifted = apply_shift(&original, &["f".to_string()], true).unwrap();
        let before = values(&original, "f");
        let after = values(&shifted, "f");

        // Ticker A occupies rows 0..3, ticker B rows 3..5.
        for i in 1..3 {
            assert_eq!(after[i], before[i - 1]);
        }
        assert_eq!(after[4], before[3]);
    }
}
