//! Panel assembly for experiment runs.
//!
//! Turns raw per-ticker quotes into the frame the trainer consumes:
//! corporate actions merged on, the panel built and joined with macro
//! series, features engineered and normalized per date, and the
//! one-step look-ahead shift applied last.

use hobart_data::ActionStore;
use hobart_features::{augment, default_groups};
use hobart_panel::schema;
use hobart_panel::{
    CrossSectionalNormalizer, NormalizerConfig, Panel, PanelBuilder, PanelConfig, apply_shift,
};
use polars::prelude::*;
use std::collections::BTreeMap;

/// Error type for panel assembly.
#[derive(Debug, thiserror::Error)]
pub(crate) enum AssembleError {
    /// Corporate action merge failed.
    #[error("Action merge error: {0}")]
    Actions(#[from] hobart_data::error::DataError),
    /// Panel construction or normalization failed.
    #[error("Panel error: {0}")]
    Panel(#[from] hobart_panel::PanelError),
    /// Feature engineering failed.
    #[error("Feature error: {0}")]
    Features(#[from] hobart_features::FeatureError),
    /// Polars DataFrame error.
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// Configuration for panel assembly.
#[derive(Debug, Clone)]
pub(crate) struct AssembleConfig {
    /// Forward-return horizon in trading rows.
    pub horizon: usize,
    /// Minimum rows a ticker needs to enter the panel.
    pub min_history: usize,
    /// Whether to shift features back one row per ticker.
    pub shift: bool,
}

/// A trainable panel plus the columns the model should consume.
#[derive(Debug)]
pub(crate) struct AssembledPanel {
    /// The assembled panel, shifted when configured.
    pub panel: Panel,
    /// Normalized feature columns plus any macro columns.
    pub model_columns: Vec<String>,
}

/// Assemble the training panel from raw quotes.
///
/// The model consumes the per-date normalized transforms of the
/// engineered features, never the raw levels, plus macro columns as-is;
/// macro series are constant across a date, so normalizing them would
/// zero them out.
pub(crate) fn assemble_panel(
    quotes: BTreeMap<String, DataFrame>,
    actions: &ActionStore,
    macro_frame: Option<&DataFrame>,
    config: &AssembleConfig,
) -> Result<AssembledPanel, AssembleError> {
    // Yahoo's adjusted close duplicates what the explicit action
    // columns encode; drop it so it cannot enter the feature set.
    let mut series: BTreeMap<String, DataFrame> = BTreeMap::new();
    for (ticker, frame) in quotes {
        let mut merged = actions.apply(&ticker, frame)?;
        if merged.column("adjusted_close").is_ok() {
            merged = merged.drop("adjusted_close")?;
        }
        series.insert(ticker, merged);
    }

    let builder = PanelBuilder::new(PanelConfig {
        horizon: config.horizon,
        min_rows: config.min_history,
    })?;
    let panel = builder.build(&series, macro_frame)?;

    let macro_columns: Vec<String> = macro_frame
        .map(|frame| {
            frame
                .get_column_names()
                .iter()
                .map(|name| name.to_string())
                .filter(|name| name != schema::DATE)
                .collect()
        })
        .unwrap_or_default();

    let engineered: Vec<String> = default_groups()
        .iter()
        .flat_map(|group| group.output_columns())
        .collect();

    let augmented = Panel::from_frame(augment(panel.frame())?)?;
    let normalizer = CrossSectionalNormalizer::new(NormalizerConfig::default())?;
    let normalized = normalizer.normalize(&augmented, &engineered)?;

    let mut model_columns: Vec<String> = engineered
        .iter()
        .flat_map(|name| [schema::zscore_column(name), schema::rank_column(name)])
        .collect();
    model_columns.extend(macro_columns);
    log::debug!("model columns: {model_columns:?}");

    let feature_columns = normalized.feature_columns();
    let panel = apply_shift(&normalized, &feature_columns, config.shift)?;

    Ok(AssembledPanel {
        panel,
        model_columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote_frame(rows: usize, base: f64) -> DataFrame {
        let days: Vec<i32> = (0..rows as i32).collect();
        let closes: Vec<f64> = days
            .iter()
            .map(|d| base + f64::from(*d) * 0.5 + if d % 4 == 0 { -1.5 } else { 0.5 })
            .collect();
        let high: Vec<f64> = closes.iter().map(|c| c + 1.0).collect();
        let low: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();
        let adjusted: Vec<f64> = closes.iter().map(|c| c * 0.98).collect();
        let volume: Vec<i64> = days.iter().map(|d| 10_000 + i64::from(*d) * 37).collect();
        df!(
            "date" => days,
            "open" => &closes,
            "high" => high,
            "low" => low,
            "close" => &closes,
            "volume" => volume,
            "adjusted_close" => adjusted,
        )
        .unwrap()
        .lazy()
        .with_column(col("date").cast(DataType::Date))
        .collect()
        .unwrap()
    }

    fn quotes() -> BTreeMap<String, DataFrame> {
        let mut map = BTreeMap::new();
        map.insert("AAA".to_string(), quote_frame(140, 100.0));
        map.insert("BBB".to_string(), quote_frame(140, 40.0));
        map
    }

    fn config() -> AssembleConfig {
        AssembleConfig {
            horizon: 5,
            min_history: 100,
            shift: true,
        }
    }

    #[test]
    fn test_assemble_produces_model_columns() {
        let assembled =
            assemble_panel(quotes(), &ActionStore::new(), None, &config()).unwrap();

        assert!(!assembled.model_columns.is_empty());
        assert_eq!(assembled.panel.height(), 280);
        assert!(assembled.panel.shift_applied());
        for name in &assembled.model_columns {
            assert!(
                assembled.panel.frame().column(name).is_ok(),
                "missing model column {name}"
            );
        }
    }

    #[test]
    fn test_assemble_drops_adjusted_close() {
        let assembled =
            assemble_panel(quotes(), &ActionStore::new(), None, &config()).unwrap();

        assert!(assembled.panel.frame().column("adjusted_close").is_err());
        assert!(
            !assembled
                .model_columns
                .iter()
                .any(|name| name.contains("adjusted_close"))
        );
    }

    #[test]
    fn test_assemble_carries_macro_columns_raw() {
        let macro_frame = df!(
            "date" => [0_i32, 40, 80, 120],
            "cpi" => [2.1_f64, 2.3, 2.7, 3.1],
        )
        .unwrap()
        .lazy()
        .with_column(col("date").cast(DataType::Date))
        .collect()
        .unwrap();

        let assembled =
            assemble_panel(quotes(), &ActionStore::new(), Some(&macro_frame), &config()).unwrap();

        assert!(assembled.model_columns.iter().any(|name| name == "cpi"));
        assert!(assembled.panel.frame().column("cpi").is_ok());
        // Raw macro levels enter as-is, no per-date transforms.
        assert!(assembled.panel.frame().column("cpi_zs").is_err());
    }

    #[test]
    fn test_assemble_respects_shift_toggle() {
        let mut config = config();
        config.shift = false;
        let assembled = assemble_panel(quotes(), &ActionStore::new(), None, &config).unwrap();

        assert!(!assembled.panel.shift_applied());
    }
}
