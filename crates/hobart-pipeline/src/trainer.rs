//! Walk-forward training across evaluation years.
//!
//! For each evaluation year Y the trainer fits a fresh model on the
//! trailing window of earlier years and scores every row dated in Y.
//! Training never sees rows from Y or later, so each year's predictions
//! are strictly out-of-sample.

use polars::prelude::*;

use hobart_model::{feature_matrix, from_spec, target_vector};
use hobart_panel::schema;
use hobart_panel::Panel;

use crate::error::{PipelineError, Result};

/// Configuration for [`WalkForwardTrainer`].
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// Trailing training window, in years.
    pub window_years: i32,
    /// Minimum non-null training rows a year needs to be trained.
    pub min_training_rows: usize,
    /// Feature columns the model consumes. Empty means every feature
    /// column the panel exposes.
    pub feature_columns: Vec<String>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            window_years: 10,
            min_training_rows: 500,
            feature_columns: Vec::new(),
        }
    }
}

/// One completed evaluation year.
#[derive(Debug)]
pub struct YearOutcome {
    /// Evaluation year.
    pub year: i32,
    /// Name reported by the fitted model.
    pub model: String,
    /// Non-null training rows the model was fitted on.
    pub training_rows: usize,
    /// Scored rows: `ticker`, `date`, `score`, sorted by (date, ticker).
    pub predictions: DataFrame,
}

/// Fits one fresh model per evaluation year on a trailing window.
#[derive(Debug)]
pub struct WalkForwardTrainer {
    config: TrainerConfig,
}

impl WalkForwardTrainer {
    /// Create a trainer, validating the configuration.
    pub fn new(config: TrainerConfig) -> Result<Self> {
        if config.window_years < 1 {
            return Err(PipelineError::InvalidConfig(format!(
                "window_years must be >= 1, got {}",
                config.window_years
            )));
        }
        if config.min_training_rows == 0 {
            return Err(PipelineError::InvalidConfig(
                "min_training_rows must be >= 1".to_string(),
            ));
        }
        Ok(Self { config })
    }

    /// The active configuration.
    pub const fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Distinct panel years that have at least one earlier year to train
    /// on, ascending. The panel's first year is excluded; it has no
    /// history inside any trailing window.
    pub fn evaluation_years(&self, panel: &Panel) -> Result<Vec<i32>> {
        let years_df = panel
            .lazy()
            .select([col(schema::DATE).dt().year().alias("year")])
            .unique_stable(None, UniqueKeepStrategy::First)
            .sort(["year"], Default::default())
            .collect()?;
        let years: Vec<i32> = years_df
            .column("year")?
            .i32()?
            .into_no_null_iter()
            .collect();
        Ok(years.into_iter().skip(1).collect())
    }

    /// Train on `[year - W, year - 1]` and score every row of `year`.
    ///
    /// Skippable outcomes ([`PipelineError::is_skip`]) are too few
    /// training rows and an empty prediction set. A schema mismatch or a
    /// model failure is fatal for the year but carries no panel state, so
    /// the caller may continue with the next year.
    pub fn run_year(&self, panel: &Panel, year: i32, model_spec: &str) -> Result<YearOutcome> {
        let window_start = year - self.config.window_years;
        let year_expr = col(schema::DATE).dt().year();

        let train = panel
            .lazy()
            .filter(
                year_expr
                    .clone()
                    .gt_eq(lit(window_start))
                    .and(year_expr.clone().lt(lit(year)))
                    .and(col(schema::TARGET_RETURN).is_not_null()),
            )
            .collect()?;
        let predict = panel
            .lazy()
            .filter(year_expr.eq(lit(year)))
            .sort([schema::DATE, schema::TICKER], Default::default())
            .collect()?;

        let features = self.resolve_features(panel, &train, &predict, year)?;

        if train.height() < self.config.min_training_rows {
            return Err(PipelineError::DataInsufficient {
                year,
                rows: train.height(),
                required: self.config.min_training_rows,
            });
        }
        if predict.height() == 0 {
            return Err(PipelineError::EmptyPredictionSet { year });
        }

        let train_x = feature_matrix(&train, &features)?;
        let train_y = target_vector(&train, schema::TARGET_RETURN)?;
        let predict_x = feature_matrix(&predict, &features)?;

        let mut model = from_spec(model_spec)?;
        model.fit(&train_x.values, &train_y)?;
        let scores = model.score(&predict_x.values)?;
        log::info!(
            "year {year}: fitted {} on {} rows, scored {} rows",
            model.name(),
            train.height(),
            predict.height()
        );

        let mut predictions = predict.select([schema::TICKER, schema::DATE])?;
        predictions.with_column(Column::new("score".into(), scores.to_vec()))?;

        Ok(YearOutcome {
            year,
            model: model.name().to_string(),
            training_rows: train.height(),
            predictions,
        })
    }

    /// The feature columns for this year, checked against both frames.
    fn resolve_features(
        &self,
        panel: &Panel,
        train: &DataFrame,
        predict: &DataFrame,
        year: i32,
    ) -> Result<Vec<String>> {
        let features = if self.config.feature_columns.is_empty() {
            panel.feature_columns()
        } else {
            self.config.feature_columns.clone()
        };
        if features.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "panel exposes no feature columns".to_string(),
            ));
        }

        let missing: Vec<String> = features
            .iter()
            .filter(|name| train.column(name).is_err() || predict.column(name).is_err())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::SchemaMismatch { year, missing });
        }
        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two tickers, 2019 through 2021, four dates per ticker-year. The
    /// last date of each ticker-year has a null target.
    fn sample_panel() -> Panel {
        let mut tickers = Vec::new();
        let mut dates = Vec::new();
        let mut closes = Vec::new();
        let mut momenta = Vec::new();
        let mut targets: Vec<Option<f64>> = Vec::new();

        for ticker in ["AAA", "BBB"] {
            for year in 2019..=2021 {
                for month in 1..=4 {
                    tickers.push(ticker.to_string());
                    dates.push(format!("{year}-0{month}-01"));
                    closes.push(100.0 + month as f64);
                    momenta.push((year - 2019) as f64 + month as f64 / 10.0);
                    targets.push((month < 4).then(|| 0.01 * month as f64));
                }
            }
        }

        let df = df!(
            schema::TICKER => tickers,
            schema::DATE => dates,
            schema::CLOSE => closes,
            "momentum" => momenta,
            schema::TARGET_RETURN => targets,
        )
        .unwrap()
        .lazy()
        .with_column(col(schema::DATE).cast(DataType::Date))
        .sort([schema::TICKER, schema::DATE], Default::default())
        .collect()
        .unwrap();
        Panel::from_frame(df).unwrap()
    }

    fn small_trainer(min_rows: usize) -> WalkForwardTrainer {
        WalkForwardTrainer::new(TrainerConfig {
            min_training_rows: min_rows,
            ..TrainerConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_evaluation_years_skip_first() {
        let panel = sample_panel();
        let trainer = small_trainer(1);
        assert_eq!(trainer.evaluation_years(&panel).unwrap(), vec![2020, 2021]);
    }

    #[test]
    fn test_training_window_excludes_evaluation_year() {
        let panel = sample_panel();
        let trainer = small_trainer(1);

        // 2019 and 2020, two tickers, three non-null targets each.
        let outcome = trainer.run_year(&panel, 2021, "ridge").unwrap();
        assert_eq!(outcome.training_rows, 12);
        assert_eq!(outcome.model, "ridge");

        // Every 2021 row is scored, targets present or not.
        assert_eq!(outcome.predictions.height(), 8);
        let columns: Vec<&str> = outcome
            .predictions
            .get_column_names()
            .iter()
            .map(|name| name.as_str())
            .collect();
        assert_eq!(columns, vec!["ticker", "date", "score"]);
    }

    #[test]
    fn test_insufficient_rows_skips_year() {
        let panel = sample_panel();
        let trainer = small_trainer(500);

        let err = trainer.run_year(&panel, 2021, "ridge").unwrap_err();
        assert!(err.is_skip());
        assert!(matches!(
            err,
            PipelineError::DataInsufficient {
                year: 2021,
                rows: 12,
                required: 500,
            }
        ));
    }

    #[test]
    fn test_empty_prediction_set_skips_year() {
        let panel = sample_panel();
        let trainer = small_trainer(1);

        let err = trainer.run_year(&panel, 2022, "ridge").unwrap_err();
        assert!(err.is_skip());
        assert!(matches!(
            err,
            PipelineError::EmptyPredictionSet { year: 2022 }
        ));
    }

    #[test]
    fn test_schema_mismatch_is_fatal_for_year() {
        let panel = sample_panel();
        let trainer = WalkForwardTrainer::new(TrainerConfig {
            min_training_rows: 1,
            feature_columns: vec!["momentum".to_string(), "absent_signal".to_string()],
            ..TrainerConfig::default()
        })
        .unwrap();

        let err = trainer.run_year(&panel, 2021, "ridge").unwrap_err();
        assert!(!err.is_skip());
        match err {
            PipelineError::SchemaMismatch { year, missing } => {
                assert_eq!(year, 2021);
                assert_eq!(missing, vec!["absent_signal".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_model_is_fatal() {
        let panel = sample_panel();
        let trainer = small_trainer(1);
        let err = trainer.run_year(&panel, 2021, "transformer").unwrap_err();
        assert!(matches!(err, PipelineError::Model(_)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(WalkForwardTrainer::new(TrainerConfig {
            window_years: 0,
            ..TrainerConfig::default()
        })
        .is_err());
        assert!(WalkForwardTrainer::new(TrainerConfig {
            min_training_rows: 0,
            ..TrainerConfig::default()
        })
        .is_err());
    }

    #[test]
    fn test_predictions_sorted_by_date_then_ticker() {
        let panel = sample_panel();
        let trainer = small_trainer(1);
        let outcome = trainer.run_year(&panel, 2021, "ridge").unwrap();

        let tickers = outcome.predictions.column("ticker").unwrap();
        let tickers = tickers.str().unwrap();
        // Dates interleave the two tickers: AAA then BBB per date.
        assert_eq!(tickers.get(0), Some("AAA"));
        assert_eq!(tickers.get(1), Some("BBB"));
        assert_eq!(tickers.get(2), Some("AAA"));
    }
}
