//! Top-K submission selection and artifact writing.
//!
//! Takes the scored rows of one evaluation year and keeps, per date, the
//! K best-scored tickers ranked 1..K. The artifact is a CSV named
//! `{year}.{model}.{timestamp}.submission.csv`; a same-second rerun
//! advances the timestamp instead of overwriting the earlier file.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use hobart_panel::schema;

use crate::error::{PipelineError, Result};

/// Timestamp advances tried before giving up on a free artifact name.
const MAX_NAME_ATTEMPTS: usize = 60;

/// One ranked selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRow {
    /// Date the selection applies to (ISO form).
    pub date: String,
    /// Selected ticker.
    pub ticker: String,
    /// Rank within the date, 1 is best.
    pub rank: u32,
}

/// Ranked top-K selections across the dates of one evaluation year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    rows: Vec<SubmissionRow>,
}

impl Submission {
    /// The ranked rows, grouped by date in first-seen order.
    pub fn rows(&self) -> &[SubmissionRow] {
        &self.rows
    }

    /// Total number of ranked rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows were selected.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the submission as a CSV artifact under `dir`.
    ///
    /// The file is created fresh; if a file for the same second already
    /// exists the timestamp advances by one second per attempt, bounded.
    pub fn write_artifact(&self, dir: &Path, year: i32, model_id: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let mut stamp: DateTime<Utc> = Utc::now();

        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = format!(
                "{year}.{model_id}.{}.submission.csv",
                stamp.format("%Y%m%d_%H%M%S")
            );
            let path = dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    let mut writer = csv::Writer::from_writer(file);
                    for row in &self.rows {
                        writer.serialize(row)?;
                    }
                    writer.flush()?;
                    return Ok(path);
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    stamp += Duration::seconds(1);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(PipelineError::ArtifactCollision {
            attempts: MAX_NAME_ATTEMPTS,
        })
    }
}

/// Keep the `k` best-scored tickers per date, ranked 1..K.
///
/// Dates keep their first-seen input order. Within a date, rows order by
/// score descending with ties broken by ascending ticker. A `k` larger
/// than a date's cross-section keeps the whole cross-section. Rows with
/// a null or non-finite score never compete.
pub fn select(predictions: &DataFrame, k: usize) -> Result<Submission> {
    if k == 0 {
        return Err(PipelineError::InvalidConfig(
            "top-k must be >= 1".to_string(),
        ));
    }

    let frame = predictions
        .clone()
        .lazy()
        .with_column(col(schema::DATE).cast(DataType::String))
        .collect()?;
    let dates = frame.column(schema::DATE)?.str()?;
    let tickers = frame.column(schema::TICKER)?.str()?;
    let scores = frame.column("score")?.f64()?;

    let mut date_order: Vec<String> = Vec::new();
    let mut by_date: HashMap<String, Vec<(String, f64)>> = HashMap::new();
    for i in 0..frame.height() {
        let (Some(date), Some(ticker)) = (dates.get(i), tickers.get(i)) else {
            log::warn!("prediction row {i} has a null key, dropped");
            continue;
        };
        let Some(score) = scores.get(i).filter(|s| s.is_finite()) else {
            log::warn!("prediction for {ticker} on {date} has no usable score, dropped");
            continue;
        };
        if !by_date.contains_key(date) {
            date_order.push(date.to_string());
        }
        by_date
            .entry(date.to_string())
            .or_default()
            .push((ticker.to_string(), score));
    }

    let mut rows = Vec::new();
    for date in &date_order {
        let Some(candidates) = by_date.get_mut(date) else {
            continue;
        };
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        for (i, (ticker, _)) in candidates.iter().take(k).enumerate() {
            rows.push(SubmissionRow {
                date: date.clone(),
                ticker: ticker.clone(),
                rank: (i + 1) as u32,
            });
        }
    }
    Ok(Submission { rows })
}
