//! Batch outcome reporting.
//!
//! A batch run covers the cross product of evaluation years and model
//! specs. Every cell lands in the report as completed, skipped, or
//! failed with a reason; partial success is the normal terminal state.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Terminal status of one (year, model) cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Trained, scored, and the artifact was written.
    Completed,
    /// Not enough data; the batch moved on.
    Skipped,
    /// An error stopped this cell; the batch moved on.
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Outcome of one (year, model) cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntry {
    /// Evaluation year.
    pub year: i32,
    /// Model spec the cell ran with.
    pub model: String,
    /// Terminal status.
    pub status: RunStatus,
    /// Why the cell was skipped or failed.
    pub reason: Option<String>,
    /// Artifact path when one was written.
    pub artifact: Option<PathBuf>,
    /// Grader score when the artifact was graded.
    pub score: Option<f64>,
    /// Non-null training rows the model saw.
    pub training_rows: usize,
    /// Rows scored for the evaluation year.
    pub prediction_rows: usize,
}

/// Collected outcomes of one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// When the batch started.
    pub started_at: DateTime<Utc>,
    entries: Vec<BatchEntry>,
}

impl Default for BatchReport {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchReport {
    /// Start an empty report stamped now.
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    /// Record a completed cell.
    pub fn record_completed(
        &mut self,
        year: i32,
        model: &str,
        training_rows: usize,
        prediction_rows: usize,
        artifact: PathBuf,
        score: Option<f64>,
    ) {
        self.entries.push(BatchEntry {
            year,
            model: model.to_string(),
            status: RunStatus::Completed,
            reason: None,
            artifact: Some(artifact),
            score,
            training_rows,
            prediction_rows,
        });
    }

    /// Record a skipped cell with its reason.
    pub fn record_skipped(&mut self, year: i32, model: &str, reason: impl Into<String>) {
        self.entries.push(BatchEntry {
            year,
            model: model.to_string(),
            status: RunStatus::Skipped,
            reason: Some(reason.into()),
            artifact: None,
            score: None,
            training_rows: 0,
            prediction_rows: 0,
        });
    }

    /// Record a failed cell with its reason.
    pub fn record_failed(&mut self, year: i32, model: &str, reason: impl Into<String>) {
        self.entries.push(BatchEntry {
            year,
            model: model.to_string(),
            status: RunStatus::Failed,
            reason: Some(reason.into()),
            artifact: None,
            score: None,
            training_rows: 0,
            prediction_rows: 0,
        });
    }

    /// All entries in recording order.
    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    /// Number of completed cells.
    pub fn completed(&self) -> usize {
        self.count(RunStatus::Completed)
    }

    /// Number of skipped cells.
    pub fn skipped(&self) -> usize {
        self.count(RunStatus::Skipped)
    }

    /// Number of failed cells.
    pub fn failed(&self) -> usize {
        self.count(RunStatus::Failed)
    }

    fn count(&self, status: RunStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    /// Serialize the report as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON to `path`.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            write!(f, "{} {} {}", entry.year, entry.model, entry.status)?;
            if let Some(score) = entry.score {
                write!(f, " score={score:.6}")?;
            }
            if let Some(reason) = &entry.reason {
                write!(f, " ({reason})")?;
            }
            writeln!(f)?;
        }
        write!(
            f,
            "{} completed, {} skipped, {} failed",
            self.completed(),
            self.skipped(),
            self.failed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> BatchReport {
        let mut report = BatchReport::new();
        report.record_completed(
            2022,
            "ridge",
            5000,
            1200,
            PathBuf::from("/tmp/2022.ridge.20240101_120000.submission.csv"),
            Some(0.5321),
        );
        report.record_skipped(2021, "ridge", "400 training row(s), 500 required");
        report.record_failed(2020, "gbt", "schema mismatch");
        report
    }

    #[test]
    fn test_summary_counts() {
        let report = sample_report();
        assert_eq!(report.completed(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.entries().len(), 3);
    }

    #[test]
    fn test_json_round_trip() {
        let report = sample_report();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"status\": \"skipped\""));
        assert!(json.contains("0.5321"));

        let parsed: BatchReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.entries().len(), 3);
        assert_eq!(parsed.entries()[1].status, RunStatus::Skipped);
    }

    #[test]
    fn test_display_mentions_reasons() {
        let rendered = sample_report().to_string();
        assert!(rendered.contains("2021 ridge skipped (400 training row(s), 500 required)"));
        assert!(rendered.contains("1 completed, 1 skipped, 1 failed"));
    }

    #[test]
    fn test_write_json() {
        let dir = std::env::temp_dir().join(format!("hobart-report-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("report.json");

        sample_report().write_json(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"year\": 2022"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
