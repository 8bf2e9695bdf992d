//! Integration tests for the walk-forward batch workflow.

use polars::prelude::*;

use hobart_panel::{schema, Panel};
use hobart_pipeline::jobs::{JobOutcome, JobRegistry};
use hobart_pipeline::report::{BatchReport, RunStatus};
use hobart_pipeline::selector::select;
use hobart_pipeline::trainer::{TrainerConfig, WalkForwardTrainer};

/// Two tickers with 200 trading dates per year, so each year holds 400
/// panel rows. Targets are non-null everywhere.
fn sample_panel(years: &[i32]) -> Panel {
    let mut tickers = Vec::new();
    let mut dates = Vec::new();
    let mut closes = Vec::new();
    let mut signals = Vec::new();
    let mut targets = Vec::new();

    for ticker in ["AAA", "BBB"] {
        for &year in years {
            let mut i = 0u32;
            for month in 1..=10u32 {
                for day in 1..=20u32 {
                    tickers.push(ticker.to_string());
                    dates.push(format!("{year}-{month:02}-{day:02}"));
                    closes.push(100.0 + f64::from(i));
                    let signal = f64::from(i % 37) / 37.0;
                    signals.push(signal);
                    targets.push(0.01 * signal);
                    i += 1;
                }
            }
        }
    }

    let df = df!(
        schema::TICKER => tickers,
        schema::DATE => dates,
        schema::CLOSE => closes,
        "signal" => signals,
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

fn run_batch(
    panel: &Panel,
    years: &[i32],
    registry: &JobRegistry,
    artifact_dir: &std::path::Path,
) -> BatchReport {
    let trainer = WalkForwardTrainer::new(TrainerConfig::default()).unwrap();
    let mut report = BatchReport::new();

    for &year in years {
        if registry.stop_requested() {
            break;
        }
        match trainer.run_year(panel, year, "ridge") {
            Ok(outcome) => {
                let submission = select(&outcome.predictions, 100).unwrap();
                let artifact = submission
                    .write_artifact(artifact_dir, year, &outcome.model)
                    .unwrap();
                report.record_completed(
                    year,
                    &outcome.model,
                    outcome.training_rows,
                    outcome.predictions.height(),
                    artifact,
                    None,
                );
            }
            Err(err) if err.is_skip() => report.record_skipped(year, "ridge", err.to_string()),
            Err(err) => report.record_failed(year, "ridge", err.to_string()),
        }
    }
    report
}

#[test]
fn test_insufficient_year_is_recorded_and_batch_continues() {
    // 2021 can only train on 2020's 400 rows, below the 500 default.
    // 2022 trains on 2020 and 2021 together and must proceed.
    let panel = sample_panel(&[2020, 2021, 2022]);
    let registry = JobRegistry::new();
    registry.begin("walk-forward").unwrap();

    let dir = std::env::temp_dir().join(format!("hobart-batch-{}", std::process::id()));
    let report = run_batch(&panel, &[2021, 2022], &registry, &dir);

    assert_eq!(report.completed(), 1);
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.failed(), 0);

    let skipped = &report.entries()[0];
    assert_eq!(skipped.year, 2021);
    assert_eq!(skipped.status, RunStatus::Skipped);
    assert!(skipped.reason.as_deref().unwrap().contains("400"));

    let completed = &report.entries()[1];
    assert_eq!(completed.year, 2022);
    assert_eq!(completed.training_rows, 800);
    assert_eq!(completed.prediction_rows, 400);

    // Two tickers per date, well under the top-100 cap, so the artifact
    // carries the whole cross section ranked 1..2.
    let artifact = completed.artifact.as_ref().unwrap();
    let contents = std::fs::read_to_string(artifact).unwrap();
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("date,ticker,rank"));
    assert_eq!(lines.count(), 400);

    let record = registry
        .finish(
            JobOutcome::Completed,
            format!("{} completed, {} skipped", report.completed(), report.skipped()),
        )
        .unwrap();
    assert_eq!(record.outcome, JobOutcome::Completed);
    assert!(registry.last_run().unwrap().summary.contains("1 completed"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_stop_request_honored_at_year_boundary() {
    let panel = sample_panel(&[2020, 2021, 2022]);
    let registry = JobRegistry::new();
    registry.begin("walk-forward").unwrap();
    registry.request_stop();

    let dir = std::env::temp_dir().join(format!("hobart-stop-{}", std::process::id()));
    let report = run_batch(&panel, &[2021, 2022], &registry, &dir);
    assert!(report.entries().is_empty());

    let record = registry
        .finish(JobOutcome::Stopped, "stopped before first year")
        .unwrap();
    assert_eq!(record.outcome, JobOutcome::Stopped);

    std::fs::remove_dir_all(&dir).ok();
}
