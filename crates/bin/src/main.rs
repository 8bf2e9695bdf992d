//! Hobart CLI binary.
//!
//! Command-line interface for the Hobart walk-forward ranking pipeline.

mod experiment;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use experiment::artifacts::latest_artifacts;
use experiment::assemble::{AssembleConfig, assemble_panel};
use experiment::cache_manager;
use experiment::data_pipeline::{
    FetchConfig, fetch_macro_series, fetch_universe_quotes, load_cached_macro, print_cache_info,
    seed_actions,
};
use hobart::universe::{Universe, UniverseError, YearUniverse};
use hobart_data::{ActionStore, QuoteProvider};
use hobart_grader::GraderClient;
use hobart_model::AVAILABLE_MODELS;
use hobart_panel::Panel;
use hobart_pipeline::{
    BatchReport, JobOutcome, JobRegistry, RunStatus, TrainerConfig, WalkForwardTrainer, select,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration as StdDuration;

#[derive(Parser)]
#[command(name = "hobart")]
#[command(about = "Hobart: walk-forward equity ranking pipeline", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the walk-forward batch over evaluation years
    Run(RunArgs),

    /// Fetch quotes and reference data into the local cache
    Fetch {
        /// Years whose universe files define the tickers, e.g. 2020,2021
        #[arg(long, required = true, value_delimiter = ',')]
        years: Vec<i32>,

        /// Directory holding {year}_final_universe.csv files
        #[arg(long, default_value = "data")]
        universe_dir: PathBuf,

        /// Start of the quote range (ISO date)
        #[arg(long, default_value = "2010-01-01")]
        from: NaiveDate,

        /// End of the quote range (ISO date), defaults to today
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Macro series ids to fetch and cache
        #[arg(long, value_delimiter = ',')]
        macro_series: Vec<String>,

        /// Corporate actions CSV to seed the cache with
        #[arg(long)]
        actions_csv: Option<PathBuf>,

        /// Force refresh cached data
        #[arg(long)]
        refresh: bool,
    },

    /// Submit the newest artifact per year and model for grading
    Grade {
        /// Directory holding submission artifacts
        #[arg(long, default_value = "submissions")]
        artifacts_dir: PathBuf,

        /// Only grade artifacts for this year
        #[arg(long)]
        year: Option<i32>,
    },

    /// Inspect a year's universe file
    Universe {
        /// Evaluation year
        year: i32,

        /// Directory holding universe files
        #[arg(long, default_value = "data")]
        universe_dir: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Evaluation years, e.g. 2020,2021,2022
    #[arg(long, required = true, value_delimiter = ',')]
    years: Vec<i32>,

    /// Model specs to run per year
    #[arg(long, default_value = "gbt", value_delimiter = ',')]
    models: Vec<String>,

    /// Directory holding {year}_final_universe.csv files
    #[arg(long, default_value = "data")]
    universe_dir: PathBuf,

    /// Directory submission artifacts are written to
    #[arg(long, default_value = "submissions")]
    artifacts_dir: PathBuf,

    /// Corporate actions CSV (ticker,date,dividend,split_ratio)
    #[arg(long)]
    actions_csv: Option<PathBuf>,

    /// Instruments kept per date in each submission
    #[arg(long, default_value = "100")]
    top_k: usize,

    /// Trailing training window in years
    #[arg(long, default_value = "10")]
    window: i32,

    /// Forward-return horizon in trading rows
    #[arg(long, default_value = "63")]
    horizon: usize,

    /// Minimum training rows a year needs
    #[arg(long, default_value = "500")]
    min_rows: usize,

    /// Minimum history rows a ticker needs to enter the panel
    #[arg(long, default_value = "300")]
    min_history: usize,

    /// Disable the one-step feature shift (diagnostics only)
    #[arg(long)]
    no_shift: bool,

    /// Join cached macro series into the panel
    #[arg(long)]
    with_macro: bool,

    /// Disable caching (always fetch fresh data)
    #[arg(long)]
    no_cache: bool,

    /// Force refresh cached data
    #[arg(long)]
    refresh: bool,

    /// Submit each artifact for grading as it is written
    #[arg(long)]
    grade: bool,

    /// Write the batch report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_batch(args).await?,
        Commands::Fetch {
            years,
            universe_dir,
            from,
            to,
            macro_series,
            actions_csv,
            refresh,
        } => {
            fetch_data(years, &universe_dir, from, to, macro_series, actions_csv, refresh).await?;
        }
        Commands::Grade {
            artifacts_dir,
            year,
        } => {
            grade_artifacts(&artifacts_dir, year).await?;
        }
        Commands::Universe { year, universe_dir } => {
            inspect_universe(&universe_dir, year)?;
        }
    }

    Ok(())
}

async fn run_batch(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut years = args.years.clone();
    years.sort_unstable();
    years.dedup();

    for model in &args.models {
        if !AVAILABLE_MODELS.contains(&model.as_str()) {
            return Err(format!(
                "Unknown model '{}'; available: {}",
                model,
                AVAILABLE_MODELS.join(", ")
            )
            .into());
        }
    }

    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!(
        "║{:^62}║",
        format!("WALK-FORWARD RUN: {}-{}", years[0], years[years.len() - 1])
    );
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("Models: {}", args.models.join(", "));
    println!(
        "Window: {} year(s), horizon {} row(s), top {} per date",
        args.window, args.horizon, args.top_k
    );

    let config = FetchConfig {
        use_cache: !args.no_cache,
        force_refresh: args.refresh,
    };
    if config.use_cache {
        print_cache_info();
        if config.force_refresh {
            println!("  Mode: Force refresh (re-fetching all data)");
        }
    } else {
        println!("  Cache: Disabled");
    }

    // Fail before any fetching if grading was asked for but the
    // environment is not set up for it.
    let grader = if args.grade {
        let client = GraderClient::from_env()?;
        println!("  Grader: {}", client.config().base_url);
        Some(client)
    } else {
        None
    };
    println!();

    print!("Loading universe files...");
    std::io::Write::flush(&mut std::io::stdout())?;
    let universes = match load_universes(&args.universe_dir, &years) {
        Ok(u) => u,
        Err(e) => {
            println!(" ✗");
            return Err(format!("Failed to load universe files: {}", e).into());
        }
    };
    let tickers = YearUniverse::union(&universes);
    println!(
        " ✓ ({} year(s), {} ticker(s))",
        universes.len(),
        tickers.len()
    );

    // Quote history must reach back through the widest training window.
    let span_start = Utc
        .with_ymd_and_hms(years[0] - args.window, 1, 1, 0, 0, 0)
        .single()
        .ok_or("invalid quote span start")?;
    let span_end = Utc
        .with_ymd_and_hms(years[years.len() - 1], 12, 31, 23, 59, 59)
        .single()
        .ok_or("invalid quote span end")?
        .min(Utc::now());

    let provider = QuoteProvider::new()?;
    let pb = fetch_progress(tickers.len());
    let quotes = match fetch_universe_quotes(
        &provider, &tickers, span_start, span_end, &config, Some(&pb),
    )
    .await
    {
        Ok(q) => {
            let rows: usize = q.values().map(|df| df.height()).sum();
            pb.finish_with_message(format!("Fetched {} ticker(s) ({} rows)", q.len(), rows));
            q
        }
        Err(e) => {
            pb.finish_with_message("Failed!");
            return Err(format!("Failed to fetch universe data: {}", e).into());
        }
    };

    let actions = if let Some(path) = &args.actions_csv {
        print!("Loading corporate actions...");
        std::io::Write::flush(&mut std::io::stdout())?;
        match ActionStore::from_csv(path) {
            Ok(store) => {
                println!(" ✓ ({} ticker(s))", store.len());
                store
            }
            Err(e) => {
                println!(" ✗");
                return Err(
                    format!("Failed to load actions from {}: {}", path.display(), e).into(),
                );
            }
        }
    } else if config.use_cache {
        let store = cache_manager::open_cache()
            .and_then(|cache| ActionStore::from_cache(&cache, &tickers))
            .unwrap_or_default();
        if !store.is_empty() {
            println!("Corporate actions: {} ticker(s) from cache", store.len());
        }
        store
    } else {
        ActionStore::new()
    };

    let macro_frame = if args.with_macro {
        match load_cached_macro()? {
            Some(frame) => {
                println!("Macro series: {} column(s) from cache", frame.width() - 1);
                Some(frame)
            }
            None => {
                println!("Macro series: none cached (run `hobart fetch --macro-series ...`)");
                None
            }
        }
    } else {
        None
    };

    print!("Assembling panel...");
    std::io::Write::flush(&mut std::io::stdout())?;
    let assemble_config = AssembleConfig {
        horizon: args.horizon,
        min_history: args.min_history,
        shift: !args.no_shift,
    };
    let assembled = match assemble_panel(quotes, &actions, macro_frame.as_ref(), &assemble_config)
    {
        Ok(a) => {
            println!(
                " ✓ ({} rows, {} model column(s))",
                a.panel.height(),
                a.model_columns.len()
            );
            a
        }
        Err(e) => {
            println!(" ✗");
            return Err(format!("Failed to assemble panel: {}", e).into());
        }
    };
    if args.no_shift {
        println!("  Warning: look-ahead shift disabled; scores are diagnostic only");
    }

    let trainer = WalkForwardTrainer::new(TrainerConfig {
        window_years: args.window,
        min_training_rows: args.min_rows,
        feature_columns: assembled.model_columns.clone(),
    })?;

    let registry = Arc::new(JobRegistry::new());
    registry.begin(format!("run-{}-{}", years[0], years[years.len() - 1]))?;
    let stopper = Arc::clone(&registry);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && stopper.request_stop() {
            println!("\nStop requested; finishing the current year...");
        }
    });

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("BATCH");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    let mut report = BatchReport::new();
    let mut stopped = false;

    for year in &years {
        if registry.stop_requested() {
            stopped = true;
            break;
        }
        for model in &args.models {
            print!("Training {}/{}...", year, model);
            std::io::Write::flush(&mut std::io::stdout())?;
            run_cell(
                &trainer,
                &assembled.panel,
                *year,
                model,
                args.top_k,
                &args.artifacts_dir,
                grader.as_ref(),
                &mut report,
            )
            .await;
        }
    }

    let outcome = if stopped {
        JobOutcome::Stopped
    } else if report.completed() == 0 && report.failed() > 0 {
        JobOutcome::Error
    } else {
        JobOutcome::Completed
    };
    let summary = format!(
        "{} completed, {} skipped, {} failed",
        report.completed(),
        report.skipped(),
        report.failed()
    );
    let record = registry.finish(outcome, summary.as_str())?;

    print_report(&report);

    if let Some(path) = &args.report {
        report.write_json(path)?;
        println!("\n  Report written to {}", path.display());
    }

    let label = match record.outcome {
        JobOutcome::Completed => "completed",
        JobOutcome::Stopped => "stopped",
        JobOutcome::Error => "failed",
    };
    let elapsed = (record.finished_at - record.started_at).num_seconds();
    println!("\nJob {} in {}s", label, elapsed);
    println!("\n════════════════════════════════════════════════════════════════\n");

    Ok(())
}

/// Run one (year, model) cell and record its outcome.
///
/// A grading failure does not fail the cell: the artifact exists on
/// disk and can be resubmitted with `hobart grade`.
#[allow(clippy::too_many_arguments)]
async fn run_cell(
    trainer: &WalkForwardTrainer,
    panel: &Panel,
    year: i32,
    model: &str,
    top_k: usize,
    artifacts_dir: &Path,
    grader: Option<&GraderClient>,
    report: &mut BatchReport,
) {
    let outcome = match trainer.run_year(panel, year, model) {
        Ok(outcome) => outcome,
        Err(e) if e.is_skip() => {
            println!(" - skipped: {}", e);
            report.record_skipped(year, model, e.to_string());
            return;
        }
        Err(e) => {
            println!(" ✗ {}", e);
            report.record_failed(year, model, e.to_string());
            return;
        }
    };

    let artifact = match select(&outcome.predictions, top_k)
        .and_then(|submission| submission.write_artifact(artifacts_dir, year, model))
    {
        Ok(path) => path,
        Err(e) => {
            println!(" ✗ {}", e);
            report.record_failed(year, model, e.to_string());
            return;
        }
    };

    let score = match grader {
        Some(client) => match client.submit(&artifact, year).await {
            Ok(score) => score,
            Err(e) => {
                eprintln!("Warning: grading {} failed: {}", artifact.display(), e);
                None
            }
        },
        None => None,
    };

    match score {
        Some(value) => println!(
            " ✓ ({} scored, score {:.5})",
            outcome.predictions.height(),
            value
        ),
        None => println!(" ✓ ({} scored)", outcome.predictions.height()),
    }
    report.record_completed(
        year,
        model,
        outcome.training_rows,
        outcome.predictions.height(),
        artifact,
        score,
    );
}

fn print_report(report: &BatchReport) {
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("BATCH REPORT");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    println!(
        "  {:<6} {:<9} {:<10} {:>8} {:>8}  {}",
        "Year", "Model", "Status", "Train", "Scored", "Score"
    );
    for entry in report.entries() {
        let status = entry.status.to_string();
        let (train, scored) = match entry.status {
            RunStatus::Completed => (
                entry.training_rows.to_string(),
                entry.prediction_rows.to_string(),
            ),
            _ => ("-".to_string(), "-".to_string()),
        };
        let tail = match entry.status {
            RunStatus::Completed => entry
                .score
                .map_or_else(|| "-".to_string(), |score| format!("{:.5}", score)),
            _ => entry
                .reason
                .clone()
                .unwrap_or_else(|| "-".to_string()),
        };
        println!(
            "  {:<6} {:<9} {:<10} {:>8} {:>8}  {}",
            entry.year, entry.model, status, train, scored, tail
        );
    }

    println!(
        "\n  {} completed, {} skipped, {} failed",
        report.completed(),
        report.skipped(),
        report.failed()
    );
}

async fn fetch_data(
    mut years: Vec<i32>,
    universe_dir: &Path,
    from: NaiveDate,
    to: Option<NaiveDate>,
    macro_series: Vec<String>,
    actions_csv: Option<PathBuf>,
    refresh: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    years.sort_unstable();
    years.dedup();

    println!("Cache update");
    println!("============\n");
    print_cache_info();
    println!();

    let universes = load_universes(universe_dir, &years)?;
    let tickers = YearUniverse::union(&universes);
    println!(
        "Universe: {} ticker(s) across {} year(s)",
        tickers.len(),
        years.len()
    );

    let start = from.and_time(NaiveTime::MIN).and_utc();
    let end = to
        .and_then(|date| date.and_hms_opt(23, 59, 59))
        .map_or_else(Utc::now, |dt| dt.and_utc());
    if start >= end {
        return Err(format!(
            "Empty fetch range: {} to {}",
            start.date_naive(),
            end.date_naive()
        )
        .into());
    }

    let provider = QuoteProvider::new()?;
    let pb = fetch_progress(tickers.len());
    let config = FetchConfig {
        use_cache: true,
        force_refresh: refresh,
    };
    match fetch_universe_quotes(&provider, &tickers, start, end, &config, Some(&pb)).await {
        Ok(quotes) => {
            let rows: usize = quotes.values().map(|df| df.height()).sum();
            pb.finish_with_message(format!(
                "Fetched {} ticker(s) ({} rows)",
                quotes.len(),
                rows
            ));
        }
        Err(e) => {
            pb.finish_with_message("Failed!");
            return Err(format!("Failed to fetch universe data: {}", e).into());
        }
    }

    if let Some(path) = &actions_csv {
        print!("Seeding corporate actions...");
        std::io::Write::flush(&mut std::io::stdout())?;
        let seeded = ActionStore::from_csv(path).and_then(|store| {
            let cache = cache_manager::open_cache()?;
            seed_actions(&cache, &store)
        });
        match seeded {
            Ok(count) => println!(" ✓ ({} ticker(s))", count),
            Err(e) => {
                println!(" ✗");
                return Err(format!("Failed to seed actions: {}", e).into());
            }
        }
    }

    if !macro_series.is_empty() {
        print!("Fetching {} macro series...", macro_series.len());
        std::io::Write::flush(&mut std::io::stdout())?;
        let stored = match cache_manager::open_cache() {
            Ok(cache) => fetch_macro_series(&cache, &macro_series, start, end).await,
            Err(e) => Err(e),
        };
        match stored {
            Ok(count) => println!(" ✓ ({} series)", count),
            Err(e) => {
                println!(" ✗");
                return Err(format!("Failed to fetch macro series: {}", e).into());
            }
        }
    }

    println!("\nCache ready.");
    Ok(())
}

async fn grade_artifacts(
    artifacts_dir: &Path,
    year: Option<i32>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║{:^62}║", "SUBMISSION GRADING");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let artifacts = latest_artifacts(artifacts_dir, year)?;
    if artifacts.is_empty() {
        println!("No artifacts found in {}", artifacts_dir.display());
        return Ok(());
    }

    let client = GraderClient::from_env()?;
    println!("Grader: {}", client.config().base_url);
    println!("Artifacts: {} (newest per year and model)\n", artifacts.len());

    println!("  {:<6} {:<9} {:>10}  {}", "Year", "Model", "Score", "File");
    let mut graded = 0;
    let mut failed = 0;
    for ((year, model), path) in &artifacts {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("<artifact>");
        match client.submit(path, *year).await {
            Ok(Some(score)) => {
                graded += 1;
                println!("  {:<6} {:<9} {:>10.5}  {}", year, model, score, name);
            }
            Ok(None) => {
                graded += 1;
                println!("  {:<6} {:<9} {:>10}  {}", year, model, "-", name);
            }
            Err(e) => {
                failed += 1;
                println!("  {:<6} {:<9} {:>10}  {}", year, model, "error", name);
                eprintln!("Warning: grading {} failed: {}", name, e);
            }
        }
    }

    println!("\n{} graded, {} failed", graded, failed);
    Ok(())
}

fn inspect_universe(universe_dir: &Path, year: i32) -> Result<(), Box<dyn std::error::Error>> {
    let universe = YearUniverse::load(universe_dir, year)?;

    println!("Universe {}", year);
    println!("=============\n");
    println!(
        "File: {}",
        universe_dir.join(YearUniverse::file_name(year)).display()
    );
    println!("Constituents: {}\n", universe.len());

    for symbol in universe.symbols() {
        println!("  {}", symbol);
    }

    Ok(())
}

fn load_universes(dir: &Path, years: &[i32]) -> Result<Vec<YearUniverse>, UniverseError> {
    years
        .iter()
        .map(|year| YearUniverse::load(dir, *year))
        .collect()
}

fn fetch_progress(tickers: usize) -> ProgressBar {
    let pb = ProgressBar::new(tickers as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("valid template")
            .progress_chars("█▓░"),
    );
    pb.enable_steady_tick(StdDuration::from_millis(100));
    pb.set_message("Fetching universe data...");
    pb
}
