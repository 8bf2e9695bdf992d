//! Data acquisition for experiment runs.
//!
//! Fetches OHLCV history for a universe of tickers, seeds the SQLite
//! cache with corporate actions and macro series, and loads whatever
//! the cache already holds so repeated runs stay off the network.

use super::cache_manager;
use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use hobart_data::cache::QuoteCache;
use hobart_data::error::{DataError, Result};
use hobart_data::{ActionStore, MacroProvider, QuoteProvider};
use indicatif::ProgressBar;
use polars::prelude::DataFrame;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Configuration for data fetching.
#[derive(Debug, Clone)]
pub(crate) struct FetchConfig {
    /// Whether to use the cache.
    pub use_cache: bool,
    /// Whether to force refresh (ignore cache).
    pub force_refresh: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            force_refresh: false,
        }
    }
}

/// Convert DateTime<Utc> to NaiveDate for cache lookups.
fn to_naive_date(dt: DateTime<Utc>) -> NaiveDate {
    dt.date_naive()
}

/// Default number of concurrent fetches.
const DEFAULT_CONCURRENCY: usize = 10;

/// Fetch OHLCV history for every ticker, keyed by ticker.
///
/// Checks the SQLite cache first, then fetches the misses from Yahoo
/// Finance concurrently and stores them back. A ticker whose fetch
/// fails is skipped with a warning; the call only fails if no ticker
/// yields data at all.
pub(crate) async fn fetch_universe_quotes(
    provider: &QuoteProvider,
    tickers: &[String],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    config: &FetchConfig,
    progress: Option<&ProgressBar>,
) -> Result<BTreeMap<String, DataFrame>> {
    let start_date = to_naive_date(start);
    let end_date = to_naive_date(end);

    // Try to open cache if enabled
    let cache = if config.use_cache {
        cache_manager::open_cache().ok()
    } else {
        None
    };

    let mut series: BTreeMap<String, DataFrame> = BTreeMap::new();
    let mut to_fetch: Vec<String> = Vec::new();

    // Check cache for each ticker
    if let Some(ref cache) = cache {
        if !config.force_refresh {
            for ticker in tickers {
                if cache
                    .has_quotes(ticker, start_date, end_date)
                    .unwrap_or(false)
                    && let Ok(df) = cache.get_quotes(ticker, start_date, end_date)
                {
                    series.insert(ticker.clone(), df);
                    continue;
                }
                to_fetch.push(ticker.clone());
            }
        } else {
            to_fetch = tickers.to_vec();
        }
    } else {
        to_fetch = tickers.to_vec();
    }

    // Update progress bar length based on what we actually need to fetch
    if let Some(pb) = progress {
        let total = series.len() + to_fetch.len();
        pb.set_length(total as u64);
        // Mark cached tickers as already done
        pb.set_position(series.len() as u64);
        if to_fetch.is_empty() {
            pb.set_message("Loading from cache...");
        } else {
            pb.set_message(format!(
                "Fetching {} tickers ({} concurrent)...",
                to_fetch.len(),
                DEFAULT_CONCURRENCY
            ));
        }
    }

    // Fetch missing data from Yahoo in parallel
    if !to_fetch.is_empty() {
        // Use Arc<Mutex<>> for thread-safe collection of results
        let results: Arc<Mutex<BTreeMap<String, DataFrame>>> = Arc::new(Mutex::new(BTreeMap::new()));
        let cache_arc = Arc::new(Mutex::new(cache));

        stream::iter(to_fetch)
            .map(|ticker| {
                let results = Arc::clone(&results);
                let cache = Arc::clone(&cache_arc);
                async move {
                    match provider.fetch_quotes(&ticker, start, end).await {
                        Ok(df) => {
                            // Store in cache if available
                            let cache_guard = cache.lock().await;
                            if let Some(ref cache) = *cache_guard
                                && let Err(e) = cache.put_quotes(&df)
                            {
                                eprintln!("Warning: Failed to cache quotes for {}: {}", ticker, e);
                            }
                            drop(cache_guard);
                            results.lock().await.insert(ticker.clone(), df);
                            Ok(ticker)
                        }
                        Err(e) => Err((ticker, e)),
                    }
                }
            })
            .buffer_unordered(DEFAULT_CONCURRENCY)
            .for_each(|result| async {
                match result {
                    Ok(_ticker) => {
                        if let Some(pb) = progress {
                            pb.inc(1);
                        }
                    }
                    Err((ticker, e)) => {
                        if let Some(pb) = progress {
                            pb.suspend(|| {
                                eprintln!("Warning: Failed to fetch data for {}: {}", ticker, e);
                            });
                            pb.inc(1);
                        } else {
                            eprintln!("Warning: Failed to fetch data for {}: {}", ticker, e);
                        }
                    }
                }
            })
            .await;

        let fetched = Arc::try_unwrap(results).map_or_else(
            |_| unreachable!("all tasks completed, Arc should have single owner"),
            |mutex| mutex.into_inner(),
        );
        series.extend(fetched);
    }

    if series.is_empty() {
        return Err(DataError::MissingData {
            symbol: "batch".to_string(),
            reason: "No data fetched for any ticker".to_string(),
        });
    }

    Ok(series)
}

/// Seed the cache with corporate actions from a loaded store.
pub(crate) fn seed_actions(cache: &QuoteCache, store: &ActionStore) -> Result<usize> {
    if store.is_empty() {
        return Ok(0);
    }
    cache.put_actions(&store.to_frame()?)?;
    Ok(store.len())
}

/// Fetch macro series over a date range and store them in the cache.
///
/// Returns the number of series stored. Requires `HOBART_MACRO_API_KEY`
/// in the environment.
pub(crate) async fn fetch_macro_series(
    cache: &QuoteCache,
    series_ids: &[String],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<usize> {
    let provider = MacroProvider::from_env()?;
    let start_str = to_naive_date(start).format("%Y-%m-%d").to_string();
    let end_str = to_naive_date(end).format("%Y-%m-%d").to_string();

    let mut stored = 0;
    for series_id in series_ids {
        let observations = provider
            .fetch_series(series_id, &start_str, &end_str)
            .await?;
        cache.put_macro_series(series_id, &observations)?;
        stored += 1;
    }
    Ok(stored)
}

/// Load whatever macro series the cache holds as one wide frame.
///
/// Returns `None` when no series have been cached yet.
pub(crate) fn load_cached_macro() -> Result<Option<DataFrame>> {
    let cache = cache_manager::open_cache()?;
    let frame = cache.get_macro()?;
    if frame.width() <= 1 || frame.height() == 0 {
        return Ok(None);
    }
    Ok(Some(frame))
}

/// Print cache location info.
pub(crate) fn print_cache_info() {
    let path = cache_manager::cache_path();
    println!("  Cache location: {}", path.display());
    if let Ok(cache) = cache_manager::open_cache()
        && let Ok(tickers) = cache.cached_tickers()
    {
        println!("  Cached tickers: {}", tickers.len());
    }
}
