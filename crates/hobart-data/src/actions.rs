//! Corporate action storage and merging.
//!
//! Dividends and split ratios arrive from a CSV export or the local
//! cache and are merged onto quote frames by date. Tickers without
//! actions simply pass through; the panel builder fills the defaults.

use polars::prelude::*;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use crate::cache::QuoteCache;
use crate::error::{DataError, Result};

#[derive(Debug, Deserialize)]
struct ActionRecord {
    ticker: String,
    date: String,
    #[serde(default)]
    dividend: f64,
    #[serde(default)]
    split_ratio: f64,
}

/// Per-ticker corporate action frames.
///
/// Each frame has columns `date` (Date), `dividend`, `split_ratio`.
#[derive(Debug, Default)]
pub struct ActionStore {
    frames: BTreeMap<String, DataFrame>,
}

impl ActionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load actions from a CSV file.
    ///
    /// Expected columns: `ticker`, `date` (ISO), `dividend`,
    /// `split_ratio`; the amount columns may be omitted per row.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Load actions from any CSV reader.
    pub fn from_reader<R: Read>(input: R) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(input);
        let mut grouped: BTreeMap<String, Vec<ActionRecord>> = BTreeMap::new();
        for result in reader.deserialize() {
            let record: ActionRecord = result?;
            if record.date.is_empty() {
                return Err(DataError::Parse("action row without a date".to_string()));
            }
            grouped.entry(record.ticker.clone()).or_default().push(record);
        }

        let mut store = Self::new();
        for (ticker, records) in grouped {
            let dates: Vec<String> = records.iter().map(|r| r.date.clone()).collect();
            let dividends: Vec<f64> = records.iter().map(|r| r.dividend).collect();
            let splits: Vec<f64> = records.iter().map(|r| r.split_ratio).collect();

            let df = DataFrame::new(vec![
                Series::new("date".into(), dates).into(),
                Series::new("dividend".into(), dividends).into(),
                Series::new("split_ratio".into(), splits).into(),
            ])?
            .lazy()
            .with_column(col("date").cast(DataType::Date))
            .sort(["date"], Default::default())
            .collect()?;
            store.frames.insert(ticker, df);
        }
        Ok(store)
    }

    /// Load actions for the given tickers from the cache.
    pub fn from_cache(cache: &QuoteCache, tickers: &[String]) -> Result<Self> {
        let mut store = Self::new();
        for ticker in tickers {
            let df = cache.get_actions(ticker)?;
            if df.height() > 0 {
                store.frames.insert(ticker.clone(), df);
            }
        }
        Ok(store)
    }

    /// Actions for one ticker, if any were recorded.
    pub fn get(&self, ticker: &str) -> Option<&DataFrame> {
        self.frames.get(ticker)
    }

    /// Number of tickers with at least one action.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether no ticker has actions.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// All actions as one long frame with a `ticker` column, the shape
    /// [`QuoteCache::put_actions`] expects. Empty store, empty frame.
    pub fn to_frame(&self) -> Result<DataFrame> {
        if self.frames.is_empty() {
            return Ok(DataFrame::empty());
        }
        let mut parts: Vec<LazyFrame> = Vec::with_capacity(self.frames.len());
        for (ticker, actions) in &self.frames {
            parts.push(
                actions
                    .clone()
                    .lazy()
                    .with_column(lit(ticker.as_str()).alias("ticker"))
                    .select([
                        col("ticker"),
                        col("date"),
                        col("dividend"),
                        col("split_ratio"),
                    ]),
            );
        }
        Ok(concat(parts, UnionArgs::default())?.collect()?)
    }

    /// Merge a ticker's actions onto its quote frame by date.
    ///
    /// Dates without an action get zeros; a ticker without actions
    /// returns the quotes unchanged. The quote frame must not already
    /// carry `dividend` or `split_ratio` columns.
    pub fn apply(&self, ticker: &str, quotes: DataFrame) -> Result<DataFrame> {
        let Some(actions) = self.frames.get(ticker) else {
            return Ok(quotes);
        };

        let merged = quotes
            .lazy()
            .join(
                actions.clone().lazy(),
                [col("date")],
                [col("date")],
                JoinArgs::new(JoinType::Left),
            )
            .with_columns([
                col("dividend").fill_null(lit(0.0)),
                col("split_ratio").fill_null(lit(0.0)),
            ])
            .collect()?;
        Ok(merged)
    }
}
