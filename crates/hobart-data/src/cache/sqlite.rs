//! SQLite caching layer for market data.

use chrono::{NaiveDate, Utc};
use polars::prelude::*;
use rusqlite::{Connection, params};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{DataError, Result};

/// SQLite cache for quotes, corporate actions, and macro observations.
#[derive(Debug)]
pub struct QuoteCache {
    conn: Connection,
}

impl QuoteCache {
    /// Create a cache backed by a database file.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Create an in-memory cache (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS quotes (
                ticker TEXT NOT NULL,
                date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume INTEGER NOT NULL,
                adjusted_close REAL NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (ticker, date)
            )",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_quotes_ticker_date ON quotes(ticker, date)",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS actions (
                ticker TEXT NOT NULL,
                date TEXT NOT NULL,
                dividend REAL NOT NULL DEFAULT 0,
                split_ratio REAL NOT NULL DEFAULT 0,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (ticker, date)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS macro_observations (
                series TEXT NOT NULL,
                date TEXT NOT NULL,
                value REAL NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (series, date)
            )",
            [],
        )?;

        Ok(())
    }

    /// Check whether quotes covering most of a date range are cached.
    ///
    /// Coverage is approximate: trading days are a fraction of calendar
    /// days, so presence of 70% of range days counts as a hit.
    pub fn has_quotes(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM quotes
             WHERE ticker = ?1 AND date >= ?2 AND date <= ?3",
            params![ticker, start.to_string(), end.to_string()],
            |row| row.get(0),
        )?;

        let days = (end - start).num_days();
        let expected_count = (days as f64 * 0.7) as i64;

        Ok(count >= expected_count)
    }

    /// Get cached quotes for a ticker and date range, sorted by date.
    pub fn get_quotes(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<DataFrame> {
        let mut stmt = self.conn.prepare(
            "SELECT ticker, date, open, high, low, close, volume, adjusted_close
             FROM quotes
             WHERE ticker = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date ASC",
        )?;

        let mut tickers = Vec::new();
        let mut dates = Vec::new();
        let mut opens = Vec::new();
        let mut highs = Vec::new();
        let mut lows = Vec::new();
        let mut closes = Vec::new();
        let mut volumes = Vec::new();
        let mut adj_closes = Vec::new();

        let rows = stmt.query_map(params![ticker, start.to_string(), end.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, f64>(7)?,
            ))
        })?;

        for row in rows {
            let (symbol, date, open, high, low, close, volume, adj_close) = row?;
            tickers.push(symbol);
            dates.push(date);
            opens.push(open);
            highs.push(high);
            lows.push(low);
            closes.push(close);
            volumes.push(volume);
            adj_closes.push(adj_close);
        }

        if dates.is_empty() {
            return Err(DataError::MissingData {
                symbol: ticker.to_string(),
                reason: "no cached quotes found".to_string(),
            });
        }

        let df = DataFrame::new(vec![
            Series::new("ticker".into(), tickers).into(),
            Series::new("date".into(), dates).into(),
            Series::new("open".into(), opens).into(),
            Series::new("high".into(), highs).into(),
            Series::new("low".into(), lows).into(),
            Series::new("close".into(), closes).into(),
            Series::new("volume".into(), volumes).into(),
            Series::new("adjusted_close".into(), adj_closes).into(),
        ])?;

        let df = df
            .lazy()
            .with_column(col("date").cast(DataType::Date))
            .collect()?;

        Ok(df)
    }

    /// Store quotes in the cache, replacing rows with the same key.
    pub fn put_quotes(&self, df: &DataFrame) -> Result<()> {
        let cached_at = Utc::now().to_rfc3339();

        let tickers = df.column("ticker")?.str()?;
        let dates = df.column("date")?.cast(&DataType::String)?;
        let dates = dates.str()?;
        let opens = df.column("open")?.f64()?;
        let highs = df.column("high")?.f64()?;
        let lows = df.column("low")?.f64()?;
        let closes = df.column("close")?.f64()?;
        let volumes = df.column("volume")?.cast(&DataType::Int64)?;
        let volumes = volumes.i64()?;
        let adj_closes = df.column("adjusted_close")?.f64()?;

        let tx = self.conn.unchecked_transaction()?;
        for i in 0..df.height() {
            let ticker = tickers
                .get(i)
                .ok_or_else(|| DataError::Parse("missing ticker".to_string()))?;
            let date = dates
                .get(i)
                .ok_or_else(|| DataError::Parse("missing date".to_string()))?;
            let open = opens
                .get(i)
                .ok_or_else(|| DataError::Parse("missing open".to_string()))?;
            let high = highs
                .get(i)
                .ok_or_else(|| DataError::Parse("missing high".to_string()))?;
            let low = lows
                .get(i)
                .ok_or_else(|| DataError::Parse("missing low".to_string()))?;
            let close = closes
                .get(i)
                .ok_or_else(|| DataError::Parse("missing close".to_string()))?;
            let volume = volumes
                .get(i)
                .ok_or_else(|| DataError::Parse("missing volume".to_string()))?;
            let adj_close = adj_closes
                .get(i)
                .ok_or_else(|| DataError::Parse("missing adjusted_close".to_string()))?;

            tx.execute(
                "INSERT OR REPLACE INTO quotes
                 (ticker, date, open, high, low, close, volume, adjusted_close, cached_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![ticker, date, open, high, low, close, volume, adj_close, cached_at],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Store corporate actions, replacing rows with the same key.
    ///
    /// Expects columns `ticker`, `date`, `dividend`, `split_ratio`.
    pub fn put_actions(&self, df: &DataFrame) -> Result<()> {
        let cached_at = Utc::now().to_rfc3339();

        let tickers = df.column("ticker")?.str()?;
        let dates = df.column("date")?.cast(&DataType::String)?;
        let dates = dates.str()?;
        let dividends = df.column("dividend")?.f64()?;
        let splits = df.column("split_ratio")?.f64()?;

        let tx = self.conn.unchecked_transaction()?;
        for i in 0..df.height() {
            let ticker = tickers
                .get(i)
                .ok_or_else(|| DataError::Parse("missing ticker".to_string()))?;
            let date = dates
                .get(i)
                .ok_or_else(|| DataError::Parse("missing date".to_string()))?;
            let dividend = dividends.get(i).unwrap_or(0.0);
            let split_ratio = splits.get(i).unwrap_or(0.0);

            tx.execute(
                "INSERT OR REPLACE INTO actions
                 (ticker, date, dividend, split_ratio, cached_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![ticker, date, dividend, split_ratio, cached_at],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Get corporate actions for a ticker, sorted by date.
    ///
    /// Returns an empty frame when the ticker has none.
    pub fn get_actions(&self, ticker: &str) -> Result<DataFrame> {
        let mut stmt = self.conn.prepare(
            "SELECT date, dividend, split_ratio FROM actions
             WHERE ticker = ?1 ORDER BY date ASC",
        )?;

        let mut dates: Vec<String> = Vec::new();
        let mut dividends: Vec<f64> = Vec::new();
        let mut splits: Vec<f64> = Vec::new();

        let rows = stmt.query_map(params![ticker], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?;
        for row in rows {
            let (date, dividend, split_ratio) = row?;
            dates.push(date);
            dividends.push(dividend);
            splits.push(split_ratio);
        }

        let df = DataFrame::new(vec![
            Series::new("date".into(), dates).into(),
            Series::new("dividend".into(), dividends).into(),
            Series::new("split_ratio".into(), splits).into(),
        ])?;
        let df = df
            .lazy()
            .with_column(col("date").cast(DataType::Date))
            .collect()?;
        Ok(df)
    }

    /// Store one macro series' observations, replacing same-date rows.
    pub fn put_macro_series(&self, series: &str, observations: &DataFrame) -> Result<()> {
        let cached_at = Utc::now().to_rfc3339();

        let dates = observations.column("date")?.cast(&DataType::String)?;
        let dates = dates.str()?;
        let values = observations.column("value")?.f64()?;

        let tx = self.conn.unchecked_transaction()?;
        for i in 0..observations.height() {
            let date = dates
                .get(i)
                .ok_or_else(|| DataError::Parse("missing date".to_string()))?;
            let Some(value) = values.get(i) else {
                continue;
            };
            tx.execute(
                "INSERT OR REPLACE INTO macro_observations
                 (series, date, value, cached_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![series, date, value, cached_at],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Get every cached macro series as one wide frame keyed by date.
    ///
    /// Dates missing an observation for a series carry a null there.
    pub fn get_macro(&self) -> Result<DataFrame> {
        let mut stmt = self.conn.prepare(
            "SELECT series, date, value FROM macro_observations ORDER BY series, date",
        )?;

        let mut by_series: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?;
        for row in rows {
            let (series, date, value) = row?;
            by_series.entry(series).or_default().insert(date, value);
        }

        let mut all_dates: Vec<String> = by_series
            .values()
            .flat_map(|observations| observations.keys().cloned())
            .collect();
        all_dates.sort();
        all_dates.dedup();

        let mut columns: Vec<Column> =
            vec![Series::new("date".into(), all_dates.clone()).into()];
        for (series, observations) in &by_series {
            let values: Vec<Option<f64>> = all_dates
                .iter()
                .map(|date| observations.get(date).copied())
                .collect();
            columns.push(Series::new(series.as_str().into(), values).into());
        }

        let df = DataFrame::new(columns)?;
        let df = df
            .lazy()
            .with_column(col("date").cast(DataType::Date))
            .collect()?;
        Ok(df)
    }

    /// Remove all cached rows for a ticker.
    pub fn clear_ticker(&self, ticker: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM quotes WHERE ticker = ?1", params![ticker])?;
        self.conn
            .execute("DELETE FROM actions WHERE ticker = ?1", params![ticker])?;
        Ok(())
    }

    /// Tickers with at least one cached quote row.
    pub fn cached_tickers(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT ticker FROM quotes ORDER BY ticker")?;
        let tickers = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(tickers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_quotes() -> DataFrame {
        df!(
            "ticker" => ["AAPL", "AAPL", "MSFT"],
            "date" => ["2024-01-02", "2024-01-03", "2024-01-02"],
            "open" => [184.0, 185.0, 370.0],
            "high" => [186.0, 186.5, 373.0],
            "low" => [183.0, 184.0, 368.0],
            "close" => [185.5, 184.2, 372.0],
            "volume" => [50_000_000i64, 48_000_000, 22_000_000],
            "adjusted_close" => [185.5, 184.2, 372.0],
        )
        .unwrap()
    }

    #[test]
    fn test_put_and_get_quotes() {
        let cache = QuoteCache::in_memory().unwrap();
        cache.put_quotes(&sample_quotes()).unwrap();

        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let df = cache.get_quotes("AAPL", start, end).unwrap();

        assert_eq!(df.height(), 2);
        assert_eq!(df.column("date").unwrap().dtype(), &DataType::Date);
        let closes = df.column("close").unwrap().f64().unwrap();
        assert_eq!(closes.get(0), Some(185.5));
    }

    #[test]
    fn test_get_quotes_empty_range_fails() {
        let cache = QuoteCache::in_memory().unwrap();
        cache.put_quotes(&sample_quotes()).unwrap();

        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2020, 12, 31).unwrap();
        let result = cache.get_quotes("AAPL", start, end);
        assert!(matches!(result, Err(DataError::MissingData { .. })));
    }

    #[test]
    fn test_upsert_replaces_same_key() {
        let cache = QuoteCache::in_memory().unwrap();
        cache.put_quotes(&sample_quotes()).unwrap();

        let updated = df!(
            "ticker" => ["AAPL"],
            "date" => ["2024-01-02"],
            "open" => [184.0],
            "high" => [186.0],
            "low" => [183.0],
            "close" => [200.0],
            "volume" => [51_000_000i64],
            "adjusted_close" => [200.0],
        )
        .unwrap();
        cache.put_quotes(&updated).unwrap();

        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let df = cache.get_quotes("AAPL", start, end).unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.column("close").unwrap().f64().unwrap().get(0), Some(200.0));
    }

    #[test]
    fn test_actions_roundtrip_and_empty() {
        let cache = QuoteCache::in_memory().unwrap();
        let actions = df!(
            "ticker" => ["AAPL", "AAPL"],
            "date" => ["2024-02-09", "2024-05-10"],
            "dividend" => [0.24, 0.25],
            "split_ratio" => [0.0, 0.0],
        )
        .unwrap();
        cache.put_actions(&actions).unwrap();

        let df = cache.get_actions("AAPL").unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("dividend").unwrap().f64().unwrap().get(0), Some(0.24));

        let none = cache.get_actions("MSFT").unwrap();
        assert_eq!(none.height(), 0);
    }

    #[test]
    fn test_macro_series_assemble_wide() {
        let cache = QuoteCache::in_memory().unwrap();
        let rates = df!(
            "date" => ["2024-01-02", "2024-01-03"],
            "value" => [5.33, 5.34],
        )
        .unwrap();
        let vix = df!(
            "date" => ["2024-01-03"],
            "value" => [13.1],
        )
        .unwrap();
        cache.put_macro_series("fed_funds", &rates).unwrap();
        cache.put_macro_series("vix", &vix).unwrap();

        let wide = cache.get_macro().unwrap();
        assert_eq!(wide.height(), 2);
        assert_eq!(wide.width(), 3);
        let vix_col = wide.column("vix").unwrap().f64().unwrap();
        assert_eq!(vix_col.get(0), None);
        assert_eq!(vix_col.get(1), Some(13.1));
    }

    #[test]
    fn test_has_quotes_coverage() {
        let cache = QuoteCache::in_memory().unwrap();
        cache.put_quotes(&sample_quotes()).unwrap();

        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert!(cache.has_quotes("AAPL", start, end).unwrap());

        let wide_end = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        assert!(!cache.has_quotes("AAPL", start, wide_end).unwrap());
    }

    #[test]
    fn test_clear_ticker() {
        let cache = QuoteCache::in_memory().unwrap();
        cache.put_quotes(&sample_quotes()).unwrap();
        cache.clear_ticker("AAPL").unwrap();

        assert_eq!(cache.cached_tickers().unwrap(), vec!["MSFT".to_string()]);
    }
}
