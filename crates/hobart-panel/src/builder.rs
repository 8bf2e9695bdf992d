//! Long-form panel assembly.
//!
//! Turns a collection of per-ticker OHLCV series (plus an optional
//! date-indexed macro series) into one validated long panel keyed by
//! (ticker, date), with the fixed-horizon forward return attached.

use std::collections::BTreeMap;

use polars::prelude::*;

use crate::error::{PanelError, Result};
use crate::schema;

/// Configuration for [`PanelBuilder`].
#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// Forward-return horizon, counted in rows of each ticker's own sequence.
    pub horizon: usize,
    /// Minimum rows a per-ticker series needs to enter the panel.
    pub min_rows: usize,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            horizon: 63,
            min_rows: 1,
        }
    }
}

/// A validated long-form (ticker, date) panel.
///
/// Rows are sorted by (ticker, date) and the key is unique. The panel
/// remembers whether the leakage shift has been applied so downstream
/// stages can log the transform state they trained against.
#[derive(Debug, Clone)]
pub struct Panel {
    df: DataFrame,
    shift_applied: bool,
}

impl Panel {
    /// Wrap an externally assembled frame, enforcing the key invariant.
    pub fn from_frame(df: DataFrame) -> Result<Self> {
        let missing: Vec<String> = schema::KEY_COLUMNS
            .iter()
            .filter(|name| df.column(name).is_err())
            .map(|name| (*name).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PanelError::MissingColumns {
                context: "panel".to_string(),
                columns: missing,
            });
        }
        let unique = df
            .clone()
            .lazy()
            .select([col(schema::TICKER), col(schema::DATE)])
            .unique_stable(None, UniqueKeepStrategy::First)
            .collect()?;
        let duplicates = df.height() - unique.height();
        if duplicates > 0 {
            return Err(PanelError::DuplicateKeys { count: duplicates });
        }
        Ok(Self {
            df,
            shift_applied: false,
        })
    }

    pub(crate) fn with_state(df: DataFrame, shift_applied: bool) -> Self {
        Self { df, shift_applied }
    }

    /// The underlying frame.
    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    /// Consume the panel, yielding the frame.
    pub fn into_frame(self) -> DataFrame {
        self.df
    }

    /// A lazy view of the frame.
    pub fn lazy(&self) -> LazyFrame {
        self.df.clone().lazy()
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Whether the one-step leakage shift has been applied.
    pub const fn shift_applied(&self) -> bool {
        self.shift_applied
    }

    /// Distinct tickers present, ascending.
    pub fn tickers(&self) -> Result<Vec<String>> {
        let unique = self
            .df
            .clone()
            .lazy()
            .select([col(schema::TICKER)])
            .unique_stable(None, UniqueKeepStrategy::First)
            .sort([schema::TICKER], Default::default())
            .collect()?;
        let names = unique.column(schema::TICKER)?.str()?;
        Ok(names.into_iter().flatten().map(str::to_string).collect())
    }

    /// Float columns that are neither keys, raw market data, nor targets.
    pub fn feature_columns(&self) -> Vec<String> {
        self.df
            .get_columns()
            .iter()
            .filter(|column| {
                matches!(column.dtype(), DataType::Float64 | DataType::Float32)
                    && !schema::is_reserved(column.name().as_str())
            })
            .map(|column| column.name().to_string())
            .collect()
    }
}

/// Builds the long-form panel from per-ticker series.
#[derive(Debug)]
pub struct PanelBuilder {
    config: PanelConfig,
}

impl PanelBuilder {
    /// Create a builder, validating the configuration.
    pub fn new(config: PanelConfig) -> Result<Self> {
        if config.horizon == 0 {
            return Err(PanelError::InvalidHorizon(0));
        }
        Ok(Self { config })
    }

    /// The active configuration.
    pub const fn config(&self) -> &PanelConfig {
        &self.config
    }

    /// Assemble the panel.
    ///
    /// A malformed ticker series (missing columns, bad date type, too few
    /// rows, or a column set diverging from the rest) is skipped with a
    /// warning; the build only fails if nothing survives.
    pub fn build(
        &self,
        ticker_series: &BTreeMap<String, DataFrame>,
        macro_series: Option<&DataFrame>,
    ) -> Result<Panel> {
        let mut parts: Vec<LazyFrame> = Vec::with_capacity(ticker_series.len());
        let mut reference: Option<Vec<String>> = None;

        for (ticker, series) in ticker_series {
            match self.prepare_series(ticker, series, &mut reference) {
                Ok(part) => parts.push(part),
                Err(err) => log::warn!("skipping ticker {ticker}: {err}"),
            }
        }

        if parts.is_empty() {
            return Err(PanelError::EmptyBuild {
                reason: "no ticker series passed validation".to_string(),
            });
        }

        let mut lf = concat(parts, UnionArgs::default())?;

        let macro_columns = match macro_series {
            Some(frame) => {
                let (joined, columns) = join_macro(lf, frame)?;
                lf = joined;
                columns
            }
            None => Vec::new(),
        };

        // Key order first: the per-ticker window operations below assume
        // each ticker's rows are contiguous and date-ascending.
        lf = lf
            .sort(
                [schema::TICKER, schema::DATE],
                SortMultipleOptions::default().with_maintain_order(true),
            )
            .unique_stable(
                Some(vec![schema::TICKER.into(), schema::DATE.into()]),
                UniqueKeepStrategy::Last,
            );

        if !macro_columns.is_empty() {
            let fills: Vec<Expr> = macro_columns
                .iter()
                .map(|name| {
                    col(name.as_str())
                        .forward_fill(None)
                        .backward_fill(None)
                        .over([col(schema::TICKER)])
                        .alias(name.as_str())
                })
                .collect();
            lf = lf.with_columns(fills);
        }

        let assembled = lf.collect()?;
        let scrubbed = scrub_infinite(assembled)?;
        let with_targets = self.attach_targets(scrubbed)?;
        Panel::from_frame(with_targets)
    }

    /// Validate one ticker series and stage it for concatenation.
    fn prepare_series(
        &self,
        ticker: &str,
        series: &DataFrame,
        reference: &mut Option<Vec<String>>,
    ) -> Result<LazyFrame> {
        let missing: Vec<String> = schema::REQUIRED_OHLCV
            .iter()
            .filter(|name| series.column(name).is_err())
            .map(|name| (*name).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PanelError::MissingColumns {
                context: format!("ticker series {ticker}"),
                columns: missing,
            });
        }
        if series.height() < self.config.min_rows {
            return Err(PanelError::InsufficientRows {
                ticker: ticker.to_string(),
                rows: series.height(),
                required: self.config.min_rows,
            });
        }
        let date_type = series.column(schema::DATE)?.dtype().clone();
        if !matches!(date_type, DataType::Date | DataType::Datetime(_, _)) {
            return Err(PanelError::InvalidDateType {
                context: format!("ticker series {ticker}"),
                dtype: date_type.to_string(),
            });
        }

        let mut exprs = vec![
            col(schema::DATE).cast(DataType::Date),
            col(schema::OPEN).cast(DataType::Float64),
            col(schema::HIGH).cast(DataType::Float64),
            col(schema::LOW).cast(DataType::Float64),
            col(schema::CLOSE).cast(DataType::Float64),
            col(schema::VOLUME).cast(DataType::Int64),
        ];
        if series.column(schema::DIVIDEND).is_ok() {
            exprs.push(col(schema::DIVIDEND).cast(DataType::Float64));
        } else {
            exprs.push(lit(0.0).alias(schema::DIVIDEND));
        }
        if series.column(schema::SPLIT_RATIO).is_ok() {
            exprs.push(col(schema::SPLIT_RATIO).cast(DataType::Float64));
        } else {
            exprs.push(lit(0.0).alias(schema::SPLIT_RATIO));
        }

        let prepared = series
            .clone()
            .lazy()
            .with_columns(exprs)
            .drop_nulls(Some(vec![col(schema::DATE)]))
            .with_column(lit(ticker).alias(schema::TICKER));

        let mut names: Vec<String> = series
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        for default in [schema::DIVIDEND, schema::SPLIT_RATIO, schema::TICKER] {
            if !names.iter().any(|name| name == default) {
                names.push(default.to_string());
            }
        }

        match reference {
            Some(expected) => {
                let mut expected_sorted = expected.clone();
                expected_sorted.sort_unstable();
                let mut got = names;
                got.sort_unstable();
                if expected_sorted != got {
                    return Err(PanelError::ColumnSetMismatch {
                        ticker: ticker.to_string(),
                    });
                }
                let ordered: Vec<Expr> = expected.iter().map(|name| col(name.as_str())).collect();
                Ok(prepared.select(ordered))
            }
            None => {
                *reference = Some(names.clone());
                let ordered: Vec<Expr> = names.iter().map(|name| col(name.as_str())).collect();
                Ok(prepared.select(ordered))
            }
        }
    }

    /// Attach `target_return` and `target_date` at the configured horizon.
    fn attach_targets(&self, df: DataFrame) -> Result<DataFrame> {
        let steps = self.config.horizon as i64;
        let future_close = col(schema::CLOSE)
            .shift(lit(-steps))
            .over([col(schema::TICKER)]);
        let out = df
            .lazy()
            .with_columns([
                (future_close / col(schema::CLOSE) - lit(1.0)).alias(schema::TARGET_RETURN),
                col(schema::DATE)
                    .shift(lit(-steps))
                    .over([col(schema::TICKER)])
                    .alias(schema::TARGET_DATE),
            ])
            .collect()?;
        Ok(out)
    }
}

/// Left-join a date-indexed macro frame onto the panel.
///
/// Returns the joined frame and the macro column names so the caller can
/// fill them within each ticker's sequence after the panel sort.
fn join_macro(lf: LazyFrame, macros: &DataFrame) -> Result<(LazyFrame, Vec<String>)> {
    if macros.column(schema::DATE).is_err() {
        return Err(PanelError::MissingColumns {
            context: "macro series".to_string(),
            columns: vec![schema::DATE.to_string()],
        });
    }
    let date_type = macros.column(schema::DATE)?.dtype().clone();
    if !matches!(date_type, DataType::Date | DataType::Datetime(_, _)) {
        return Err(PanelError::InvalidDateType {
            context: "macro series".to_string(),
            dtype: date_type.to_string(),
        });
    }
    let columns: Vec<String> = macros
        .get_column_names()
        .iter()
        .filter(|name| name.as_str() != schema::DATE)
        .map(|name| name.to_string())
        .collect();

    let macro_lf = macros
        .clone()
        .lazy()
        .with_column(col(schema::DATE).cast(DataType::Date))
        .drop_nulls(Some(vec![col(schema::DATE)]))
        .unique_stable(
            Some(vec![schema::DATE.into()]),
            UniqueKeepStrategy::Last,
        )
        .sort([schema::DATE], Default::default());

    let joined = lf.join(
        macro_lf,
        [col(schema::DATE)],
        [col(schema::DATE)],
        JoinArgs::new(JoinType::Left),
    );
    Ok((joined, columns))
}

/// Replace ±infinity with null in every float column.
fn scrub_infinite(df: DataFrame) -> Result<DataFrame> {
    let exprs: Vec<Expr> = df
        .get_columns()
        .iter()
        .filter(|column| matches!(column.dtype(), DataType::Float64 | DataType::Float32))
        .map(|column| {
            let name = column.name().as_str();
            when(
                col(name)
                    .eq(lit(f64::INFINITY))
                    .or(col(name).eq(lit(f64::NEG_INFINITY))),
            )
            .then(lit(NULL))
            .otherwise(col(name))
            .alias(name)
        })
        .collect();
    if exprs.is_empty() {
        return Ok(df);
    }
    Ok(df.lazy().with_columns(exprs).collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate};

    fn day(year: i32, month: u32, dom: u32) -> i32 {
        const UNIX_EPOCH_DAYS: i32 = 719_163;
        NaiveDate::from_ymd_opt(year, month, dom)
            .unwrap()
            .num_days_from_ce()
            - UNIX_EPOCH_DAYS
    }

    fn quote_frame(days: &[i32], closes: &[f64]) -> DataFrame {
        let volume: Vec<i64> = vec![1_000; days.len()];
        let df = df!(
            "date" => days,
            "open" => closes,
            "high" => closes,
            "low" => closes,
            "close" => closes,
            "volume" => &volume,
        )
        .unwrap();
        df.lazy()
            .with_column(col("date").cast(DataType::Date))
            .collect()
            .unwrap()
    }

    fn builder(horizon: usize) -> PanelBuilder {
        PanelBuilder::new(PanelConfig {
            horizon,
            min_rows: 1,
        })
        .unwrap()
    }

    fn series_map(entries: Vec<(&str, DataFrame)>) -> BTreeMap<String, DataFrame> {
        entries
            .into_iter()
            .map(|(ticker, df)| (ticker.to_string(), df))
            .collect()
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let err = PanelBuilder::new(PanelConfig {
            horizon: 0,
            min_rows: 1,
        });
        assert!(matches!(err, Err(PanelError::InvalidHorizon(0))));
    }

    #[test]
    fn test_target_return_formula() {
        let days = [day(2021, 1, 4), day(2021, 1, 5), day(2021, 1, 6)];
        let series = series_map(vec![("X", quote_frame(&days, &[100.0, 100.0, 110.0]))]);
        let panel = builder(2).build(&series, None).unwrap();

        let target = panel.frame().column("target_return").unwrap().f64().unwrap();
        assert_eq!(panel.height(), 3);
        // index 0 sees the close two rows ahead: 110/100 - 1
        assert!((target.get(0).unwrap() - 0.10).abs() < 1e-12);
        assert!(target.get(1).is_none());
        assert!(target.get(2).is_none());

        let target_date = panel.frame().column("target_date").unwrap();
        assert_eq!(target_date.null_count(), 2);
    }

    #[test]
    fn test_target_counted_in_own_sequence() {
        // Ticker B has gaps relative to A; the horizon counts B's own rows.
        let a_days = [day(2021, 1, 4), day(2021, 1, 5), day(2021, 1, 6)];
        let b_days = [day(2021, 1, 4), day(2021, 1, 8), day(2021, 1, 20)];
        let series = series_map(vec![
            ("A", quote_frame(&a_days, &[10.0, 20.0, 30.0])),
            ("B", quote_frame(&b_days, &[100.0, 150.0, 300.0])),
        ]);
        let panel = builder(1).build(&series, None).unwrap();

        let df = panel
            .lazy()
            .filter(col("ticker").eq(lit("B")))
            .collect()
            .unwrap();
        let target = df.column("target_return").unwrap().f64().unwrap();
        assert!((target.get(0).unwrap() - 0.5).abs() < 1e-12);
        assert!((target.get(1).unwrap() - 1.0).abs() < 1e-12);
        assert!(target.get(2).is_none());
    }

    #[test]
    fn test_duplicate_keys_keep_last() {
        let days = [day(2021, 1, 4), day(2021, 1, 4), day(2021, 1, 5)];
        let series = series_map(vec![("A", quote_frame(&days, &[10.0, 11.0, 12.0]))]);
        let panel = builder(1).build(&series, None).unwrap();

        assert_eq!(panel.height(), 2);
        let close = panel.frame().column("close").unwrap().f64().unwrap();
        // the later-arriving row for Jan 4 wins
        assert_eq!(close.get(0), Some(11.0));
        assert_eq!(close.get(1), Some(12.0));
    }

    #[test]
    fn test_unique_key_invariant() {
        let days = [day(2021, 1, 4), day(2021, 1, 5)];
        let series = series_map(vec![
            ("A", quote_frame(&days, &[1.0, 2.0])),
            ("B", quote_frame(&days, &[3.0, 4.0])),
        ]);
        let panel = builder(1).build(&series, None).unwrap();

        let keys = panel
            .lazy()
            .select([col("ticker"), col("date")])
            .unique_stable(None, UniqueKeepStrategy::First)
            .collect()
            .unwrap();
        assert_eq!(keys.height(), panel.height());
    }

    #[test]
    fn test_malformed_ticker_skipped_not_fatal() {
        let days = [day(2021, 1, 4), day(2021, 1, 5)];
        let broken = df!(
            "date" => &days[..],
            "close" => &[1.0, 2.0],
        )
        .unwrap();
        let series = series_map(vec![
            ("BAD", broken),
            ("GOOD", quote_frame(&days, &[5.0, 6.0])),
        ]);
        let panel = builder(1).build(&series, None).unwrap();

        assert_eq!(panel.tickers().unwrap(), vec!["GOOD".to_string()]);
    }

    #[test]
    fn test_all_series_malformed_is_fatal() {
        let broken = df!("close" => &[1.0, 2.0]).unwrap();
        let series = series_map(vec![("BAD", broken)]);
        let err = builder(1).build(&series, None);
        assert!(matches!(err, Err(PanelError::EmptyBuild { .. })));
    }

    #[test]
    fn test_datetime_truncated_to_date() {
        let base = i64::from(day(2021, 1, 4)) * 86_400 + 49_500;
        let nanos = [base * 1_000_000_000, (base + 86_400) * 1_000_000_000];
        let df = df!(
            "date" => &nanos[..],
            "open" => &[1.0, 2.0],
            "high" => &[1.0, 2.0],
            "low" => &[1.0, 2.0],
            "close" => &[1.0, 2.0],
            "volume" => &[10i64, 20],
        )
        .unwrap()
        .lazy()
        .with_column(col("date").cast(DataType::Datetime(TimeUnit::Nanoseconds, None)))
        .collect()
        .unwrap();

        let panel = builder(1)
            .build(&series_map(vec![("A", df)]), None)
            .unwrap();
        assert_eq!(panel.frame().column("date").unwrap().dtype(), &DataType::Date);

        let dates = panel
            .lazy()
            .select([col("date").cast(DataType::Int32)])
            .collect()
            .unwrap();
        let got = dates.column("date").unwrap().i32().unwrap();
        assert_eq!(got.get(0), Some(day(2021, 1, 4)));
        assert_eq!(got.get(1), Some(day(2021, 1, 5)));
    }

    #[test]
    fn test_null_dates_dropped() {
        let days = [Some(day(2021, 1, 4)), None, Some(day(2021, 1, 6))];
        let df = df!(
            "date" => &days[..],
            "open" => &[1.0, 2.0, 3.0],
            "high" => &[1.0, 2.0, 3.0],
            "low" => &[1.0, 2.0, 3.0],
            "close" => &[1.0, 2.0, 3.0],
            "volume" => &[1i64, 2, 3],
        )
        .unwrap()
        .lazy()
        .with_column(col("date").cast(DataType::Date))
        .collect()
        .unwrap();

        let panel = builder(1)
            .build(&series_map(vec![("A", df)]), None)
            .unwrap();
        assert_eq!(panel.height(), 2);
    }

    #[test]
    fn test_infinity_becomes_null() {
        let days = [day(2021, 1, 4), day(2021, 1, 5)];
        let mut df = quote_frame(&days, &[1.0, 2.0]);
        let ratio = Series::new("ratio".into(), &[f64::INFINITY, 0.5]);
        df.with_column(ratio).unwrap();

        let panel = builder(1)
            .build(&series_map(vec![("A", df)]), None)
            .unwrap();
        let scrubbed = panel.frame().column("ratio").unwrap().f64().unwrap();
        assert!(scrubbed.get(0).is_none());
        assert_eq!(scrubbed.get(1), Some(0.5));
    }

    #[test]
    fn test_macro_filled_within_ticker_only() {
        // A trades before the macro series starts and must stay null;
        // B overlaps it and gets forward/backward fill inside its own rows.
        let a_days = [day(2020, 1, 6), day(2020, 1, 7)];
        let b_days = [day(2021, 1, 4), day(2021, 1, 5), day(2021, 1, 6)];
        let macro_df = df!(
            "date" => &[day(2021, 1, 5)],
            "rate" => &[2.5],
        )
        .unwrap()
        .lazy()
        .with_column(col("date").cast(DataType::Date))
        .collect()
        .unwrap();

        let series = series_map(vec![
            ("A", quote_frame(&a_days, &[1.0, 2.0])),
            ("B", quote_frame(&b_days, &[3.0, 4.0, 5.0])),
        ]);
        let panel = builder(1).build(&series, Some(&macro_df)).unwrap();

        let a_rate = panel
            .lazy()
            .filter(col("ticker").eq(lit("A")))
            .collect()
            .unwrap();
        assert_eq!(a_rate.column("rate").unwrap().null_count(), 2);

        let b_rate = panel
            .lazy()
            .filter(col("ticker").eq(lit("B")))
            .collect()
            .unwrap();
        let rate = b_rate.column("rate").unwrap().f64().unwrap();
        // backward fill covers Jan 4, the observation lands on Jan 5,
        // forward fill carries it to Jan 6
        assert_eq!(rate.get(0), Some(2.5));
        assert_eq!(rate.get(1), Some(2.5));
        assert_eq!(rate.get(2), Some(2.5));
    }

    #[test]
    fn test_feature_columns_exclude_reserved() {
        let days = [day(2021, 1, 4), day(2021, 1, 5)];
        let mut df = quote_frame(&days, &[1.0, 2.0]);
        df.with_column(Series::new("ret_1d".into(), &[0.1, 0.2]))
            .unwrap();

        let panel = builder(1)
            .build(&series_map(vec![("A", df)]), None)
            .unwrap();
        let features = panel.feature_columns();
        assert_eq!(features, vec!["ret_1d".to_string()]);
    }

    #[test]
    fn test_from_frame_rejects_duplicates() {
        let df = df!(
            "ticker" => &["A", "A"],
            "date" => &[1i32, 1],
        )
        .unwrap()
        .lazy()
        .with_column(col("date").cast(DataType::Date))
        .collect()
        .unwrap();
        let err = Panel::from_frame(df);
        assert!(matches!(err, Err(PanelError::DuplicateKeys { count: 1 })));
    }
}
