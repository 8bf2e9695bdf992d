//! Error types for panel operations.

use thiserror::Error;

/// Result type for panel operations.
pub type Result<T> = std::result::Result<T, PanelError>;

/// Errors that can occur while building or transforming the panel.
#[derive(Debug, Error)]
pub enum PanelError {
    /// Required columns are absent from an input series or the panel.
    #[error("Missing required column(s) {columns:?} for {context}")]
    MissingColumns {
        /// What was being validated (a ticker series, the macro frame, the panel).
        context: String,
        /// The absent column names.
        columns: Vec<String>,
    },

    /// No per-ticker series survived validation.
    #[error("Empty panel build: {reason}")]
    EmptyBuild {
        /// Why nothing was left to assemble.
        reason: String,
    },

    /// The unique (ticker, date) key invariant is violated.
    #[error("Panel contains {count} duplicate (ticker, date) key(s)")]
    DuplicateKeys {
        /// Number of surplus rows sharing an existing key.
        count: usize,
    },

    /// A ticker series has too few rows to participate.
    #[error("Series for {ticker} has {rows} row(s), {required} required")]
    InsufficientRows {
        /// Symbol whose series was rejected.
        ticker: String,
        /// Rows the series actually has.
        rows: usize,
        /// Minimum rows demanded by the builder configuration.
        required: usize,
    },

    /// A ticker series carries a different column set than the rest.
    #[error("Series for {ticker} does not match the panel column set")]
    ColumnSetMismatch {
        /// Symbol whose series was rejected.
        ticker: String,
    },

    /// The date column is neither a date nor a datetime.
    #[error("Date column for {context} has type {dtype}, expected Date or Datetime")]
    InvalidDateType {
        /// What was being validated.
        context: String,
        /// The offending data type.
        dtype: String,
    },

    /// A column referenced by name does not exist in the panel.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// A column has a non-numeric type where a numeric one is required.
    #[error("Column {column} has non-numeric type {dtype}")]
    InvalidColumnType {
        /// The offending column.
        column: String,
        /// Its data type.
        dtype: String,
    },

    /// The forward-return horizon must be at least one step.
    #[error("Invalid horizon {0}, must be >= 1")]
    InvalidHorizon(usize),

    /// The cross-sectional sigma floor must be strictly positive.
    #[error("Invalid sigma floor {0}, must be > 0")]
    InvalidSigmaFloor(f64),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}
