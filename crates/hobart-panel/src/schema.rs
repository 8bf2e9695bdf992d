//! Column names shared by every stage of the pipeline.
//!
//! The panel contract is a fixed vocabulary: key columns, raw market data,
//! corporate actions, and the forward-target pair. Everything else in the
//! panel is a feature column.

/// Ticker symbol key column.
pub const TICKER: &str = "ticker";
/// Calendar-date key column.
pub const DATE: &str = "date";
/// Opening price.
pub const OPEN: &str = "open";
/// High price.
pub const HIGH: &str = "high";
/// Low price.
pub const LOW: &str = "low";
/// Closing price.
pub const CLOSE: &str = "close";
/// Traded volume.
pub const VOLUME: &str = "volume";
/// Dividend amount paid on the row's date (0 when none).
pub const DIVIDEND: &str = "dividend";
/// Split ratio effective on the row's date (0 when none).
pub const SPLIT_RATIO: &str = "split_ratio";
/// Forward return over the configured horizon.
pub const TARGET_RETURN: &str = "target_return";
/// Date of the row the forward return points at.
pub const TARGET_DATE: &str = "target_date";

/// Columns every per-ticker input series must supply.
pub const REQUIRED_OHLCV: [&str; 6] = [DATE, OPEN, HIGH, LOW, CLOSE, VOLUME];

/// Columns that identify a panel row.
pub const KEY_COLUMNS: [&str; 2] = [TICKER, DATE];

/// Columns the leakage shift must never touch.
pub const TARGET_COLUMNS: [&str; 2] = [TARGET_RETURN, TARGET_DATE];

/// Non-feature columns: keys, raw market data, actions, and targets.
pub const RESERVED_COLUMNS: [&str; 11] = [
    TICKER,
    DATE,
    OPEN,
    HIGH,
    LOW,
    CLOSE,
    VOLUME,
    DIVIDEND,
    SPLIT_RATIO,
    TARGET_RETURN,
    TARGET_DATE,
];

/// Suffix of cross-sectional z-score columns.
pub const ZSCORE_SUFFIX: &str = "_zs";
/// Suffix of cross-sectional rank columns.
pub const RANK_SUFFIX: &str = "_rank";

/// Name of the z-score column derived from `column`.
pub fn zscore_column(column: &str) -> String {
    format!("{column}{ZSCORE_SUFFIX}")
}

/// Name of the rank column derived from `column`.
pub fn rank_column(column: &str) -> String {
    format!("{column}{RANK_SUFFIX}")
}

/// Whether `name` is one of the panel's reserved (non-feature) columns.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_COLUMNS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_column_names() {
        assert_eq!(zscore_column("ret_20d"), "ret_20d_zs");
        assert_eq!(rank_column("ret_20d"), "ret_20d_rank");
    }

    #[test]
    fn test_reserved_covers_keys_and_targets() {
        for name in KEY_COLUMNS.iter().chain(TARGET_COLUMNS.iter()) {
            assert!(is_reserved(name));
        }
        assert!(!is_reserved("rsi_14"));
    }
}
