//! Universe management for the Hobart pipeline.
//!
//! A universe pins which tickers compete in an evaluation year. Each
//! year ships as a `{year}_final_universe.csv` file; the union across
//! years drives data fetching.

use thiserror::Error;

pub mod yearly;

pub use yearly::YearUniverse;

/// Errors that can occur while loading universe files.
#[derive(Debug, Error)]
pub enum UniverseError {
    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file parsed but carried no tickers.
    #[error("Universe file for {year} has no tickers")]
    Empty {
        /// Year whose file was empty.
        year: i32,
    },
}

/// Trait for stock universes.
pub trait Universe {
    /// Get all symbols in the universe, ascending.
    fn symbols(&self) -> Vec<String>;

    /// Check if a symbol is in the universe.
    fn contains(&self, symbol: &str) -> bool {
        self.symbols().iter().any(|s| s == symbol)
    }

    /// Get the number of constituents.
    fn len(&self) -> usize {
        self.symbols().len()
    }

    /// Whether the universe has no constituents.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_universe_trait_defaults() {
        let universe = YearUniverse::from_symbols(
            2022,
            vec!["MSFT".to_string(), "AAPL".to_string()],
        );

        assert!(universe.contains("AAPL"));
        assert!(!universe.contains("NOTREAL"));
        assert_eq!(universe.len(), 2);
        assert!(!universe.is_empty());
    }
}
