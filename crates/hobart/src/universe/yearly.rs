//! Yearly universe files.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::universe::{Universe, UniverseError};

/// One row of a universe file. Files carry at least a `ticker` column;
/// anything else is ignored.
#[derive(Debug, Deserialize)]
struct UniverseRow {
    ticker: String,
}

/// Tickers allowed to compete in one evaluation year.
#[derive(Debug, Clone)]
pub struct YearUniverse {
    year: i32,
    symbols: BTreeSet<String>,
}

impl YearUniverse {
    /// File name a year's universe is stored under.
    pub fn file_name(year: i32) -> String {
        format!("{year}_final_universe.csv")
    }

    /// Load `{year}_final_universe.csv` from `dir`.
    pub fn load(dir: &Path, year: i32) -> Result<Self, UniverseError> {
        let file = File::open(dir.join(Self::file_name(year)))?;
        Self::from_reader(year, file)
    }

    /// Read a universe from any CSV source with a `ticker` column.
    pub fn from_reader<R: Read>(year: i32, reader: R) -> Result<Self, UniverseError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut symbols = BTreeSet::new();
        for row in csv_reader.deserialize() {
            let row: UniverseRow = row?;
            let ticker = row.ticker.trim();
            if !ticker.is_empty() {
                symbols.insert(ticker.to_string());
            }
        }
        if symbols.is_empty() {
            return Err(UniverseError::Empty { year });
        }
        Ok(Self { year, symbols })
    }

    /// Build a universe from an in-memory symbol list.
    pub fn from_symbols(year: i32, symbols: Vec<String>) -> Self {
        Self {
            year,
            symbols: symbols.into_iter().collect(),
        }
    }

    /// The year this universe applies to.
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Sorted, deduplicated union of symbols across universes.
    pub fn union(universes: &[Self]) -> Vec<String> {
        let mut all = BTreeSet::new();
        for universe in universes {
            all.extend(universe.symbols.iter().cloned());
        }
        all.into_iter().collect()
    }
}

impl Universe for YearUniverse {
    fn symbols(&self) -> Vec<String> {
        self.symbols.iter().cloned().collect()
    }

    fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    fn len(&self) -> usize {
        self.symbols.len()
    }
}
