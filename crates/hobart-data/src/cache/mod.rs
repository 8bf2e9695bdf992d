//! Local caching for fetched market data.

pub mod sqlite;

pub use sqlite::QuoteCache;
