//! Cache manager for market data.
//!
//! Opens the SQLite quote cache at a platform-specific default
//! location so repeated runs skip the network.

use hobart_data::cache::QuoteCache;
use hobart_data::error::DataError;
use std::path::PathBuf;

/// Get the default cache directory path.
///
/// Uses platform-specific cache directories:
/// - Linux: `~/.cache/hobart/`
/// - macOS: `~/Library/Caches/hobart/`
/// - Windows: `%LOCALAPPDATA%\hobart\cache\`
pub(crate) fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hobart")
}

/// Get the default cache database path.
pub(crate) fn cache_path() -> PathBuf {
    default_cache_dir().join("hobart.db")
}

/// Open the cache, creating the directory if needed.
pub(crate) fn open_cache() -> Result<QuoteCache, DataError> {
    let path = cache_path();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    QuoteCache::new(&path)
}
