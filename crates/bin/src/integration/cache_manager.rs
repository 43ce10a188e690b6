//! Cache manager for computed features.
//!
//! Opens the SQLite feature store at a platform-specific default location,
//! or at an explicit path.

use std::path::{Path, PathBuf};
use strata_store::{SqliteStore, StoreError};

/// Get the default cache directory path.
///
/// Uses platform-specific cache directories:
/// - Linux: `~/.cache/strata/`
/// - macOS: `~/Library/Caches/strata/`
/// - Windows: `%LOCALAPPDATA%\strata\cache\`
pub(crate) fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("strata")
}

/// Get the default cache database path.
pub(crate) fn default_cache_path() -> PathBuf {
    default_cache_dir().join("features.db")
}

/// Resolve the cache path, preferring an explicit one.
pub(crate) fn cache_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(default_cache_path, Path::to_path_buf)
}

/// Open the store, creating the directory if needed.
pub(crate) fn open_store(path: &Path) -> Result<SqliteStore, StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| StoreError::CacheUnavailable(format!("{}: {e}", parent.display())))?;
    }
    SqliteStore::new(path)
}

/// Size of the database file in bytes, if it exists.
pub(crate) fn cache_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}
