//! # Analysis cache (C3)
//!
//! Persists `ImageRecord`s keyed on file identity `(path, mtime, size)` so
//! repeat scans skip re-decoding and re-hashing files that haven't changed.
//!
//! ## Backends
//! - `SqliteCache`, persistent storage backed by `rusqlite` (production).
//! - `InMemoryCache`, for tests and scenarios where persistence isn't
//!   needed.
//!
//! Correctness of a scan never depends on the cache: any storage-layer
//! failure degrades to a bypass (the analyzer result is still returned, just
//! not persisted) rather than failing the call. See `get_or_compute` on
//! `SqliteCache` for where that degradation is applied.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryCache;
pub use sqlite::SqliteCache;
pub use traits::{AnalysisCache, CacheLookup};

use serde::{Deserialize, Serialize};

/// Cache statistics, per §6's `stats()` contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub bytes_on_disk: u64,
    pub path: std::path::PathBuf,
}

/// Default cache location: `<home>/.duplicate_finder_cache.db`, resolved
/// via the `dirs` crate rather than a hand-rolled `$HOME` lookup.
pub fn default_cache_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".duplicate_finder_cache.db")
}
