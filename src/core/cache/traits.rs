//! Analysis cache backend trait definition (C3).

use super::CacheStats;
use crate::core::model::ImageRecord;
use crate::error::CacheError;
use std::path::Path;

/// What a cache lookup produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// Returned from storage without recomputation.
    Hit(ImageRecord),
    /// Storage had nothing valid for this identity; `compute_fn` ran and
    /// its result was written back under the new identity.
    Miss(ImageRecord),
}

impl CacheLookup {
    pub fn into_record(self) -> ImageRecord {
        match self {
            CacheLookup::Hit(r) | CacheLookup::Miss(r) => r,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }
}

/// Trait for analysis-cache backends.
///
/// `get_or_compute` is generic rather than trait-object-friendly: callers
/// always know the concrete backend (`SqliteCache` in production,
/// `InMemoryCache` in tests), so there's no need to pay for `dyn`
/// indirection on the hot per-file path.
pub trait AnalysisCache {
    /// Look up `path` by `(path, size, mtime)` identity. On a hit, updates
    /// `last_access_at` and returns the stored record without calling
    /// `compute_fn`. On a miss (absent or identity mismatch), calls
    /// `compute_fn`, stores its result keyed on the new identity, and
    /// returns it.
    ///
    /// `Self: Sized` keeps this method out of the vtable so the rest of the
    /// trait (everything the driver needs) stays object-safe; callers that
    /// want this all-in-one form need the concrete backend type.
    fn get_or_compute<F>(
        &self,
        path: &Path,
        size_bytes: u64,
        mtime_secs: i64,
        compute_fn: F,
    ) -> Result<CacheLookup, CacheError>
    where
        F: FnOnce() -> ImageRecord,
        Self: Sized;

    /// Look up `path` by identity without computing on a miss. The parallel
    /// driver (C4) uses this ahead of analysis so a hit skips decode and
    /// hashing entirely, rather than running them and discarding the result.
    fn lookup(
        &self,
        path: &Path,
        size_bytes: u64,
        mtime_secs: i64,
    ) -> Result<Option<ImageRecord>, CacheError>;

    /// Store (or overwrite) a record under its own identity.
    fn store(&self, record: &ImageRecord) -> Result<(), CacheError>;

    /// Remove a specific entry.
    fn remove(&self, path: &Path) -> Result<(), CacheError>;

    /// Drop all cached entries.
    fn clear(&self) -> Result<(), CacheError>;

    /// Cache statistics.
    fn stats(&self) -> Result<CacheStats, CacheError>;

    /// Remove entries whose path no longer exists on disk. Returns the
    /// count removed.
    fn cleanup_missing(&self) -> Result<usize, CacheError>;

    /// Remove entries whose `last_access_at` is older than `max_age_days`.
    /// Returns the count removed. Compacts storage afterward.
    fn cleanup_stale(&self, max_age_days: u32) -> Result<usize, CacheError>;
}
