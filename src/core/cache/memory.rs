//! In-memory analysis cache backend, for tests.

use super::traits::{AnalysisCache, CacheLookup};
use super::CacheStats;
use crate::core::model::ImageRecord;
use crate::error::CacheError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

struct Entry {
    record: ImageRecord,
    last_access_secs: i64,
}

/// In-memory cache backend. Useful for tests and scenarios where
/// persistence isn't needed.
pub struct InMemoryCache {
    entries: RwLock<HashMap<PathBuf, Entry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisCache for InMemoryCache {
    fn lookup(
        &self,
        path: &Path,
        size_bytes: u64,
        mtime_secs: i64,
    ) -> Result<Option<ImageRecord>, CacheError> {
        let now = crate::core::model::now_secs();
        let mut entries = self.entries.write().map_err(|_| CacheError::Corrupted {
            path: PathBuf::from("memory"),
        })?;
        if let Some(entry) = entries.get_mut(path) {
            if entry.record.size_bytes == size_bytes && entry.record.mtime_secs == mtime_secs {
                entry.last_access_secs = now;
                return Ok(Some(entry.record.clone()));
            }
        }
        Ok(None)
    }

    fn store(&self, record: &ImageRecord) -> Result<(), CacheError> {
        let now = crate::core::model::now_secs();
        let mut entries = self.entries.write().map_err(|_| CacheError::Corrupted {
            path: PathBuf::from("memory"),
        })?;
        entries.insert(
            record.path.clone(),
            Entry {
                record: record.clone(),
                last_access_secs: now,
            },
        );
        Ok(())
    }

    fn get_or_compute<F>(
        &self,
        path: &Path,
        size_bytes: u64,
        mtime_secs: i64,
        compute_fn: F,
    ) -> Result<CacheLookup, CacheError>
    where
        F: FnOnce() -> ImageRecord,
    {
        let now = crate::core::model::now_secs();
        {
            let mut entries = self.entries.write().map_err(|_| CacheError::Corrupted {
                path: PathBuf::from("memory"),
            })?;
            if let Some(entry) = entries.get_mut(path) {
                if entry.record.size_bytes == size_bytes && entry.record.mtime_secs == mtime_secs {
                    entry.last_access_secs = now;
                    return Ok(CacheLookup::Hit(entry.record.clone()));
                }
            }
        }

        let fresh = compute_fn();
        let mut entries = self.entries.write().map_err(|_| CacheError::Corrupted {
            path: PathBuf::from("memory"),
        })?;
        entries.insert(
            path.to_path_buf(),
            Entry {
                record: fresh.clone(),
                last_access_secs: now,
            },
        );
        Ok(CacheLookup::Miss(fresh))
    }

    fn remove(&self, path: &Path) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Corrupted {
            path: PathBuf::from("memory"),
        })?;
        entries.remove(path);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Corrupted {
            path: PathBuf::from("memory"),
        })?;
        entries.clear();
        Ok(())
    }

    fn stats(&self) -> Result<CacheStats, CacheError> {
        let entries = self.entries.read().map_err(|_| CacheError::Corrupted {
            path: PathBuf::from("memory"),
        })?;
        Ok(CacheStats {
            total_entries: entries.len(),
            bytes_on_disk: 0,
            path: PathBuf::from(":memory:"),
        })
    }

    fn cleanup_missing(&self) -> Result<usize, CacheError> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Corrupted {
            path: PathBuf::from("memory"),
        })?;
        let before = entries.len();
        entries.retain(|path, _| path.exists());
        Ok(before - entries.len())
    }

    fn cleanup_stale(&self, max_age_days: u32) -> Result<usize, CacheError> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Corrupted {
            path: PathBuf::from("memory"),
        })?;
        let cutoff = crate::core::model::now_secs() - i64::from(max_age_days) * 86_400;
        let before = entries.len();
        entries.retain(|_, entry| entry.last_access_secs >= cutoff);
        Ok(before - entries.len())
    }
}
