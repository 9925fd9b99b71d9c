//! SQLite cache backend for persistent storage (C3).

use super::traits::{AnalysisCache, CacheLookup};
use super::CacheStats;
use crate::core::model::{now_secs, FormatTag, ImageRecord};
use crate::error::CacheError;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Schema version for the `image_cache` table. Bumping this drops and
/// rebuilds the table rather than migrating it, matching the existing
/// codebase's posture for its own bookkeeping tables.
const SCHEMA_VERSION: i64 = 1;

/// SQLite-backed persistent cache.
///
/// Uses WAL (Write-Ahead Logging) mode for better concurrent access. WAL
/// allows readers to proceed even while writes are happening.
pub struct SqliteCache {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteCache {
    /// Open or create a cache database at the given path, creating the
    /// schema (or rebuilding it on a version mismatch) as needed.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| CacheError::OpenFailed {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|e| CacheError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        Self::ensure_schema(&conn, path)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    fn ensure_schema(conn: &Connection, path: &Path) -> Result<(), CacheError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value INTEGER NOT NULL)",
            [],
        )
        .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        let stored_version: Option<i64> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        if stored_version != Some(SCHEMA_VERSION) {
            conn.execute("DROP TABLE IF EXISTS image_cache", [])
                .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
            conn.execute(
                "CREATE TABLE image_cache (
                    path TEXT PRIMARY KEY,
                    size_bytes INTEGER NOT NULL,
                    mtime INTEGER NOT NULL,
                    content_hash BLOB NOT NULL,
                    phash BLOB,
                    width INTEGER,
                    height INTEGER,
                    bit_depth INTEGER NOT NULL,
                    format_tag TEXT NOT NULL,
                    analyzed_at INTEGER NOT NULL,
                    last_access_at INTEGER NOT NULL
                )",
                [],
            )
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
            conn.execute(
                "CREATE INDEX idx_image_cache_last_access ON image_cache(last_access_at)",
                [],
            )
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
            conn.execute(
                "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?)",
                params![SCHEMA_VERSION],
            )
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
        }

        let _ = path;
        Ok(())
    }

    fn row_to_record(
        path: PathBuf,
        size_bytes: i64,
        mtime: i64,
        content_hash: Vec<u8>,
        phash: Option<Vec<u8>>,
        width: Option<i64>,
        height: Option<i64>,
        bit_depth: i64,
        format_tag: String,
        analyzed_at: i64,
    ) -> Option<ImageRecord> {
        if content_hash.len() != 32 {
            return None;
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&content_hash);

        let perceptual_hash = match phash {
            Some(bytes) if bytes.len() == 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes);
                Some(u64::from_be_bytes(buf))
            }
            _ => None,
        };

        Some(ImageRecord {
            path,
            size_bytes: size_bytes as u64,
            mtime_secs: mtime,
            content_hash: hash,
            perceptual_hash,
            width: width.map(|w| w as u32),
            height: height.map(|h| h as u32),
            bit_depth: bit_depth as u8,
            format_tag: FormatTag::from_str(&format_tag),
            analyzed_at,
        })
    }

    fn upsert(conn: &Connection, record: &ImageRecord, now: i64) -> Result<(), CacheError> {
        let path_str = record.path.to_string_lossy();
        let phash_bytes = record.perceptual_hash.map(|h| h.to_be_bytes().to_vec());
        conn.execute(
            "INSERT OR REPLACE INTO image_cache
             (path, size_bytes, mtime, content_hash, phash, width, height, bit_depth, format_tag, analyzed_at, last_access_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                path_str,
                record.size_bytes as i64,
                record.mtime_secs,
                record.content_hash.to_vec(),
                phash_bytes,
                record.width.map(|w| w as i64),
                record.height.map(|h| h as i64),
                record.bit_depth as i64,
                record.format_tag.as_str(),
                record.analyzed_at,
                now,
            ],
        )
        .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
        Ok(())
    }
}

impl AnalysisCache for SqliteCache {
    fn lookup(
        &self,
        path: &Path,
        size_bytes: u64,
        mtime_secs: i64,
    ) -> Result<Option<ImageRecord>, CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Corrupted {
            path: self.db_path.clone(),
        })?;
        let path_str = path.to_string_lossy();

        let existing = conn
            .query_row(
                "SELECT size_bytes, mtime, content_hash, phash, width, height, bit_depth, format_tag, analyzed_at
                 FROM image_cache WHERE path = ?",
                [&path_str],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                        row.get::<_, Option<Vec<u8>>>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                        row.get::<_, Option<i64>>(5)?,
                        row.get::<_, i64>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, i64>(8)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        let Some((db_size, db_mtime, content_hash, phash, width, height, bit_depth, format_tag, analyzed_at)) =
            existing
        else {
            return Ok(None);
        };

        if db_size != size_bytes as i64 || db_mtime != mtime_secs {
            return Ok(None);
        }

        let record = Self::row_to_record(
            path.to_path_buf(),
            db_size,
            db_mtime,
            content_hash,
            phash,
            width,
            height,
            bit_depth,
            format_tag,
            analyzed_at,
        );
        if record.is_some() {
            conn.execute(
                "UPDATE image_cache SET last_access_at = ? WHERE path = ?",
                params![now_secs(), path_str],
            )
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
        }
        Ok(record)
    }

    fn store(&self, record: &ImageRecord) -> Result<(), CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Corrupted {
            path: self.db_path.clone(),
        })?;
        Self::upsert(&conn, record, now_secs())
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
        let conn = self.conn.lock().map_err(|_| CacheError::Corrupted {
            path: self.db_path.clone(),
        })?;

        let path_str = path.to_string_lossy();
        let now = now_secs();

        let existing = conn
            .query_row(
                "SELECT size_bytes, mtime, content_hash, phash, width, height, bit_depth, format_tag, analyzed_at
                 FROM image_cache WHERE path = ?",
                [&path_str],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                        row.get::<_, Option<Vec<u8>>>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                        row.get::<_, Option<i64>>(5)?,
                        row.get::<_, i64>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, i64>(8)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        if let Some((db_size, db_mtime, content_hash, phash, width, height, bit_depth, format_tag, analyzed_at)) =
            existing
        {
            if db_size == size_bytes as i64 && db_mtime == mtime_secs {
                if let Some(record) = Self::row_to_record(
                    path.to_path_buf(),
                    db_size,
                    db_mtime,
                    content_hash,
                    phash,
                    width,
                    height,
                    bit_depth,
                    format_tag,
                    analyzed_at,
                ) {
                    conn.execute(
                        "UPDATE image_cache SET last_access_at = ? WHERE path = ?",
                        params![now, path_str],
                    )
                    .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
                    return Ok(CacheLookup::Hit(record));
                }
            }
        }

        drop(conn);
        let fresh = compute_fn();
        let conn = self.conn.lock().map_err(|_| CacheError::Corrupted {
            path: self.db_path.clone(),
        })?;
        Self::upsert(&conn, &fresh, now)?;
        Ok(CacheLookup::Miss(fresh))
    }

    fn remove(&self, path: &Path) -> Result<(), CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Corrupted {
            path: self.db_path.clone(),
        })?;
        let path_str = path.to_string_lossy();
        conn.execute("DELETE FROM image_cache WHERE path = ?", [&path_str])
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Corrupted {
            path: self.db_path.clone(),
        })?;
        conn.execute("DELETE FROM image_cache", [])
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    fn stats(&self) -> Result<CacheStats, CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Corrupted {
            path: self.db_path.clone(),
        })?;

        let total_entries: usize = conn
            .query_row("SELECT COUNT(*) FROM image_cache", [], |row| {
                row.get::<_, i64>(0).map(|v| v as usize)
            })
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        let bytes_on_disk = std::fs::metadata(&self.db_path).map(|m| m.len()).unwrap_or(0);

        Ok(CacheStats {
            total_entries,
            bytes_on_disk,
            path: self.db_path.clone(),
        })
    }

    fn cleanup_missing(&self) -> Result<usize, CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Corrupted {
            path: self.db_path.clone(),
        })?;

        let mut stmt = conn
            .prepare("SELECT path FROM image_cache")
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
        let paths: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        drop(stmt);

        let mut removed = 0;
        for path in paths {
            if !Path::new(&path).exists() {
                conn.execute("DELETE FROM image_cache WHERE path = ?", [&path])
                    .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn cleanup_stale(&self, max_age_days: u32) -> Result<usize, CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Corrupted {
            path: self.db_path.clone(),
        })?;

        let cutoff = now_secs() - i64::from(max_age_days) * 86_400;
        let removed = conn
            .execute(
                "DELETE FROM image_cache WHERE last_access_at < ?",
                params![cutoff],
            )
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        conn.execute_batch("VACUUM;")
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::FormatTag;
    use tempfile::TempDir;

    fn record(path: &str) -> ImageRecord {
        ImageRecord {
            path: PathBuf::from(path),
            size_bytes: 1000,
            mtime_secs: 100,
            content_hash: [7u8; 32],
            perceptual_hash: Some(0xDEAD_BEEF),
            width: Some(640),
            height: Some(480),
            bit_depth: 8,
            format_tag: FormatTag::Jpeg,
            analyzed_at: 100,
        }
    }

    #[test]
    fn creates_database_with_empty_stats() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("cache.db");

        let cache = SqliteCache::open(&db_path).unwrap();
        assert!(db_path.exists());

        let stats = cache.stats().unwrap();
        assert_eq!(stats.total_entries, 0);
    }

    #[test]
    fn miss_computes_and_caches() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("cache.db");
        let cache = SqliteCache::open(&db_path).unwrap();

        let rec = record("/a.jpg");
        let result = cache
            .get_or_compute(Path::new("/a.jpg"), 1000, 100, || rec.clone())
            .unwrap();
        assert!(!result.is_hit());
        assert_eq!(result.into_record().content_hash, rec.content_hash);
        assert_eq!(cache.stats().unwrap().total_entries, 1);
    }

    #[test]
    fn hit_skips_compute_fn() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("cache.db");
        let cache = SqliteCache::open(&db_path).unwrap();

        let rec = record("/a.jpg");
        cache
            .get_or_compute(Path::new("/a.jpg"), 1000, 100, || rec.clone())
            .unwrap();

        let result = cache
            .get_or_compute(Path::new("/a.jpg"), 1000, 100, || {
                panic!("compute_fn must not run on a cache hit")
            })
            .unwrap();
        assert!(result.is_hit());
        assert_eq!(result.into_record().perceptual_hash, rec.perceptual_hash);
    }

    #[test]
    fn identity_change_invalidates_and_recomputes() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("cache.db");
        let cache = SqliteCache::open(&db_path).unwrap();

        cache
            .get_or_compute(Path::new("/a.jpg"), 1000, 100, || record("/a.jpg"))
            .unwrap();

        let updated = ImageRecord {
            size_bytes: 2000,
            ..record("/a.jpg")
        };
        let result = cache
            .get_or_compute(Path::new("/a.jpg"), 2000, 200, || updated.clone())
            .unwrap();
        assert!(!result.is_hit());
        assert_eq!(result.into_record().size_bytes, 2000);
    }

    #[test]
    fn clear_removes_all_entries() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("cache.db");
        let cache = SqliteCache::open(&db_path).unwrap();

        cache
            .get_or_compute(Path::new("/a.jpg"), 1000, 100, || record("/a.jpg"))
            .unwrap();
        cache.clear().unwrap();
        assert_eq!(cache.stats().unwrap().total_entries, 0);
    }

    #[test]
    fn cleanup_missing_removes_nonexistent_paths() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("cache.db");
        let cache = SqliteCache::open(&db_path).unwrap();

        cache
            .get_or_compute(Path::new("/nonexistent/gone.jpg"), 1000, 100, || {
                record("/nonexistent/gone.jpg")
            })
            .unwrap();

        let removed = cache.cleanup_missing().unwrap();
        assert_eq!(removed, 1);
        assert_eq!(cache.stats().unwrap().total_entries, 0);
    }

    #[test]
    fn cleanup_stale_removes_old_entries() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("cache.db");
        let cache = SqliteCache::open(&db_path).unwrap();

        cache
            .get_or_compute(Path::new("/a.jpg"), 1000, 100, || record("/a.jpg"))
            .unwrap();

        // last_access_at was just stamped with now(), so a 0-day cutoff
        // (anything older than "right now") should not remove it...
        let removed = cache.cleanup_stale(36_500).unwrap();
        assert_eq!(removed, 0);

        // ...but force the stored timestamp into the past and it's stale.
        {
            let conn = cache.conn.lock().unwrap();
            conn.execute("UPDATE image_cache SET last_access_at = 0", [])
                .unwrap();
        }
        let removed = cache.cleanup_stale(1).unwrap();
        assert_eq!(removed, 1);
    }

    #[test]
    fn reopening_preserves_entries_across_connections() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("cache.db");

        {
            let cache = SqliteCache::open(&db_path).unwrap();
            cache
                .get_or_compute(Path::new("/a.jpg"), 1000, 100, || record("/a.jpg"))
                .unwrap();
        }

        let cache = SqliteCache::open(&db_path).unwrap();
        assert_eq!(cache.stats().unwrap().total_entries, 1);
    }
}
