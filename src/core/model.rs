//! # Data Model
//!
//! The record types shared across the analyzer, cache, and grouping stages:
//! `ImageRecord`, `ErrorRecord`, `CacheKey`, scan options, and the scan
//! result envelope. These are the nouns every other `core` submodule reads
//! or produces; kept in one place so the cache schema, the grouping stages,
//! and the orchestrator agree on a single shape.

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Small enumeration of the format families the quality scorer and cache
/// distinguish. Distinct from `scanner::ImageFormat`, which tracks the exact
/// extension; this is the coarser tag `FORMAT_QUALITY_POINTS` is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatTag {
    Raw,
    Png,
    Tiff,
    Jpeg,
    WebP,
    Heif,
    Gif,
    Bmp,
    Other,
}

impl FormatTag {
    /// Stable textual form used as the `format_tag` cache column.
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatTag::Raw => "RAW",
            FormatTag::Png => "PNG",
            FormatTag::Tiff => "TIFF",
            FormatTag::Jpeg => "JPEG",
            FormatTag::WebP => "WEBP",
            FormatTag::Heif => "HEIF",
            FormatTag::Gif => "GIF",
            FormatTag::Bmp => "BMP",
            FormatTag::Other => "OTHER",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "RAW" => FormatTag::Raw,
            "PNG" => FormatTag::Png,
            "TIFF" => FormatTag::Tiff,
            "JPEG" => FormatTag::Jpeg,
            "WEBP" => FormatTag::WebP,
            "HEIF" => FormatTag::Heif,
            "GIF" => FormatTag::Gif,
            "BMP" => FormatTag::Bmp,
            _ => FormatTag::Other,
        }
    }
}

/// One successfully analyzed file. Immutable once created; the cache may
/// overwrite the entry for a path but never mutates a record in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Whole seconds since the Unix epoch. See the mtime-unit decision in
    /// DESIGN.md: second precision is what the cache has always compared at.
    pub mtime_secs: i64,
    pub content_hash: [u8; 32],
    /// Absent when the file hashed successfully but the decoder could not
    /// decode it (see `analyzed_via_decode`).
    pub perceptual_hash: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bit_depth: u8,
    pub format_tag: FormatTag,
    /// Seconds since the Unix epoch at which analysis completed.
    pub analyzed_at: i64,
}

impl ImageRecord {
    /// Whether this record carries a perceptual hash usable for grouping.
    pub fn has_perceptual_hash(&self) -> bool {
        self.perceptual_hash.is_some()
    }

    pub fn pixel_count(&self) -> u64 {
        match (self.width, self.height) {
            (Some(w), Some(h)) => u64::from(w) * u64::from(h),
            _ => 0,
        }
    }
}

/// One file that failed analysis. Never enters a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub path: PathBuf,
    pub kind: ErrorKindTag,
    pub message: String,
}

/// Serializable mirror of `crate::error::ErrorKind`, restricted to the four
/// kinds the analyzer itself can report (`IO`, `DECODE`,
/// `FORMAT_UNSUPPORTED`, `HASH_UNSUPPORTED`); cache/argument/cancellation
/// errors surface through other channels, not as per-file `ErrorRecord`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKindTag {
    Io,
    Decode,
    FormatUnsupported,
    HashUnsupported,
}

impl From<ErrorKindTag> for ErrorKind {
    fn from(tag: ErrorKindTag) -> Self {
        match tag {
            ErrorKindTag::Io => ErrorKind::Io,
            ErrorKindTag::Decode => ErrorKind::Decode,
            ErrorKindTag::FormatUnsupported => ErrorKind::FormatUnsupported,
            ErrorKindTag::HashUnsupported => ErrorKind::HashUnsupported,
        }
    }
}

/// Cache identity predicate: `(path, mtime, size_bytes)`. Any change
/// invalidates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub path: PathBuf,
    pub mtime_secs: i64,
    pub size_bytes: u64,
}

/// Which grouping stages a scan runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupingMode {
    ExactOnly,
    PerceptualOnly,
    Both,
}

impl Default for GroupingMode {
    fn default() -> Self {
        GroupingMode::Both
    }
}

/// Candidate-enumeration strategy for the perceptual grouper (C8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LshMode {
    Auto,
    ForceOn,
    ForceOff,
}

impl Default for LshMode {
    fn default() -> Self {
        LshMode::Auto
    }
}

/// Collection size at or above which `LshMode::Auto` switches the
/// perceptual grouper onto the LSH candidate path instead of brute force.
pub const AUTO_LSH_THRESHOLD: usize = 5000;

/// Options accepted by `scan`. Plain data; this is the entire configuration
/// surface the core exposes (no config files, no environment variables;
/// those belong to external collaborators).
#[derive(Clone)]
pub struct ScanOptions {
    pub recursive: bool,
    /// Perceptual distance cutoff, 0..=64.
    pub threshold: u32,
    pub mode: GroupingMode,
    pub lsh_mode: LshMode,
    pub use_cache: bool,
    /// Driver parallelism, must be >= 1.
    pub workers: usize,
    pub progress_cb: Option<std::sync::Arc<dyn Fn(DriverProgress) + Send + Sync>>,
    pub cancel_token: Option<std::sync::Arc<std::sync::atomic::AtomicBool>>,
}

impl std::fmt::Debug for ScanOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOptions")
            .field("recursive", &self.recursive)
            .field("threshold", &self.threshold)
            .field("mode", &self.mode)
            .field("lsh_mode", &self.lsh_mode)
            .field("use_cache", &self.use_cache)
            .field("workers", &self.workers)
            .field("progress_cb", &self.progress_cb.is_some())
            .field("cancel_token", &self.cancel_token.is_some())
            .finish()
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            threshold: 8,
            mode: GroupingMode::Both,
            lsh_mode: LshMode::Auto,
            use_cache: true,
            workers: 4,
            progress_cb: None,
            cancel_token: None,
        }
    }
}

/// Progress snapshot delivered by the parallel driver (C4), at most once per
/// 500ms plus a final call at completion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DriverProgress {
    pub found: usize,
    pub analyzed: usize,
    pub cache_hits: usize,
    pub errors: usize,
    /// Records analyzed per second, EMA-smoothed over recent batches.
    pub rate_per_sec: f64,
    /// Estimated seconds remaining, or `None` if the rate is not yet known.
    pub eta_secs: Option<f64>,
}

/// Kind of `DuplicateGroup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupKind {
    Exact,
    Perceptual,
}

/// A group of two or more records the grouping stages consider duplicates
/// (`Exact`) or visually similar (`Perceptual`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub id: u64,
    pub kind: GroupKind,
    /// Sorted by quality descending (§4.5); the head is the best member.
    pub members: Vec<ImageRecord>,
    pub potential_savings_bytes: u64,
}

impl DuplicateGroup {
    pub fn best(&self) -> &ImageRecord {
        &self.members[0]
    }
}

/// Output of `scan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub records: Vec<ImageRecord>,
    pub errors: Vec<ErrorRecord>,
    pub groups: Vec<DuplicateGroup>,
    pub cache_hits: usize,
    pub cache_degraded: bool,
    /// True if the scan was cancelled before completing; `records`/`errors`
    /// reflect whatever was analyzed so far, and grouping may have been
    /// skipped entirely.
    pub partial: bool,
    pub mode_used: GroupingMode,
    pub lsh_mode_used: LshMode,
}

/// Current time as whole seconds since the Unix epoch, matching the
/// `mtime_secs` unit used throughout this module.
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Convert a `SystemTime` (as returned by `Metadata::modified()`) into the
/// same whole-seconds unit.
pub fn system_time_to_secs(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(path: &str) -> ImageRecord {
        ImageRecord {
            path: PathBuf::from(path),
            size_bytes: 1000,
            mtime_secs: 0,
            content_hash: [0u8; 32],
            perceptual_hash: Some(0),
            width: Some(100),
            height: Some(100),
            bit_depth: 8,
            format_tag: FormatTag::Jpeg,
            analyzed_at: 0,
        }
    }

    #[test]
    fn pixel_count_multiplies_dimensions() {
        let record = sample_record("/a.jpg");
        assert_eq!(record.pixel_count(), 10_000);
    }

    #[test]
    fn pixel_count_is_zero_without_dimensions() {
        let mut record = sample_record("/a.jpg");
        record.width = None;
        assert_eq!(record.pixel_count(), 0);
    }

    #[test]
    fn has_perceptual_hash_reflects_option() {
        let mut record = sample_record("/a.jpg");
        assert!(record.has_perceptual_hash());
        record.perceptual_hash = None;
        assert!(!record.has_perceptual_hash());
    }

    #[test]
    fn format_tag_round_trips_through_str() {
        for tag in [
            FormatTag::Raw,
            FormatTag::Png,
            FormatTag::Tiff,
            FormatTag::Jpeg,
            FormatTag::WebP,
            FormatTag::Heif,
            FormatTag::Gif,
            FormatTag::Bmp,
            FormatTag::Other,
        ] {
            assert_eq!(FormatTag::from_str(tag.as_str()), tag);
        }
    }

    #[test]
    fn system_time_to_secs_is_zero_at_epoch() {
        assert_eq!(system_time_to_secs(UNIX_EPOCH), 0);
    }
}
