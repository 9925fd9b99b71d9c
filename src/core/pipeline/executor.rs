//! Parallel driver (C4) and scan orchestrator (C9).

use crate::core::cache::{default_cache_path, AnalysisCache, CacheStats, SqliteCache};
use crate::core::comparator::{group_exact, group_perceptual, CandidateStrategy};
use crate::core::hasher::{analyze, AnalysisOutcome};
use crate::core::model::{
    system_time_to_secs, DriverProgress, DuplicateGroup, ErrorKindTag, ErrorRecord, GroupingMode,
    ImageRecord, LshMode, ScanOptions, ScanResult,
};
use crate::core::scanner::{PhotoFile, PhotoScanner, ScanConfig, WalkDirScanner};
use crate::error::{CacheError, DuplicateFinderError, ScanError};
use crossbeam_channel::{Receiver, Sender};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Single public entry point: discover, analyze, and group everything under
/// `root` according to `options`. Validates up front (`BAD_ARGUMENT`) before
/// any C1 work starts; a cancelled scan still returns whatever was analyzed,
/// with `partial: true`.
pub fn scan(root: &Path, options: &ScanOptions) -> Result<ScanResult, DuplicateFinderError> {
    validate_options(root, options)?;

    let scanner = WalkDirScanner::new(ScanConfig::with_recursive(options.recursive));
    let discovery = scanner
        .scan(&[root.to_path_buf()])
        .map_err(DuplicateFinderError::Scan)?;

    let mut errors: Vec<ErrorRecord> = discovery.errors.iter().map(scan_error_to_record).collect();

    let cache_degraded = Arc::new(AtomicBool::new(false));
    let warned = Arc::new(AtomicBool::new(false));
    let cache: Option<Arc<dyn AnalysisCache + Send + Sync>> = if options.use_cache {
        match SqliteCache::open(&default_cache_path()) {
            Ok(backend) => Some(Arc::new(backend)),
            Err(e) => {
                tracing::warn!("cache unavailable, scanning uncached: {e}");
                cache_degraded.store(true, Ordering::Relaxed);
                None
            }
        }
    } else {
        None
    };
    let cache_guard = CacheGuard {
        cache,
        degraded: cache_degraded.clone(),
        warned,
    };

    let driver_result = run_driver(discovery.photos, options, cache_guard);

    let cancelled = driver_result.cancelled;
    let mut records = driver_result.records;
    errors.extend(driver_result.errors);

    let (groups, lsh_mode_used) = grouping_outcome(cancelled, &mut records, options);

    Ok(ScanResult {
        records,
        errors,
        groups,
        cache_hits: driver_result.cache_hits,
        cache_degraded: cache_degraded.load(Ordering::Relaxed),
        partial: cancelled,
        mode_used: options.mode,
        lsh_mode_used,
    })
}

fn validate_options(root: &Path, options: &ScanOptions) -> Result<(), DuplicateFinderError> {
    if !root.is_absolute() {
        return Err(DuplicateFinderError::BadArgument(format!(
            "root must be an absolute path: {}",
            root.display()
        )));
    }
    if !root.exists() {
        return Err(DuplicateFinderError::BadArgument(format!(
            "root does not exist: {}",
            root.display()
        )));
    }
    if !root.is_dir() {
        return Err(DuplicateFinderError::BadArgument(format!(
            "root is not a directory: {}",
            root.display()
        )));
    }
    if options.threshold > 64 {
        return Err(DuplicateFinderError::BadArgument(format!(
            "threshold must be in 0..=64, got {}",
            options.threshold
        )));
    }
    if options.workers == 0 {
        return Err(DuplicateFinderError::BadArgument(
            "workers must be >= 1".to_string(),
        ));
    }
    Ok(())
}

fn scan_error_to_record(e: &ScanError) -> ErrorRecord {
    let path = match e {
        ScanError::DirectoryNotFound { path }
        | ScanError::PermissionDenied { path }
        | ScanError::ReadDirectory { path, .. } => path.clone(),
        ScanError::Cancelled => PathBuf::new(),
    };
    ErrorRecord {
        path,
        kind: ErrorKindTag::Io,
        message: e.to_string(),
    }
}

/// Outcome of a grouping pass: the groups themselves, plus which candidate
/// strategy the perceptual grouper actually resolved to (relevant when
/// `lsh_mode` was `Auto`).
struct GroupingOutcome {
    groups: Vec<DuplicateGroup>,
    lsh_mode_used: LshMode,
}

/// Grouping never runs over a partial record set: a cancelled scan returns
/// whatever was analyzed so far, but a caller may act on `groups` (e.g.
/// delete non-best members), and a partial set is not a sound basis for
/// that. `lsh_mode_used` falls back to the requested mode in that case,
/// since no candidate strategy was ever resolved.
fn grouping_outcome(
    cancelled: bool,
    records: &mut [ImageRecord],
    options: &ScanOptions,
) -> (Vec<DuplicateGroup>, LshMode) {
    if cancelled {
        (Vec::new(), options.lsh_mode)
    } else {
        let outcome = build_groups(records, options.threshold, options.mode, options.lsh_mode);
        (outcome.groups, outcome.lsh_mode_used)
    }
}

/// Runs C6 (and, per `mode`, C8) over the analyzed records, reassigning
/// dense ids across both kinds so the combined `groups` list has no
/// collisions. Members within each group are already ranked by C5.
fn build_groups(
    records: &mut [ImageRecord],
    threshold: u32,
    mode: GroupingMode,
    lsh_mode: LshMode,
) -> GroupingOutcome {
    let mut groups = Vec::new();
    let mut exact_member_paths = HashSet::new();
    let mut lsh_mode_used = lsh_mode;

    if matches!(mode, GroupingMode::ExactOnly | GroupingMode::Both) {
        let exact = group_exact(records);
        exact_member_paths = exact.exact_member_paths;
        groups.extend(exact.groups);
    }

    if matches!(mode, GroupingMode::PerceptualOnly | GroupingMode::Both) {
        let (perceptual_groups, strategy) =
            group_perceptual(records, threshold, &exact_member_paths, lsh_mode);
        lsh_mode_used = match strategy {
            CandidateStrategy::LshIndex => LshMode::ForceOn,
            CandidateStrategy::BruteForce => LshMode::ForceOff,
        };
        groups.extend(perceptual_groups);
    }

    for (id, group) in groups.iter_mut().enumerate() {
        group.id = id as u64;
    }
    GroupingOutcome {
        groups,
        lsh_mode_used,
    }
}

/// Degrades cache access to a bypass on storage error rather than failing
/// the scan, logging once per scan instead of once per file.
#[derive(Clone)]
struct CacheGuard {
    cache: Option<Arc<dyn AnalysisCache + Send + Sync>>,
    degraded: Arc<AtomicBool>,
    warned: Arc<AtomicBool>,
}

impl CacheGuard {
    fn lookup(&self, path: &Path, size_bytes: u64, mtime_secs: i64) -> Option<ImageRecord> {
        let cache = self.cache.as_ref()?;
        match cache.lookup(path, size_bytes, mtime_secs) {
            Ok(found) => found,
            Err(e) => {
                self.mark_degraded(&e);
                None
            }
        }
    }

    fn store(&self, record: &ImageRecord) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        if let Err(e) = cache.store(record) {
            self.mark_degraded(&e);
        }
    }

    fn mark_degraded(&self, e: &CacheError) {
        self.degraded.store(true, Ordering::Relaxed);
        if !self.warned.swap(true, Ordering::Relaxed) {
            tracing::warn!("cache degraded to bypass for the remainder of this scan: {e}");
        }
    }
}

enum WorkerResult {
    CacheHit(ImageRecord),
    Analyzed(ImageRecord),
    AnalyzedWithError(ImageRecord, ErrorRecord),
    Failed(ErrorRecord),
}

struct DriverResult {
    records: Vec<ImageRecord>,
    errors: Vec<ErrorRecord>,
    cache_hits: usize,
    cancelled: bool,
}

/// Feeds `photos` through a bounded work queue and a fixed worker pool,
/// consulting `cache_guard` ahead of analysis so a hit skips decode and
/// hashing entirely. A dedicated collector thread owns progress accounting
/// so workers never contend on it.
fn run_driver(photos: Vec<PhotoFile>, options: &ScanOptions, cache_guard: CacheGuard) -> DriverResult {
    let total = photos.len();
    if total == 0 {
        if let Some(cb) = &options.progress_cb {
            cb(DriverProgress {
                found: 0,
                analyzed: 0,
                cache_hits: 0,
                errors: 0,
                rate_per_sec: 0.0,
                eta_secs: None,
            });
        }
        return DriverResult {
            records: Vec::new(),
            errors: Vec::new(),
            cache_hits: 0,
            cancelled: false,
        };
    }

    let queue_capacity = options.workers.saturating_mul(4).max(1);
    let (job_tx, job_rx) = crossbeam_channel::bounded::<PhotoFile>(queue_capacity);
    let (result_tx, result_rx) = crossbeam_channel::unbounded::<WorkerResult>();

    let worker_handles: Vec<_> = (0..options.workers)
        .map(|_| {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let cache_guard = cache_guard.clone();
            thread::spawn(move || worker_loop(&job_rx, &result_tx, &cache_guard))
        })
        .collect();
    drop(job_rx);
    drop(result_tx);

    let progress_cb = options.progress_cb.clone();
    let collector_handle = thread::spawn(move || collector_loop(&result_rx, total, progress_cb));

    let mut cancelled = false;
    for photo in photos {
        if let Some(token) = &options.cancel_token {
            if token.load(Ordering::Relaxed) {
                cancelled = true;
                break;
            }
        }
        if job_tx.send(photo).is_err() {
            break;
        }
    }
    drop(job_tx);

    for handle in worker_handles {
        let _ = handle.join();
    }
    let outcome = collector_handle.join().unwrap_or_default();

    DriverResult {
        records: outcome.records,
        errors: outcome.errors,
        cache_hits: outcome.cache_hits,
        cancelled,
    }
}

fn worker_loop(job_rx: &Receiver<PhotoFile>, result_tx: &Sender<WorkerResult>, cache_guard: &CacheGuard) {
    while let Ok(photo) = job_rx.recv() {
        let mtime_secs = system_time_to_secs(photo.modified);
        if let Some(record) = cache_guard.lookup(&photo.path, photo.size, mtime_secs) {
            let _ = result_tx.send(WorkerResult::CacheHit(record));
            continue;
        }

        match analyze(&photo) {
            AnalysisOutcome::Record(record) => {
                cache_guard.store(&record);
                let _ = result_tx.send(WorkerResult::Analyzed(record));
            }
            AnalysisOutcome::PartialWithError(record, error) => {
                cache_guard.store(&record);
                let _ = result_tx.send(WorkerResult::AnalyzedWithError(record, error));
            }
            AnalysisOutcome::Error(error) => {
                let _ = result_tx.send(WorkerResult::Failed(error));
            }
        }
    }
}

#[derive(Default)]
struct CollectorOutcome {
    records: Vec<ImageRecord>,
    errors: Vec<ErrorRecord>,
    cache_hits: usize,
}

/// EMA smoothing factor for the processing-rate estimate.
const RATE_EMA_ALPHA: f64 = 0.3;
const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

fn collector_loop(
    result_rx: &Receiver<WorkerResult>,
    total_found: usize,
    progress_cb: Option<Arc<dyn Fn(DriverProgress) + Send + Sync>>,
) -> CollectorOutcome {
    let mut records = Vec::new();
    let mut errors = Vec::new();
    let mut analyzed = 0usize;
    let mut cache_hits = 0usize;
    let mut error_count = 0usize;

    let mut ema_rate = 0.0f64;
    let mut last_report_at = Instant::now();
    let mut analyzed_at_last_report = 0usize;

    while let Ok(result) = result_rx.recv() {
        match result {
            WorkerResult::CacheHit(record) => {
                analyzed += 1;
                cache_hits += 1;
                records.push(record);
            }
            WorkerResult::Analyzed(record) => {
                analyzed += 1;
                records.push(record);
            }
            WorkerResult::AnalyzedWithError(record, error) => {
                analyzed += 1;
                error_count += 1;
                records.push(record);
                errors.push(error);
            }
            WorkerResult::Failed(error) => {
                analyzed += 1;
                error_count += 1;
                errors.push(error);
            }
        }

        let now = Instant::now();
        let elapsed = now.duration_since(last_report_at);
        if elapsed >= PROGRESS_INTERVAL {
            let instant_rate = (analyzed - analyzed_at_last_report) as f64 / elapsed.as_secs_f64();
            ema_rate = RATE_EMA_ALPHA * instant_rate + (1.0 - RATE_EMA_ALPHA) * ema_rate;
            last_report_at = now;
            analyzed_at_last_report = analyzed;

            if let Some(cb) = &progress_cb {
                cb(DriverProgress {
                    found: total_found,
                    analyzed,
                    cache_hits,
                    errors: error_count,
                    rate_per_sec: ema_rate,
                    eta_secs: eta_secs(ema_rate, total_found, analyzed),
                });
            }
        }
    }

    if let Some(cb) = &progress_cb {
        cb(DriverProgress {
            found: total_found,
            analyzed,
            cache_hits,
            errors: error_count,
            rate_per_sec: ema_rate,
            eta_secs: eta_secs(ema_rate, total_found, analyzed),
        });
    }

    CollectorOutcome {
        records,
        errors,
        cache_hits,
    }
}

fn eta_secs(rate_per_sec: f64, total_found: usize, analyzed: usize) -> Option<f64> {
    if rate_per_sec <= 0.0 {
        return None;
    }
    let remaining = total_found.saturating_sub(analyzed) as f64;
    Some(remaining / rate_per_sec)
}

/// A cooperative cancellation handle shared between a caller and an
/// in-flight `scan()` call via `ScanOptions.cancel_token`.
pub fn new_cancel_token() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

/// Signal a scan in progress to stop dispatching new work. In-flight
/// analyzer calls still finish; the eventual `ScanResult` carries whatever
/// was analyzed so far with `partial: true`.
pub fn cancel(token: &Arc<AtomicBool>) {
    token.store(true, Ordering::Relaxed);
}

/// Cache maintenance operations exposed to callers independent of a scan in
/// progress, per the orchestrator's `cache_ops` capability.
pub struct CacheOps {
    cache: SqliteCache,
}

impl CacheOps {
    pub fn open_default() -> Result<Self, DuplicateFinderError> {
        Self::open(&default_cache_path())
    }

    pub fn open(path: &Path) -> Result<Self, DuplicateFinderError> {
        let cache = SqliteCache::open(path)?;
        Ok(Self { cache })
    }

    pub fn stats(&self) -> Result<CacheStats, DuplicateFinderError> {
        self.cache.stats().map_err(Into::into)
    }

    pub fn clear(&self) -> Result<(), DuplicateFinderError> {
        self.cache.clear().map_err(Into::into)
    }

    pub fn cleanup_missing(&self) -> Result<usize, DuplicateFinderError> {
        self.cache.cleanup_missing().map_err(Into::into)
    }

    pub fn cleanup_stale(&self, max_age_days: u32) -> Result<usize, DuplicateFinderError> {
        self.cache.cleanup_stale(max_age_days).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::GroupKind;
    use image::{ImageBuffer, Rgb};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn write_jpeg(dir: &std::path::Path, name: &str, seed: u8) -> PathBuf {
        let path = dir.join(name);
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(32, 32, |x, y| {
            Rgb([(x as u8).wrapping_add(seed), (y as u8).wrapping_add(seed), 64])
        });
        img.save(&path).unwrap();
        path
    }

    fn options() -> ScanOptions {
        ScanOptions {
            use_cache: false,
            workers: 2,
            ..ScanOptions::default()
        }
    }

    #[test]
    fn rejects_relative_root() {
        let err = scan(Path::new("relative/path"), &options()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::BadArgument);
    }

    #[test]
    fn rejects_nonexistent_root() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");
        let err = scan(&missing, &options()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::BadArgument);
    }

    #[test]
    fn rejects_root_that_is_a_file() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("not_a_dir.txt");
        std::fs::write(&file_path, b"hi").unwrap();
        let err = scan(&file_path, &options()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::BadArgument);
    }

    #[test]
    fn rejects_threshold_over_64() {
        let dir = TempDir::new().unwrap();
        let opts = ScanOptions {
            threshold: 65,
            ..options()
        };
        let err = scan(dir.path(), &opts).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::BadArgument);
    }

    #[test]
    fn rejects_zero_workers() {
        let dir = TempDir::new().unwrap();
        let opts = ScanOptions {
            workers: 0,
            ..options()
        };
        let err = scan(dir.path(), &opts).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::BadArgument);
    }

    #[test]
    fn lsh_mode_used_reports_the_resolved_strategy_not_the_request() {
        let dir = TempDir::new().unwrap();
        let a = write_jpeg(dir.path(), "a.jpg", 0);
        write_jpeg(dir.path(), "b.jpg", 40);
        std::fs::copy(&a, dir.path().join("a_copy.jpg")).unwrap();

        let opts = ScanOptions {
            lsh_mode: LshMode::Auto,
            ..options()
        };
        let result = scan(dir.path(), &opts).unwrap();

        // Well under AUTO_LSH_THRESHOLD, so Auto resolves to brute force;
        // the result must say so instead of echoing back `Auto`.
        assert_eq!(result.lsh_mode_used, LshMode::ForceOff);
    }

    #[test]
    fn finds_exact_duplicates_across_an_empty_cache() {
        let dir = TempDir::new().unwrap();
        let a = write_jpeg(dir.path(), "a.jpg", 0);
        let b = dir.path().join("b.jpg");
        std::fs::copy(&a, &b).unwrap();

        let result = scan(dir.path(), &options()).unwrap();

        assert_eq!(result.records.len(), 2);
        assert!(!result.partial);
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].kind, GroupKind::Exact);
        assert_eq!(result.groups[0].members.len(), 2);
    }

    #[test]
    fn exact_only_mode_never_runs_perceptual_grouping() {
        let dir = TempDir::new().unwrap();
        write_jpeg(dir.path(), "a.jpg", 0);
        write_jpeg(dir.path(), "b.jpg", 1);

        let opts = ScanOptions {
            mode: GroupingMode::ExactOnly,
            ..options()
        };
        let result = scan(dir.path(), &opts).unwrap();

        assert_eq!(result.mode_used, GroupingMode::ExactOnly);
        assert!(result.groups.iter().all(|g| g.kind == GroupKind::Exact));
    }

    #[test]
    fn undecodable_file_is_recorded_as_an_error_but_does_not_abort() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("broken.jpg"), b"not a jpeg").unwrap();

        let result = scan(dir.path(), &options()).unwrap();

        assert_eq!(result.records.len(), 1);
        assert!(!result.records[0].has_perceptual_hash());
        assert_eq!(result.errors.len(), 1);
        assert!(!result.partial);
    }

    #[test]
    fn pre_cancelled_token_yields_a_partial_result() {
        let dir = TempDir::new().unwrap();
        write_jpeg(dir.path(), "a.jpg", 0);
        write_jpeg(dir.path(), "b.jpg", 1);

        let token = new_cancel_token();
        cancel(&token);

        let opts = ScanOptions {
            cancel_token: Some(token),
            ..options()
        };
        let result = scan(dir.path(), &opts).unwrap();

        assert!(result.partial);
        assert!(result.records.is_empty());
    }

    #[test]
    fn cancelled_driver_result_skips_grouping_even_with_analyzed_records() {
        // Two byte-identical records that `build_groups` would otherwise
        // unite into one exact group, paired with a driver outcome that
        // reports cancellation: grouping must be skipped entirely rather
        // than computed over this partial set.
        let mut records = vec![
            ImageRecord {
                path: PathBuf::from("/a.jpg"),
                size_bytes: 100,
                mtime_secs: 0,
                content_hash: [7u8; 32],
                perceptual_hash: Some(0),
                width: Some(10),
                height: Some(10),
                bit_depth: 8,
                format_tag: crate::core::model::FormatTag::Jpeg,
                analyzed_at: 0,
            },
            ImageRecord {
                path: PathBuf::from("/b.jpg"),
                size_bytes: 100,
                mtime_secs: 0,
                content_hash: [7u8; 32],
                perceptual_hash: Some(0),
                width: Some(10),
                height: Some(10),
                bit_depth: 8,
                format_tag: crate::core::model::FormatTag::Jpeg,
                analyzed_at: 0,
            },
        ];

        let (groups, lsh_mode_used) = grouping_outcome(true, &mut records, &options());
        assert!(groups.is_empty());
        assert_eq!(lsh_mode_used, options().lsh_mode);

        let (groups, _) = grouping_outcome(false, &mut records, &options());
        assert_eq!(groups.len(), 1, "sanity check: these records would group if not cancelled");
    }

    #[test]
    fn progress_callback_receives_a_final_call_covering_every_photo() {
        let dir = TempDir::new().unwrap();
        write_jpeg(dir.path(), "a.jpg", 0);
        write_jpeg(dir.path(), "b.jpg", 1);
        write_jpeg(dir.path(), "c.jpg", 2);

        let last_seen: Arc<Mutex<Option<DriverProgress>>> = Arc::new(Mutex::new(None));
        let last_seen_cb = last_seen.clone();
        let opts = ScanOptions {
            progress_cb: Some(Arc::new(move |p| {
                *last_seen_cb.lock().unwrap() = Some(p);
            })),
            ..options()
        };

        scan(dir.path(), &opts).unwrap();

        let final_progress = last_seen.lock().unwrap().expect("progress callback never ran");
        assert_eq!(final_progress.found, 3);
        assert_eq!(final_progress.analyzed, 3);
    }

    #[test]
    fn empty_directory_yields_an_empty_non_partial_result() {
        let dir = TempDir::new().unwrap();
        let result = scan(dir.path(), &options()).unwrap();
        assert!(result.records.is_empty());
        assert!(result.groups.is_empty());
        assert!(!result.partial);
    }
}
