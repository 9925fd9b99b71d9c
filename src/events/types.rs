//! Event type definitions for progress reporting.
//!
//! The directory walker (C1) still emits fine-grained `ScanEvent`s through
//! this channel; the parallel driver (C4) reports its own progress through
//! the `DriverProgress` callback on `ScanOptions` instead; the two
//! mechanisms are independent.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Events emitted by the duplicate finder pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Scanning phase events
    Scan(ScanEvent),
}

/// Events during the scanning phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Scanning has started
    Started { paths: Vec<PathBuf> },
    /// Progress update during scanning
    Progress(ScanProgress),
    /// A photo was found
    PhotoFound { path: PathBuf },
    /// An error occurred but scanning continues
    Error { path: PathBuf, message: String },
    /// Scanning completed
    Completed { total_photos: usize },
}

/// Progress information during scanning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Number of directories scanned so far
    pub directories_scanned: usize,
    /// Number of photos found so far
    pub photos_found: usize,
    /// Current directory being scanned
    pub current_path: PathBuf,
}
