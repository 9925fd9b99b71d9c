//! # Error Module
//!
//! User-friendly error types for the duplicate photo cleaner.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, file names, what went wrong
//! - **User-friendly messages** - non-technical users should understand
//! - **Recovery hints** - suggest how to fix when possible

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum DuplicateFinderError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    #[error("Comparison error: {0}")]
    Compare(#[from] CompareError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Invalid argument: {0}")]
    BadArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// The fixed error-kind vocabulary every error in this crate is attributed
/// to, independent of which subsystem raised it. `ErrorRecord`s carry one
/// of these so a caller never has to match on internal enum variant names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Decode,
    FormatUnsupported,
    HashUnsupported,
    CacheCorrupt,
    Cancelled,
    BadArgument,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Io => "IO",
            ErrorKind::Decode => "DECODE",
            ErrorKind::FormatUnsupported => "FORMAT_UNSUPPORTED",
            ErrorKind::HashUnsupported => "HASH_UNSUPPORTED",
            ErrorKind::CacheCorrupt => "CACHE_CORRUPT",
            ErrorKind::Cancelled => "CANCELLED",
            ErrorKind::BadArgument => "BAD_ARGUMENT",
        };
        f.write_str(s)
    }
}

impl DuplicateFinderError {
    /// Classify this error into the fixed error-kind vocabulary so it can be
    /// routed to an `ErrorRecord` or a scan-level flag without matching on
    /// variant names across module boundaries.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DuplicateFinderError::Scan(e) => e.kind(),
            DuplicateFinderError::Hash(e) => e.kind(),
            DuplicateFinderError::Compare(e) => e.kind(),
            DuplicateFinderError::Cache(e) => e.kind(),
            DuplicateFinderError::BadArgument(_) | DuplicateFinderError::Config(_) => {
                ErrorKind::BadArgument
            }
        }
    }
}

impl ScanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanError::DirectoryNotFound { .. } => ErrorKind::BadArgument,
            ScanError::PermissionDenied { .. } => ErrorKind::Io,
            ScanError::ReadDirectory { .. } => ErrorKind::Io,
            ScanError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl HashError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HashError::UnsupportedFormat { .. } => ErrorKind::FormatUnsupported,
            HashError::DecodeError { .. } | HashError::EmptyImage { .. } => ErrorKind::Decode,
            HashError::ComputationFailed(_) => ErrorKind::HashUnsupported,
            HashError::IoError { .. } => ErrorKind::Io,
        }
    }
}

impl CompareError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompareError::NoPhotos => ErrorKind::BadArgument,
            CompareError::InvalidThreshold { .. } => ErrorKind::BadArgument,
            CompareError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl CacheError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::OpenFailed { .. } => ErrorKind::Io,
            CacheError::QueryFailed(_) => ErrorKind::Io,
            CacheError::Corrupted { .. } => ErrorKind::CacheCorrupt,
            CacheError::SerializationFailed(_) => ErrorKind::CacheCorrupt,
        }
    }
}

/// Errors that occur during photo scanning
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scan was cancelled")]
    Cancelled,
}

/// Errors that occur during image hashing
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Failed to decode image {path}: {reason}")]
    DecodeError { path: PathBuf, reason: String },

    #[error("Image is empty or corrupted: {path}")]
    EmptyImage { path: PathBuf },

    #[error("Hash computation failed: {0}")]
    ComputationFailed(String),

    #[error("Failed to open image file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur during duplicate comparison
#[derive(Error, Debug)]
pub enum CompareError {
    #[error("No photos to compare")]
    NoPhotos,

    #[error("Invalid threshold: {value} (must be 0-64)")]
    InvalidThreshold { value: u32 },

    #[error("Comparison was cancelled")]
    Cancelled,
}

/// Errors that occur with the hash cache
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to open cache database at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Database query failed: {0}")]
    QueryFailed(String),

    #[error("Cache corruption detected at {path}. Delete this file and try again.")]
    Corrupted { path: PathBuf },

    #[error("Failed to serialize hash data: {0}")]
    SerializationFailed(String),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, DuplicateFinderError>;
