//! # Scanner Module
//!
//! Discovers photo files in directories.
//!
//! ## Supported Formats
//! - JPEG (.jpg, .jpeg)
//! - PNG (.png)
//! - WebP (.webp)
//! - HEIC (.heic, .heif) - iPhone photos
//! - GIF (.gif)
//! - BMP (.bmp)
//! - TIFF (.tiff, .tif)
//!
//! ## Example
//! ```rust,ignore
//! use duplicate_photo_cleaner::core::scanner::{WalkDirScanner, PhotoScanner};
//!
//! let scanner = WalkDirScanner::new(ScanConfig::default());
//! let photos = scanner.scan(&["/Users/photos".into()])?;
//! ```

mod filter;
mod walker;

pub use filter::ImageFilter;
pub use walker::{ScanConfig, WalkDirScanner};

use crate::error::ScanError;
use crate::events::EventSender;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

/// Represents a discovered photo file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoFile {
    /// Path to the photo file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified time
    pub modified: SystemTime,
    /// Detected image format
    pub format: ImageFormat,
}

/// Supported image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
    Heic,
    Gif,
    Bmp,
    Tiff,
    Avif,
    Jxl,
    Raw,
    Unknown,
}

impl ImageFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => ImageFormat::Jpeg,
            "png" => ImageFormat::Png,
            "webp" => ImageFormat::WebP,
            "heic" | "heif" => ImageFormat::Heic,
            "gif" => ImageFormat::Gif,
            "bmp" => ImageFormat::Bmp,
            "tiff" | "tif" => ImageFormat::Tiff,
            "avif" => ImageFormat::Avif,
            "jxl" => ImageFormat::Jxl,
            "cr2" | "nef" | "arw" | "dng" | "raf" | "orf" | "rw2" => ImageFormat::Raw,
            _ => ImageFormat::Unknown,
        }
    }

    /// Check if this format is supported
    pub fn is_supported(&self) -> bool {
        !matches!(self, ImageFormat::Unknown)
    }

    /// Map to the coarse format tag used by the quality scorer and the cache.
    pub fn format_tag(&self) -> crate::core::model::FormatTag {
        use crate::core::model::FormatTag;
        match self {
            ImageFormat::Jpeg => FormatTag::Jpeg,
            ImageFormat::Png => FormatTag::Png,
            ImageFormat::WebP => FormatTag::WebP,
            ImageFormat::Heic => FormatTag::Heif,
            ImageFormat::Gif => FormatTag::Gif,
            ImageFormat::Bmp => FormatTag::Bmp,
            ImageFormat::Tiff => FormatTag::Tiff,
            ImageFormat::Raw => FormatTag::Raw,
            ImageFormat::Avif | ImageFormat::Jxl | ImageFormat::Unknown => FormatTag::Other,
        }
    }
}

/// Result of a scan operation
#[derive(Debug)]
pub struct ScanResult {
    /// Successfully discovered photos
    pub photos: Vec<PhotoFile>,
    /// Errors that occurred during scanning (non-fatal)
    pub errors: Vec<ScanError>,
}

/// Trait for photo scanners
///
/// Implement this trait to create custom scanners (e.g., for testing).
pub trait PhotoScanner: Send + Sync {
    /// Scan directories and return discovered photos
    fn scan(&self, paths: &[PathBuf]) -> Result<ScanResult, ScanError>;

    /// Scan with progress reporting via events
    fn scan_with_events(
        &self,
        paths: &[PathBuf],
        events: &EventSender,
    ) -> Result<ScanResult, ScanError>;
}
