//! # Deterministic ranking score (C5)
//!
//! Answers "which member of a duplicate group do we keep", not "how sharp
//! is this image", that question is [`super::QualityAnalyzer`]'s. The
//! score here is a pure function of cheap-to-read metadata
//! (resolution, file size, bit depth, format), with a strict tie-break
//! chain so ranking is stable across runs on the same input set.

use crate::core::model::{FormatTag, ImageRecord};
use std::cmp::Ordering;

/// Per-format contribution to the score. `RAW=20, PNG/TIFF=17, WEBP=12,
/// JPEG=12, HEIF=12, GIF=5, BMP=10, OTHER=0`.
fn format_points(tag: FormatTag) -> f64 {
    match tag {
        FormatTag::Raw => 20.0,
        FormatTag::Png | FormatTag::Tiff => 17.0,
        FormatTag::WebP | FormatTag::Jpeg | FormatTag::Heif => 12.0,
        FormatTag::Bmp => 10.0,
        FormatTag::Gif => 5.0,
        FormatTag::Other => 0.0,
    }
}

/// Deterministic score in `[0, 110]`.
pub fn quality_score(record: &ImageRecord) -> f64 {
    let resolution_pts = (record.pixel_count() as f64 / 1_000_000.0 * 2.0).min(50.0);
    let filesize_pts = (record.size_bytes as f64 / 1_048_576.0 * 3.0).min(30.0);
    let bitdepth_pts = (record.bit_depth as f64 / 3.2).min(10.0);
    let format_pts = format_points(record.format_tag);
    resolution_pts + filesize_pts + bitdepth_pts + format_pts
}

/// Strict tie-break ordering used to sort group members: higher score first,
/// then larger pixel count, then larger size, then higher bit depth, then
/// lexicographically smaller path. Total order, never returns `Equal` for
/// distinct paths, since path is the final, always-distinct tie-break key.
pub fn compare_for_ranking(a: &ImageRecord, b: &ImageRecord) -> Ordering {
    quality_score(b)
        .partial_cmp(&quality_score(a))
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.pixel_count().cmp(&a.pixel_count()))
        .then_with(|| b.size_bytes.cmp(&a.size_bytes))
        .then_with(|| b.bit_depth.cmp(&a.bit_depth))
        .then_with(|| a.path.cmp(&b.path))
}

/// Sort group members in place per [`compare_for_ranking`]; the head is the
/// best member after sorting.
pub fn rank_members(members: &mut [ImageRecord]) {
    members.sort_by(compare_for_ranking);
}
