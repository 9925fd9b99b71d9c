//! # Per-file analyzer (C2)
//!
//! Runs one discovered file through the full analysis sequence: stat,
//! content hash, decode, perceptual hash, dimensions. Each step can fail
//! independently, and a decode failure doesn't throw away what was already
//! learned: the file still gets a content hash and can participate in
//! exact-duplicate grouping even if it can never join a perceptual group.

use super::content_hash::compute_content_hash;
use super::fast_decode::FastDecoder;
use super::traits::{HashAlgorithm, PerceptualHash};
use super::PerceptualHasher;
use crate::core::model::{system_time_to_secs, now_secs, ErrorRecord, ErrorKindTag, FormatTag, ImageRecord};
use crate::core::scanner::PhotoFile;
use image::{ColorType, DynamicImage};

/// Outcome of analyzing one file: a usable record, or a usable record plus
/// the decode error that kept it from getting a perceptual hash, or a bare
/// error when even stat/hashing failed.
pub enum AnalysisOutcome {
    Record(ImageRecord),
    PartialWithError(ImageRecord, ErrorRecord),
    Error(ErrorRecord),
}

/// Per-channel bit depth implied by the decoded color type.
fn bit_depth_of(color: ColorType) -> u8 {
    match color {
        ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => 8,
        ColorType::L16 | ColorType::La16 | ColorType::Rgb16 | ColorType::Rgba16 => 16,
        ColorType::Rgb32F | ColorType::Rgba32F => 32,
        _ => 8,
    }
}

/// Analyze one discovered photo. Never panics; every failure mode returns a
/// value instead.
///
/// 1. stat (size, mtime), already known from `photo`, re-checked implicitly
///    by the content-hash read failing if the file has vanished since scan.
/// 2. stream the file through SHA-256.
/// 3. decode via the fast-path decoder.
/// 4. compute a 64-bit perceptual hash from the decoded image.
/// 5. read width/height/bit-depth from the decoded image.
pub fn analyze(photo: &PhotoFile) -> AnalysisOutcome {
    let path = &photo.path;
    let size_bytes = photo.size;
    let mtime_secs = system_time_to_secs(photo.modified);
    let format_tag = photo.format.format_tag();

    let content_hash = match compute_content_hash(path) {
        Ok(hash) => hash,
        Err(e) => {
            return AnalysisOutcome::Error(ErrorRecord {
                path: path.clone(),
                kind: ErrorKindTag::Io,
                message: e.to_string(),
            })
        }
    };

    let decoded = FastDecoder::decode(path);
    let decoded = match decoded {
        Ok(image) => image,
        Err(e) => {
            let partial = ImageRecord {
                path: path.clone(),
                size_bytes,
                mtime_secs,
                content_hash,
                perceptual_hash: None,
                width: None,
                height: None,
                bit_depth: 8,
                format_tag: FormatTag::Other,
                analyzed_at: now_secs(),
            };
            let error = ErrorRecord {
                path: path.clone(),
                kind: ErrorKindTag::Decode,
                message: e.to_string(),
            };
            return AnalysisOutcome::PartialWithError(partial, error);
        }
    };

    let perceptual_hash = compute_perceptual_hash(&decoded);
    let (width, height) = image_dimensions(&decoded);
    let bit_depth = bit_depth_of(decoded.color());

    AnalysisOutcome::Record(ImageRecord {
        path: path.clone(),
        size_bytes,
        mtime_secs,
        content_hash,
        perceptual_hash,
        width: Some(width),
        height: Some(height),
        bit_depth,
        format_tag,
        analyzed_at: now_secs(),
    })
}

fn image_dimensions(image: &DynamicImage) -> (u32, u32) {
    use image::GenericImageView;
    image.dimensions()
}

/// Compute a 64-bit perceptual hash (8x8 DCT hash, matching the existing
/// `PerceptualHasher`'s default size). Returns `None` if hashing fails on an
/// already-decoded image, which in practice only happens for degenerate
/// (zero-sized) images.
fn compute_perceptual_hash(image: &DynamicImage) -> Option<u64> {
    let hasher = PerceptualHasher::new(8);
    let hash = hasher.hash_image(image).ok()?;
    let bytes = hash.as_bytes();
    if bytes.len() != 8 {
        return None;
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Some(u64::from_be_bytes(buf))
}

/// Returns `true` for analysis failures that are also permanent decode
/// failures, matching the classification a caller needs when deciding
/// whether a retry is worth attempting.
pub fn is_undecodable(outcome: &AnalysisOutcome) -> bool {
    matches!(outcome, AnalysisOutcome::PartialWithError(_, _))
}
