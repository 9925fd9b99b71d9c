//! # Hasher Module
//!
//! Perceptual and content hashing for images.
//!
//! - [`analyzer`] (C2) is the per-file entry point: stat, content hash,
//!   decode, perceptual hash, in one pass.
//! - [`content_hash`] computes the cryptographic (SHA-256) identity hash.
//! - [`algorithms`] holds the perceptual-hash implementations; the analyzer
//!   uses [`PerceptualHasher`] directly (an 8x8 block-DCT hash, matching
//!   the decoder contract in the external-interfaces spec).
//!
//! ## Performance
//! - Uses `zune-jpeg` for faster JPEG decoding than the general `image`
//!   crate path.
//! - Uses `fast_image_resize` for SIMD-accelerated resizing ahead of
//!   hashing.

mod algorithms;
pub mod analyzer;
pub mod content_hash;
pub mod fast_decode;
pub mod fast_resize;
mod traits;

pub use algorithms::{AverageHasher, DifferenceHasher, PerceptualHasher};
pub use analyzer::{analyze, AnalysisOutcome};
pub use content_hash::compute_content_hash;
pub use traits::{HashAlgorithm, HashAlgorithmKind, ImageHashValue, PerceptualHash};

// Re-export PerceptualHash for external use
pub use traits::PerceptualHash as _;
