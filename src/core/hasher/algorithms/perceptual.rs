//! Perceptual Hash (pHash) implementation.
//!
//! pHash uses the Discrete Cosine Transform (DCT) to extract
//! frequency information from the image. This makes it more
//! robust to:
//! - Scaling
//! - Minor rotations
//! - Brightness/contrast changes
//! - Compression artifacts
//!
//! For simplicity, we use the image_hasher crate which provides
//! a well-tested pHash implementation.

use super::super::traits::{HashAlgorithm, HashAlgorithmKind, ImageHashValue};
use crate::error::HashError;
use image::DynamicImage;
use image_hasher::{HasherConfig as ImageHasherConfig, HashAlg};

/// Perceptual Hash (pHash) implementation using DCT
pub struct PerceptualHasher {
    /// Size of the hash (stored for potential future use)
    _hash_size: u32,
    /// Internal hasher from image_hasher crate
    hasher: image_hasher::Hasher,
}

impl PerceptualHasher {
    /// Create a new pHash hasher
    pub fn new(hash_size: u32) -> Self {
        let hasher = ImageHasherConfig::new()
            .hash_size(hash_size, hash_size)
            .hash_alg(HashAlg::DoubleGradient) // DCT-based algorithm
            .to_hasher();

        Self { _hash_size: hash_size, hasher }
    }
}

impl HashAlgorithm for PerceptualHasher {
    fn hash_image(&self, image: &DynamicImage) -> Result<ImageHashValue, HashError> {
        let hash = self.hasher.hash_image(image);
        let bytes = hash.as_bytes().to_vec();

        Ok(ImageHashValue::new(bytes, HashAlgorithmKind::Perceptual))
    }

    fn kind(&self) -> HashAlgorithmKind {
        HashAlgorithmKind::Perceptual
    }
}
