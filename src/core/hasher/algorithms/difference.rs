//! Difference Hash (dHash) implementation.
//!
//! dHash works by:
//! 1. Resizing the image to (hash_size+1) x hash_size
//! 2. Converting to grayscale
//! 3. Comparing each pixel to the one to its right
//! 4. If left pixel is brighter, set bit to 1, else 0
//!
//! This captures the relative gradient of brightness changes.
//!
//! Uses SIMD-accelerated resizing via fast_image_resize for 5-14x speedup.

use super::super::fast_resize::resize_to_grayscale;
use super::super::traits::{HashAlgorithm, HashAlgorithmKind, ImageHashValue};
use crate::error::HashError;
use image::DynamicImage;

/// Difference Hash (dHash) implementation
pub struct DifferenceHasher {
    /// Size of the hash (width and height of comparison grid)
    hash_size: u32,
}

impl DifferenceHasher {
    /// Create a new dHash hasher
    pub fn new(hash_size: u32) -> Self {
        Self { hash_size }
    }
}

impl HashAlgorithm for DifferenceHasher {
    fn hash_image(&self, image: &DynamicImage) -> Result<ImageHashValue, HashError> {
        // Resize to (hash_size + 1) x hash_size using SIMD-accelerated resizer
        // We need one extra column to compute differences
        // This also converts to grayscale (5-14x faster than image crate)
        let gray = resize_to_grayscale(image, self.hash_size + 1, self.hash_size)?;

        // Compute the hash
        let mut hash_bytes = Vec::with_capacity((self.hash_size * self.hash_size / 8) as usize + 1);
        let mut current_byte: u8 = 0;
        let mut bit_position = 0;

        for y in 0..self.hash_size {
            for x in 0..self.hash_size {
                // Compare current pixel to the one on its right
                let left_pixel = gray.get_pixel(x, y)[0];
                let right_pixel = gray.get_pixel(x + 1, y)[0];

                // Set bit if left is brighter than right
                if left_pixel > right_pixel {
                    current_byte |= 1 << (7 - bit_position);
                }

                bit_position += 1;

                // When we've filled a byte, save it
                if bit_position == 8 {
                    hash_bytes.push(current_byte);
                    current_byte = 0;
                    bit_position = 0;
                }
            }
        }

        // Don't forget the last partial byte
        if bit_position > 0 {
            hash_bytes.push(current_byte);
        }

        Ok(ImageHashValue::new(hash_bytes, HashAlgorithmKind::Difference))
    }

    fn kind(&self) -> HashAlgorithmKind {
        HashAlgorithmKind::Difference
    }
}
