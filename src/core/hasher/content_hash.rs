//! # Content hashing (C2, step 2)
//!
//! Streams a file through SHA-256 in fixed-size chunks so the whole file is
//! never loaded into memory at once. Same shape as
//! `image-deduper-core::processing::compute_cryptographic`, swapped to
//! SHA-256 since that's the digest the cache schema stores.

use crate::error::HashError;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Stream `path` through SHA-256 and return the 32-byte digest.
pub fn compute_content_hash(path: &Path) -> Result<[u8; 32], HashError> {
    let mut file = File::open(path).map_err(|e| HashError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| HashError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().into())
}
