//! # Comparator Module
//!
//! Finds duplicates and near-duplicates among analyzed records.
//!
//! - [`exact`] (C6) partitions by content hash: byte-identical files.
//! - [`lsh`] (C7) is the candidate-generation index behind [`perceptual`]
//!   for large collections.
//! - [`perceptual`] (C8) groups by Hamming distance between perceptual
//!   hashes, using [`lsh`] or brute force depending on collection size.

pub mod exact;
pub mod lsh;
pub mod perceptual;

pub use exact::{group_exact, ExactGroupingResult};
pub use lsh::{hamming_distance, lsh_parameters, LshIndex};
pub use perceptual::{group_perceptual, CandidateStrategy};
