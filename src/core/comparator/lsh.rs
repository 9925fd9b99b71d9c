//! # Locality-Sensitive Hashing (LSH) Index
//!
//! Probabilistic near-neighbor candidate generator for 64-bit perceptual
//! hashes. Avoids the O(n²) pairwise Hamming comparison cost by routing
//! near-duplicates into shared buckets across several independently
//! permuted tables.
//!
//! ## How it works
//! 1. Build `L` tables, each defined by a fixed random permutation of `B` of
//!    the 64 bit positions, chosen once at index-construction time and
//!    reused for every hash inserted into that table.
//! 2. For a hash `h`, a table's key is the `B`-bit integer obtained by
//!    gathering the bits at that table's chosen positions out of `h`.
//! 3. Two hashes collide in a table when they agree on all `B` gathered
//!    positions. A near-duplicate pair (low total Hamming distance) is
//!    likely to collide in at least one of the `L` tables even though it
//!    won't collide in all of them.
//! 4. `query(h, t)` unions the candidates across all `L` tables; candidates
//!    are then verified by an exact Hamming distance check against `t`.
//!
//! ## Parameter selection
//! `(L, B)` is chosen from the collection size `n` via `lsh_parameters`,
//! tuned for recall at `t <= 10`. Larger collections use more, narrower
//! tables to keep bucket occupancy from exploding.
//!
//! ## Reproducibility
//! The per-table bit permutations are generated once, at index
//! construction, by a fixed-seed pseudo-random shuffle, not the process
//! RNG, so two runs over the same hashes produce identical tables and
//! therefore identical candidate sets.

use std::collections::HashMap;

/// Fixed seed for the per-table bit-position permutations. Changing this
/// value changes which candidates the index returns; it must never vary
/// between runs.
const LSH_SEED: u64 = 0x5A17_D0C3_9E21_41B5;

/// `(L, B)` selection table from the collection size `n`, tuned to keep
/// recall above 99.9% at `t <= 10` while bounding bucket occupancy as `n`
/// grows. See SPEC_FULL.md §4.7.
pub fn lsh_parameters(n: usize) -> (usize, usize) {
    match n {
        0..=9_999 => (15, 20),
        10_000..=49_999 => (18, 18),
        50_000..=199_999 => (20, 16),
        _ => (25, 14),
    }
}

/// Deterministic splitmix64 step, used only to seed per-table shuffles. Not
/// a general-purpose RNG; exists so the LSH tables don't depend on the
/// `rand` crate for what is a one-shot, fixed-seed permutation.
struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Fisher-Yates shuffle of `0..64`, truncated to the first `b` positions.
    fn shuffled_bit_positions(&mut self, b: usize) -> Vec<u8> {
        let mut positions: Vec<u8> = (0..64u8).collect();
        for i in (1..positions.len()).rev() {
            let j = (self.next() % (i as u64 + 1)) as usize;
            positions.swap(i, j);
        }
        positions.truncate(b);
        positions
    }
}

/// One permutation table: a fixed set of `B` bit positions and a map from
/// the gathered key to the ids inserted under it.
struct LshTable {
    positions: Vec<u8>,
    buckets: HashMap<u64, Vec<u64>>,
}

impl LshTable {
    fn new(positions: Vec<u8>) -> Self {
        Self {
            positions,
            buckets: HashMap::new(),
        }
    }

    fn key(&self, hash: u64) -> u64 {
        let mut key = 0u64;
        for (i, &bit_pos) in self.positions.iter().enumerate() {
            let bit = (hash >> bit_pos) & 1;
            key |= bit << i;
        }
        key
    }

    fn insert(&mut self, id: u64, hash: u64) {
        self.buckets.entry(self.key(hash)).or_default().push(id);
    }

    fn candidates(&self, hash: u64) -> &[u64] {
        self.buckets
            .get(&self.key(hash))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Index of 64-bit perceptual hashes supporting approximate Hamming
/// near-neighbor queries via `L` permutation tables.
pub struct LshIndex {
    tables: Vec<LshTable>,
    hashes: HashMap<u64, u64>,
}

impl LshIndex {
    /// Build an empty index sized for a collection of `n` hashes.
    pub fn new(n: usize) -> Self {
        let (l, b) = lsh_parameters(n);
        let mut rng = SplitMix64::new(LSH_SEED);
        let tables = (0..l)
            .map(|_| LshTable::new(rng.shuffled_bit_positions(b)))
            .collect();
        Self {
            tables,
            hashes: HashMap::new(),
        }
    }

    /// Insert one hash under a dense integer id into every table.
    pub fn add(&mut self, id: u64, hash: u64) {
        for table in &mut self.tables {
            table.insert(id, hash);
        }
        self.hashes.insert(id, hash);
    }

    /// One-shot bulk insertion, sizing the table schedule from the number
    /// of items produced by `iter`.
    pub fn build_from(items: impl IntoIterator<Item = (u64, u64)> + Clone) -> Self {
        let n = items.clone().into_iter().count();
        let mut index = Self::new(n);
        for (id, hash) in items {
            index.add(id, hash);
        }
        index
    }

    /// Candidate ids whose hash collides with `hash` in at least one table,
    /// filtered to those at Hamming distance `<= t`. Always includes `hash`
    /// itself (and any other inserted hash at distance 0) per the index
    /// contract, since identical hashes collide in every table.
    pub fn query(&self, hash: u64, t: u32) -> Vec<u64> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for table in &self.tables {
            for &id in table.candidates(hash) {
                if seen.insert(id) {
                    if let Some(&other) = self.hashes.get(&id) {
                        if (hash ^ other).count_ones() <= t {
                            out.push(id);
                        }
                    }
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn bits_per_table(&self) -> usize {
        self.tables.first().map(|t| t.positions.len()).unwrap_or(0)
    }
}

pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}
