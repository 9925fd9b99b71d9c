//! # Perceptual grouper (C8)
//!
//! Groups records whose perceptual hashes are within a Hamming-distance
//! threshold, using transitive closure over pairwise matches: if A matches
//! B and B matches C, all three land in one group even without a direct
//! A-C match. Candidate pairs come from brute force or the LSH index
//! (C7), depending on `LshMode` and the collection size.

use crate::core::comparator::lsh::{hamming_distance, LshIndex};
use crate::core::model::{DuplicateGroup, GroupKind, ImageRecord, LshMode, AUTO_LSH_THRESHOLD};
use crate::core::quality::score::rank_members;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Disjoint-set over dense record indices, path-compressed.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

/// Which candidate-enumeration strategy was actually used, after resolving
/// `LshMode::Auto` against the collection size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateStrategy {
    LshIndex,
    BruteForce,
}

fn resolve_strategy(mode: LshMode, n: usize) -> CandidateStrategy {
    match mode {
        LshMode::ForceOn => CandidateStrategy::LshIndex,
        LshMode::ForceOff => CandidateStrategy::BruteForce,
        LshMode::Auto => {
            if n >= AUTO_LSH_THRESHOLD {
                CandidateStrategy::LshIndex
            } else {
                CandidateStrategy::BruteForce
            }
        }
    }
}

/// Group `records` by Hamming distance `<= threshold`, excluding any path
/// already bound into an exact group. Returns the groups (dense ids ordered
/// by smallest-member-path) and the strategy actually used.
pub fn group_perceptual(
    records: &[ImageRecord],
    threshold: u32,
    exact_member_paths: &HashSet<PathBuf>,
    lsh_mode: LshMode,
) -> (Vec<DuplicateGroup>, CandidateStrategy) {
    let candidates: Vec<&ImageRecord> = records
        .iter()
        .filter(|r| r.has_perceptual_hash() && !exact_member_paths.contains(&r.path))
        .collect();

    let n = candidates.len();
    let strategy = resolve_strategy(lsh_mode, n);

    if n < 2 {
        return (Vec::new(), strategy);
    }

    let mut uf = UnionFind::new(n);

    match strategy {
        CandidateStrategy::BruteForce => {
            for i in 0..n {
                let hash_i = candidates[i].perceptual_hash.unwrap();
                for j in (i + 1)..n {
                    let hash_j = candidates[j].perceptual_hash.unwrap();
                    if hamming_distance(hash_i, hash_j) <= threshold {
                        uf.union(i, j);
                    }
                }
            }
        }
        CandidateStrategy::LshIndex => {
            if threshold > 10 {
                tracing::warn!(
                    threshold,
                    "LSH candidate generation is tuned for threshold <= 10; recall is not guaranteed at this threshold"
                );
            }
            let items: Vec<(u64, u64)> = candidates
                .iter()
                .enumerate()
                .map(|(i, r)| (i as u64, r.perceptual_hash.unwrap()))
                .collect();
            let index = LshIndex::build_from(items);

            for i in 0..n {
                let hash_i = candidates[i].perceptual_hash.unwrap();
                for id in index.query(hash_i, threshold) {
                    let j = id as usize;
                    if j > i {
                        uf.union(i, j);
                    }
                }
            }
        }
    }

    let mut groups_by_root: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..n {
        let root = uf.find(i);
        groups_by_root.entry(root).or_default().push(i);
    }

    let mut member_sets: Vec<Vec<ImageRecord>> = groups_by_root
        .into_values()
        .filter(|members| members.len() >= 2)
        .map(|indices| indices.into_iter().map(|i| candidates[i].clone()).collect())
        .collect();

    for members in &mut member_sets {
        rank_members(members);
    }
    member_sets.sort_by(|a, b| {
        let min_a = a.iter().map(|m| &m.path).min().unwrap();
        let min_b = b.iter().map(|m| &m.path).min().unwrap();
        min_a.cmp(min_b)
    });

    let groups = member_sets
        .into_iter()
        .enumerate()
        .map(|(id, members)| {
            let potential_savings_bytes: u64 =
                members.iter().skip(1).map(|m| m.size_bytes).sum();
            DuplicateGroup {
                id: id as u64,
                kind: GroupKind::Perceptual,
                members,
                potential_savings_bytes,
            }
        })
        .collect();

    (groups, strategy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::FormatTag;

    fn record(path: &str, phash: u64) -> ImageRecord {
        ImageRecord {
            path: PathBuf::from(path),
            size_bytes: 100,
            mtime_secs: 0,
            content_hash: [0u8; 32],
            perceptual_hash: Some(phash),
            width: Some(100),
            height: Some(100),
            bit_depth: 8,
            format_tag: FormatTag::Jpeg,
            analyzed_at: 0,
        }
    }

    #[test]
    fn transitive_chain_unites_via_brute_force() {
        // A-B distance 3, B-C distance 4, A-C distance 7; threshold 5.
        let a = record("/a.jpg", 0b0000_0000);
        let b = record("/b.jpg", 0b0000_0111); // distance 3 from a
        let c = record("/c.jpg", 0b0111_0111); // distance 4 from b, 7 from a
        let records = vec![a, b, c];

        let (groups, strategy) =
            group_perceptual(&records, 5, &HashSet::new(), LshMode::ForceOff);

        assert_eq!(strategy, CandidateStrategy::BruteForce);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members.len(), 3);
    }

    #[test]
    fn excludes_paths_already_in_an_exact_group() {
        let a = record("/a.jpg", 0);
        let b = record("/b.jpg", 1);
        let records = vec![a.clone(), b];
        let mut excluded = HashSet::new();
        excluded.insert(a.path.clone());

        let (groups, _) = group_perceptual(&records, 10, &excluded, LshMode::ForceOff);
        assert!(groups.is_empty());
    }

    #[test]
    fn lsh_and_brute_force_agree_on_small_synthetic_input() {
        let records: Vec<ImageRecord> = (0..40u64)
            .map(|i| record(&format!("/{i}.jpg"), i.wrapping_mul(0x9E37_79B9)))
            .collect();

        let (bf_groups, _) =
            group_perceptual(&records, 8, &HashSet::new(), LshMode::ForceOff);
        let (lsh_groups, strategy) =
            group_perceptual(&records, 8, &HashSet::new(), LshMode::ForceOn);

        assert_eq!(strategy, CandidateStrategy::LshIndex);

        let bf_paths: HashSet<Vec<PathBuf>> = bf_groups
            .iter()
            .map(|g| {
                let mut paths: Vec<_> = g.members.iter().map(|m| m.path.clone()).collect();
                paths.sort();
                paths
            })
            .collect();
        let lsh_paths: HashSet<Vec<PathBuf>> = lsh_groups
            .iter()
            .map(|g| {
                let mut paths: Vec<_> = g.members.iter().map(|m| m.path.clone()).collect();
                paths.sort();
                paths
            })
            .collect();
        assert_eq!(bf_paths, lsh_paths);
    }

    #[test]
    fn auto_mode_uses_brute_force_below_threshold() {
        let records = vec![record("/a.jpg", 0), record("/b.jpg", 1)];
        let (_, strategy) = group_perceptual(&records, 5, &HashSet::new(), LshMode::Auto);
        assert_eq!(strategy, CandidateStrategy::BruteForce);
    }

    #[test]
    fn groups_are_ordered_by_smallest_member_path() {
        let records = vec![
            record("/z1.jpg", 0),
            record("/z2.jpg", 0),
            record("/a1.jpg", 100),
            record("/a2.jpg", 100),
        ];
        let (groups, _) = group_perceptual(&records, 0, &HashSet::new(), LshMode::ForceOff);
        assert_eq!(groups[0].members[0].path, PathBuf::from("/a1.jpg"));
        assert_eq!(groups[1].members[0].path, PathBuf::from("/z1.jpg"));
    }

    fn record_with_format(path: &str, phash: u64, tag: FormatTag) -> ImageRecord {
        ImageRecord {
            path: PathBuf::from(path),
            size_bytes: 100,
            mtime_secs: 0,
            content_hash: [0u8; 32],
            perceptual_hash: Some(phash),
            width: Some(100),
            height: Some(100),
            bit_depth: 8,
            format_tag: tag,
            analyzed_at: 0,
        }
    }

    #[test]
    fn group_order_uses_the_smallest_member_path_not_the_quality_ranked_head() {
        // Group A's RAW (best-quality, hence head) member sorts after
        // group B's, but group A's *other* member is the lexicographically
        // smallest path overall - it must still determine group order.
        let records = vec![
            record_with_format("/m_a.raw", 0, FormatTag::Raw),
            record_with_format("/a_a.jpg", 0, FormatTag::Jpeg),
            record_with_format("/b_b.raw", 100, FormatTag::Raw),
            record_with_format("/z_b.jpg", 100, FormatTag::Jpeg),
        ];

        let (groups, _) = group_perceptual(&records, 0, &HashSet::new(), LshMode::ForceOff);
        assert_eq!(groups[0].best().path, PathBuf::from("/m_a.raw"));
        assert_eq!(groups[1].best().path, PathBuf::from("/b_b.raw"));
    }
}
