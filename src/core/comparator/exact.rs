//! # Exact grouper (C6)
//!
//! Partitions analyzed records by `content_hash` and emits one group per
//! partition of size >= 2. No union-find is needed here: content-hash
//! equality is already an equivalence relation, unlike Hamming-distance
//! closeness in the perceptual grouper.

use crate::core::model::{DuplicateGroup, GroupKind, ImageRecord};
use crate::core::quality::score::rank_members;
use std::collections::HashMap;

/// Result of the exact-grouping pass: the groups themselves, plus the set of
/// paths bound into one, for the perceptual grouper (C8) to exclude.
pub struct ExactGroupingResult {
    pub groups: Vec<DuplicateGroup>,
    pub exact_member_paths: std::collections::HashSet<std::path::PathBuf>,
}

/// Partition `records` by `content_hash`, build groups for partitions of
/// size >= 2, and assign dense ids in order of smallest-member-path,
/// matching the determinism rule the perceptual grouper uses for its own groups.
pub fn group_exact(records: &[ImageRecord]) -> ExactGroupingResult {
    let mut by_hash: HashMap<[u8; 32], Vec<ImageRecord>> = HashMap::new();
    for record in records {
        by_hash
            .entry(record.content_hash)
            .or_default()
            .push(record.clone());
    }

    let mut groups: Vec<DuplicateGroup> = Vec::new();
    let mut exact_member_paths = std::collections::HashSet::new();

    let mut partitions: Vec<Vec<ImageRecord>> = by_hash
        .into_values()
        .filter(|members| members.len() >= 2)
        .collect();

    for members in &mut partitions {
        rank_members(members);
    }
    partitions.sort_by(|a, b| {
        let min_a = a.iter().map(|m| &m.path).min().unwrap();
        let min_b = b.iter().map(|m| &m.path).min().unwrap();
        min_a.cmp(min_b)
    });

    for (id, members) in partitions.into_iter().enumerate() {
        for member in &members {
            exact_member_paths.insert(member.path.clone());
        }
        let potential_savings_bytes: u64 = members.iter().skip(1).map(|m| m.size_bytes).sum();
        groups.push(DuplicateGroup {
            id: id as u64,
            kind: GroupKind::Exact,
            members,
            potential_savings_bytes,
        });
    }

    ExactGroupingResult {
        groups,
        exact_member_paths,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::FormatTag;
    use std::path::PathBuf;

    fn record(path: &str, hash: u8, size: u64) -> ImageRecord {
        ImageRecord {
            path: PathBuf::from(path),
            size_bytes: size,
            mtime_secs: 0,
            content_hash: [hash; 32],
            perceptual_hash: Some(0),
            width: Some(100),
            height: Some(100),
            bit_depth: 8,
            format_tag: FormatTag::Jpeg,
            analyzed_at: 0,
        }
    }

    #[test]
    fn singletons_are_not_grouped() {
        let records = vec![record("/a.jpg", 1, 100), record("/b.jpg", 2, 100)];
        let result = group_exact(&records);
        assert!(result.groups.is_empty());
    }

    #[test]
    fn identical_content_hash_forms_one_group() {
        let records = vec![
            record("/a.jpg", 1, 100),
            record("/b.jpg", 1, 200),
            record("/c.jpg", 2, 300),
        ];
        let result = group_exact(&records);
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].members.len(), 2);
    }

    #[test]
    fn potential_savings_excludes_head() {
        let records = vec![record("/a.jpg", 1, 100), record("/b.jpg", 1, 250)];
        let result = group_exact(&records);
        let group = &result.groups[0];
        let total: u64 = group.members.iter().map(|m| m.size_bytes).sum();
        assert_eq!(group.potential_savings_bytes, total - group.best().size_bytes);
    }

    #[test]
    fn exact_member_paths_covers_every_group_member() {
        let records = vec![
            record("/a.jpg", 1, 100),
            record("/b.jpg", 1, 100),
            record("/c.jpg", 2, 100),
        ];
        let result = group_exact(&records);
        assert!(result.exact_member_paths.contains(&PathBuf::from("/a.jpg")));
        assert!(result.exact_member_paths.contains(&PathBuf::from("/b.jpg")));
        assert!(!result.exact_member_paths.contains(&PathBuf::from("/c.jpg")));
    }

    #[test]
    fn group_ids_are_ordered_by_smallest_member_path() {
        let records = vec![
            record("/z1.jpg", 9, 100),
            record("/z2.jpg", 9, 100),
            record("/a1.jpg", 8, 100),
            record("/a2.jpg", 8, 100),
        ];
        let result = group_exact(&records);
        assert_eq!(result.groups[0].members[0].path, PathBuf::from("/a1.jpg"));
        assert_eq!(result.groups[1].members[0].path, PathBuf::from("/z1.jpg"));
    }

    fn record_with_format(path: &str, hash: u8, tag: FormatTag) -> ImageRecord {
        ImageRecord {
            path: PathBuf::from(path),
            size_bytes: 100,
            mtime_secs: 0,
            content_hash: [hash; 32],
            perceptual_hash: Some(0),
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
            record_with_format("/m_a.raw", 1, FormatTag::Raw),
            record_with_format("/a_a.jpg", 1, FormatTag::Jpeg),
            record_with_format("/b_b.raw", 2, FormatTag::Raw),
            record_with_format("/z_b.jpg", 2, FormatTag::Jpeg),
        ];

        let result = group_exact(&records);
        assert_eq!(result.groups[0].best().path, PathBuf::from("/m_a.raw"));
        assert_eq!(result.groups[1].best().path, PathBuf::from("/b_b.raw"));
    }
}
