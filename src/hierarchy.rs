//! One-level tree view over the flat subject namespace.
//!
//! The view is recomputed from a registry snapshot on every navigation
//! step; nothing is cached between calls. Cost is linear in the number of
//! registered subjects, which is fine at thousands of subjects but is the
//! first thing to revisit if subject counts grow by orders of magnitude.

use crate::subject::{path_prefix, SEPARATOR};
use crate::types::{SubjectNode, SubjectStat};
use std::collections::BTreeMap;

/// Children of `path` among `subjects`, sorted by name.
///
/// A child is a leaf if some subject ends exactly at it, and has children
/// if some subject continues past it; both can hold for the same token.
/// Counts are summed over every subject under the child.
pub fn project<S: AsRef<str>>(subjects: &[SubjectStat], path: &[S]) -> Vec<SubjectNode> {
    let prefix = path_prefix(path);
    let mut nodes: BTreeMap<&str, SubjectNode> = BTreeMap::new();

    for stat in subjects {
        let Some(remainder) = stat.name.strip_prefix(prefix.as_str()) else {
            continue;
        };

        let (child, deeper) = match remainder.split_once(SEPARATOR) {
            Some((head, _)) => (head, true),
            None => (remainder, false),
        };
        if child.is_empty() {
            continue;
        }

        let node = nodes.entry(child).or_insert_with(|| SubjectNode {
            name: child.to_string(),
            is_leaf: false,
            has_children: false,
            message_count: 0,
        });
        node.message_count += stat.count;
        if deeper {
            node.has_children = true;
        } else {
            node.is_leaf = true;
        }
    }

    nodes.into_values().collect()
}

/// Split a dotted subject into a navigation path.
pub fn path_of(subject: &str) -> Vec<String> {
    if subject.is_empty() {
        return Vec::new();
    }
    subject.split(SEPARATOR).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;
    use proptest::prelude::*;

    fn stats(entries: &[(&str, u64)]) -> Vec<SubjectStat> {
        entries
            .iter()
            .map(|(name, count)| SubjectStat {
                name: name.to_string(),
                first_seen: Timestamp(0),
                last_seen: Timestamp(0),
                count: *count,
            })
            .collect()
    }

    fn summary(nodes: &[SubjectNode]) -> Vec<(&str, bool, u64)> {
        nodes
            .iter()
            .map(|n| (n.name.as_str(), n.is_leaf, n.message_count))
            .collect()
    }

    const ROOT: [&str; 0] = [];

    #[test]
    fn test_aggregates_by_level() {
        let subjects = stats(&[
            ("orders.new", 5),
            ("orders.cancel.eu", 2),
            ("orders.cancel.us", 3),
        ]);

        let root = project(&subjects, &ROOT);
        assert_eq!(summary(&root), vec![("orders", false, 10)]);
        assert!(root[0].has_children);

        let orders = project(&subjects, &["orders"]);
        assert_eq!(
            summary(&orders),
            vec![("cancel", false, 5), ("new", true, 5)]
        );

        let cancel = project(&subjects, &["orders", "cancel"]);
        assert_eq!(summary(&cancel), vec![("eu", true, 2), ("us", true, 3)]);
        assert!(cancel.iter().all(|n| !n.has_children));
    }

    #[test]
    fn test_subject_that_is_also_a_prefix() {
        let subjects = stats(&[("a", 1), ("a.b", 2)]);

        let root = project(&subjects, &ROOT);
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].name, "a");
        assert!(root[0].is_leaf);
        assert!(root[0].has_children);
        assert_eq!(root[0].message_count, 3);
    }

    #[test]
    fn test_no_match() {
        let subjects = stats(&[("orders.new", 1)]);
        assert!(project(&subjects, &["billing"]).is_empty());
        assert!(project(&[], &ROOT).is_empty());
    }

    #[test]
    fn test_prefix_must_end_on_token_boundary() {
        let subjects = stats(&[("orders.new", 1), ("ordersx.new", 4)]);

        let orders = project(&subjects, &["orders"]);
        assert_eq!(summary(&orders), vec![("new", true, 1)]);
    }

    #[test]
    fn test_path_equal_to_subject_has_no_children() {
        let subjects = stats(&[("orders", 7)]);
        assert!(project(&subjects, &["orders"]).is_empty());
    }

    #[test]
    fn test_empty_tokens_skipped() {
        let subjects = stats(&[("a..b", 1), ("a.c", 1)]);
        let a = project(&subjects, &["a"]);
        assert_eq!(summary(&a), vec![("c", true, 1)]);
    }

    #[test]
    fn test_path_of() {
        assert!(path_of("").is_empty());
        assert_eq!(path_of("orders.cancel.eu"), vec!["orders", "cancel", "eu"]);
    }

    fn arb_subjects() -> impl Strategy<Value = Vec<(String, u64)>> {
        prop::collection::btree_map("[a-c]{1,2}(\\.[a-c]{1,2}){0,3}", 1u64..1000, 0..40)
            .prop_map(|m| m.into_iter().collect())
    }

    proptest! {
        #[test]
        fn root_counts_sum_to_total(entries in arb_subjects()) {
            let refs: Vec<(&str, u64)> = entries.iter().map(|(n, c)| (n.as_str(), *c)).collect();
            let subjects = stats(&refs);
            let total: u64 = subjects.iter().map(|s| s.count).sum();

            let root = project(&subjects, &ROOT);
            prop_assert_eq!(root.iter().map(|n| n.message_count).sum::<u64>(), total);
        }

        #[test]
        fn names_sorted_and_unique(entries in arb_subjects(), token in "[a-c]{1,2}") {
            let refs: Vec<(&str, u64)> = entries.iter().map(|(n, c)| (n.as_str(), *c)).collect();
            let subjects = stats(&refs);

            for path in [vec![], vec![token.clone()]] {
                let nodes = project(&subjects, &path);
                for pair in nodes.windows(2) {
                    prop_assert!(pair[0].name < pair[1].name);
                }
            }
        }

        #[test]
        fn leaf_flags_match_subjects(entries in arb_subjects(), token in "[a-c]{1,2}") {
            let refs: Vec<(&str, u64)> = entries.iter().map(|(n, c)| (n.as_str(), *c)).collect();
            let subjects = stats(&refs);

            for node in project(&subjects, &[token.as_str()]) {
                let full = format!("{}.{}", token, node.name);
                let exact = subjects.iter().any(|s| s.name == full);
                let deeper = subjects.iter().any(|s| s.name.starts_with(&format!("{}.", full)));
                prop_assert_eq!(node.is_leaf, exact);
                prop_assert_eq!(node.has_children, deeper);
            }
        }
    }
}
