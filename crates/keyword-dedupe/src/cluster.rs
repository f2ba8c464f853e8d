//! Union-find clustering of candidate pairs.
//!
//! A cluster is a connected component of the candidate graph. Members are
//! sorted by ascending id; the first member (lowest, oldest id) is the
//! primary that survives merging.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use keyword_types::KeywordId;

use crate::candidates::SimilarityPair;

/// Disjoint-set forest keyed by keyword id, scoped to one clustering call.
///
/// `find` compresses paths; `union` hangs the second root under the first
/// without rank balancing.
#[derive(Debug, Default)]
pub struct UnionFind {
    parent: HashMap<KeywordId, KeywordId>,
    order: Vec<KeywordId>,
}

impl UnionFind {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` as its own set if unseen.
    pub fn make_set(&mut self, id: KeywordId) {
        if !self.parent.contains_key(&id) {
            self.parent.insert(id, id);
            self.order.push(id);
        }
    }

    /// Root of the set containing `id`. Registers `id` if unseen.
    pub fn find(&mut self, id: KeywordId) -> KeywordId {
        self.make_set(id);

        let mut root = id;
        while let Some(&parent) = self.parent.get(&root) {
            if parent == root {
                break;
            }
            root = parent;
        }

        let mut node = id;
        while node != root {
            let next = self.parent[&node];
            self.parent.insert(node, root);
            node = next;
        }
        root
    }

    /// Merge the sets of `a` and `b`.
    pub fn union(&mut self, a: KeywordId, b: KeywordId) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent.insert(rb, ra);
        }
    }

    /// Ids in first-seen order.
    pub fn ids(&self) -> &[KeywordId] {
        &self.order
    }
}

/// A set of keywords judged to be duplicates of each other.
///
/// Always holds at least two distinct ids, so a primary and one secondary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    members: Vec<KeywordId>,
}

impl Cluster {
    /// Build a cluster from ids in any order.
    ///
    /// Returns `None` when fewer than two distinct ids are given.
    pub fn new(mut members: Vec<KeywordId>) -> Option<Self> {
        members.sort_unstable();
        members.dedup();
        (members.len() >= 2).then_some(Self { members })
    }

    /// Member ids, ascending.
    pub fn members(&self) -> &[KeywordId] {
        &self.members
    }

    /// Surviving record: the lowest id.
    pub fn primary(&self) -> KeywordId {
        self.members[0]
    }

    /// Members to be merged into the primary, ascending.
    pub fn secondaries(&self) -> &[KeywordId] {
        &self.members[1..]
    }
}

/// Group pairs into connected components.
///
/// Singletons never appear. Components larger than `max_cluster_size` are
/// dropped whole as probable false-positive mega-clusters. Clusters come
/// out in the order their first member was seen in `pairs`.
pub fn cluster_pairs(pairs: &[SimilarityPair], max_cluster_size: Option<usize>) -> Vec<Cluster> {
    let mut uf = UnionFind::new();
    for pair in pairs {
        uf.union(pair.a, pair.b);
    }

    let ids = uf.ids().to_vec();
    let mut slot_of_root: HashMap<KeywordId, usize> = HashMap::new();
    let mut groups: Vec<Vec<KeywordId>> = Vec::new();
    for id in ids {
        let root = uf.find(id);
        let slot = *slot_of_root.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(id);
    }

    let mut clusters = Vec::with_capacity(groups.len());
    for group in groups {
        if let Some(max) = max_cluster_size {
            if group.len() > max {
                warn!(
                    size = group.len(),
                    max_cluster_size = max,
                    "Dropping oversized cluster"
                );
                continue;
            }
        }
        clusters.extend(Cluster::new(group));
    }

    debug!(pairs = pairs.len(), clusters = clusters.len(), "Clustered candidate pairs");
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashSet};

    fn pair(a: KeywordId, b: KeywordId) -> SimilarityPair {
        SimilarityPair::new(a, b, 0.9)
    }

    fn as_sets(clusters: &[Cluster]) -> BTreeSet<Vec<KeywordId>> {
        clusters.iter().map(|c| c.members.clone()).collect()
    }

    #[test]
    fn test_union_find_basic() {
        let mut uf = UnionFind::new();
        uf.union(1, 2);
        uf.union(3, 4);
        assert_eq!(uf.find(1), uf.find(2));
        assert_ne!(uf.find(1), uf.find(3));
        uf.union(2, 4);
        assert_eq!(uf.find(1), uf.find(3));
    }

    #[test]
    fn test_union_attaches_second_root_under_first() {
        let mut uf = UnionFind::new();
        uf.union(5, 9);
        assert_eq!(uf.find(9), 5);
        uf.union(7, 9);
        assert_eq!(uf.find(7), 7);
        assert_eq!(uf.find(5), 7);
    }

    #[test]
    fn test_transitive_closure() {
        let clusters = cluster_pairs(&[pair(1, 2), pair(2, 3), pair(10, 11)], None);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members, vec![1, 2, 3]);
        assert_eq!(clusters[1].members, vec![10, 11]);
    }

    #[test]
    fn test_primary_is_min_id() {
        let clusters = cluster_pairs(&[pair(9, 4), pair(7, 4)], None);
        assert_eq!(clusters[0].primary(), 4);
        assert_eq!(clusters[0].secondaries(), &[7, 9]);
    }

    #[test]
    fn test_first_seen_order() {
        let clusters = cluster_pairs(&[pair(50, 51), pair(1, 2), pair(51, 52)], None);
        assert_eq!(clusters[0].members, vec![50, 51, 52]);
        assert_eq!(clusters[1].members, vec![1, 2]);
    }

    #[test]
    fn test_clustering_idempotent() {
        let pairs = vec![pair(1, 2), pair(3, 4), pair(4, 5), pair(8, 2), pair(6, 7)];
        let first = cluster_pairs(&pairs, None);
        let second = cluster_pairs(&pairs, None);
        assert_eq!(first, second);

        let mut reversed = pairs.clone();
        reversed.reverse();
        assert_eq!(as_sets(&first), as_sets(&cluster_pairs(&reversed, None)));
    }

    #[test]
    fn test_clusters_disjoint() {
        let pairs = vec![pair(1, 2), pair(3, 4), pair(4, 5), pair(8, 2), pair(6, 7)];
        let clusters = cluster_pairs(&pairs, None);
        let mut seen = HashSet::new();
        for cluster in &clusters {
            for id in &cluster.members {
                assert!(seen.insert(*id), "id {id} in two clusters");
            }
        }
    }

    #[test]
    fn test_oversized_cluster_dropped() {
        let pairs = vec![pair(1, 2), pair(2, 3), pair(3, 4), pair(10, 11)];
        let clusters = cluster_pairs(&pairs, Some(3));
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members, vec![10, 11]);
    }

    #[test]
    fn test_cluster_needs_two_distinct_members() {
        assert!(Cluster::new(vec![]).is_none());
        assert!(Cluster::new(vec![7]).is_none());
        assert!(Cluster::new(vec![7, 7]).is_none());

        let cluster = Cluster::new(vec![9, 3, 9, 5]).unwrap();
        assert_eq!(cluster.members(), &[3, 5, 9]);
        assert_eq!(cluster.primary(), 3);
        assert_eq!(cluster.secondaries(), &[5, 9]);
    }

    #[test]
    fn test_no_pairs_no_clusters() {
        assert!(cluster_pairs(&[], None).is_empty());
    }
}
