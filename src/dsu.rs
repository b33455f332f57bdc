//! # Disjoint Set Union (DSU)
//!
//! Union-Find over record positions. The matching engine unions every pair of
//! co-blocked records, so both operations stay amortized near-constant:
//! `find` compresses with path halving and `union` attaches by rank.
//!
//! The forest is built once per run and discarded; there are no deletions.

use crate::model::{ClusterId, RecordIndex};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Disjoint-set forest over the records `0..len`
#[derive(Debug, Clone)]
pub struct DisjointSet {
    /// Parent pointers; a root points at itself
    parent: Vec<u32>,
    /// Upper bound on tree height, only meaningful for roots
    rank: Vec<u8>,
    /// Current number of disjoint sets
    set_count: usize,
}

impl DisjointSet {
    /// Create a forest of `size` singleton sets
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size as u32).collect(),
            rank: vec![0; size],
            set_count: size,
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Find the root of a record (with path compression via path halving).
    /// Records outside the forest are treated as their own root.
    #[inline]
    pub fn find(&mut self, record: RecordIndex) -> RecordIndex {
        let mut current = record.as_usize();
        if current >= self.parent.len() {
            return record;
        }

        // Path halving: point every other node on the path to its grandparent
        while self.parent[current] as usize != current {
            let parent = self.parent[current] as usize;
            let grandparent = self.parent[parent];
            self.parent[current] = grandparent;
            current = grandparent as usize;
        }

        RecordIndex(current as u32)
    }

    /// Merge the sets containing `a` and `b`.
    ///
    /// The lower-rank root goes under the higher-rank root. On equal ranks the
    /// root of `a` survives and its rank grows by one. Returns `false` when the
    /// records already share a root.
    pub fn union(&mut self, a: RecordIndex, b: RecordIndex) -> bool {
        if a.as_usize() >= self.parent.len() || b.as_usize() >= self.parent.len() {
            return false;
        }

        let root_a = self.find(a).as_usize();
        let root_b = self.find(b).as_usize();
        if root_a == root_b {
            return false;
        }

        let rank_a = self.rank[root_a];
        let rank_b = self.rank[root_b];
        if rank_a < rank_b {
            self.parent[root_a] = root_b as u32;
        } else if rank_a > rank_b {
            self.parent[root_b] = root_a as u32;
        } else {
            self.parent[root_b] = root_a as u32;
            self.rank[root_a] = rank_a.saturating_add(1);
        }
        self.set_count -= 1;
        true
    }

    /// Check if two records are in the same set
    pub fn same_set(&mut self, a: RecordIndex, b: RecordIndex) -> bool {
        self.find(a) == self.find(b)
    }

    /// Get the number of disjoint sets
    pub fn set_count(&self) -> usize {
        self.set_count
    }

    /// Materialize the partition.
    ///
    /// Clusters are ordered by their lowest member and members are ascending,
    /// so cluster IDs are stable for a given input.
    pub fn clusters(&mut self) -> Clusters {
        let mut slot_by_root: FxHashMap<u32, usize> = FxHashMap::default();
        let mut clusters: Vec<Cluster> = Vec::with_capacity(self.set_count);

        for position in 0..self.parent.len() as u32 {
            let record = RecordIndex(position);
            let root = self.find(record);
            let slot = *slot_by_root.entry(root.0).or_insert_with(|| {
                clusters.push(Cluster::new(
                    ClusterId(clusters.len() as u32),
                    root,
                    Vec::new(),
                ));
                clusters.len() - 1
            });
            clusters[slot].records.push(record);
        }

        Clusters { clusters }
    }
}

/// A cluster of records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Identifier local to one matching run
    pub id: ClusterId,
    /// Union-Find root of this cluster
    pub root: RecordIndex,
    /// Member records, ascending
    pub records: Vec<RecordIndex>,
}

impl Cluster {
    pub fn new(id: ClusterId, root: RecordIndex, records: Vec<RecordIndex>) -> Self {
        Self { id, root, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_singleton(&self) -> bool {
        self.records.len() == 1
    }

    pub fn contains(&self, record: RecordIndex) -> bool {
        self.records.binary_search(&record).is_ok()
    }
}

/// Collection of all clusters of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clusters {
    pub clusters: Vec<Cluster>,
}

impl Clusters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id.0 as usize).filter(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter()
    }

    /// Get the number of clusters
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Total number of records across all clusters
    pub fn record_count(&self) -> usize {
        self.clusters.iter().map(Cluster::len).sum()
    }

    pub fn cluster_of(&self, record: RecordIndex) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.contains(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_forest_is_all_singletons() {
        let mut dsu = DisjointSet::new(3);
        assert_eq!(dsu.set_count(), 3);
        for i in 0..3 {
            assert_eq!(dsu.find(RecordIndex(i)), RecordIndex(i));
        }
    }

    #[test]
    fn test_union_merges_sets() {
        let mut dsu = DisjointSet::new(4);
        assert!(dsu.union(RecordIndex(0), RecordIndex(1)));
        assert!(dsu.same_set(RecordIndex(0), RecordIndex(1)));
        assert!(!dsu.same_set(RecordIndex(0), RecordIndex(2)));
        assert_eq!(dsu.set_count(), 3);
    }

    #[test]
    fn test_union_is_noop_when_already_joined() {
        let mut dsu = DisjointSet::new(3);
        dsu.union(RecordIndex(0), RecordIndex(1));
        dsu.union(RecordIndex(1), RecordIndex(2));
        assert!(!dsu.union(RecordIndex(0), RecordIndex(2)));
        assert!(!dsu.union(RecordIndex(2), RecordIndex(2)));
        assert_eq!(dsu.set_count(), 1);
    }

    #[test]
    fn test_union_tie_keeps_first_root() {
        let mut dsu = DisjointSet::new(2);
        dsu.union(RecordIndex(1), RecordIndex(0));
        assert_eq!(dsu.find(RecordIndex(0)), RecordIndex(1));
        assert_eq!(dsu.rank[1], 1);
        assert_eq!(dsu.rank[0], 0);
    }

    #[test]
    fn test_union_find_rank_optimization() {
        let mut dsu = DisjointSet::new(5);

        // Tree of rank 1 rooted at 0
        dsu.union(RecordIndex(0), RecordIndex(1));
        // Singleton 2 attaches under the taller tree regardless of argument order
        dsu.union(RecordIndex(2), RecordIndex(0));
        assert_eq!(dsu.find(RecordIndex(2)), RecordIndex(0));
        assert_eq!(dsu.rank[0], 1);

        // Two rank-1 trees merge and the surviving root grows
        dsu.union(RecordIndex(3), RecordIndex(4));
        dsu.union(RecordIndex(0), RecordIndex(3));
        assert_eq!(dsu.find(RecordIndex(4)), RecordIndex(0));
        assert_eq!(dsu.rank[0], 2);
    }

    #[test]
    fn test_find_halves_paths() {
        let mut dsu = DisjointSet::new(5);
        // Hand-built chain 4 -> 3 -> 2 -> 1 -> 0
        dsu.parent = vec![0, 0, 1, 2, 3];
        dsu.set_count = 1;

        assert_eq!(dsu.find(RecordIndex(4)), RecordIndex(0));
        assert_eq!(dsu.parent[4], 2);
        assert_eq!(dsu.parent[2], 0);

        assert_eq!(dsu.find(RecordIndex(4)), RecordIndex(0));
        assert_eq!(dsu.parent[4], 0);
    }

    #[test]
    fn test_out_of_range_records_are_self_roots() {
        let mut dsu = DisjointSet::new(2);
        assert_eq!(dsu.find(RecordIndex(9)), RecordIndex(9));
        assert!(!dsu.union(RecordIndex(0), RecordIndex(9)));
        assert_eq!(dsu.set_count(), 2);
    }

    #[test]
    fn test_clusters_partition_in_first_seen_order() {
        let mut dsu = DisjointSet::new(6);
        dsu.union(RecordIndex(4), RecordIndex(1));
        dsu.union(RecordIndex(5), RecordIndex(3));
        dsu.union(RecordIndex(1), RecordIndex(3));

        let clusters = dsu.clusters();
        assert_eq!(clusters.len(), 3);
        assert_eq!(clusters.record_count(), 6);

        let members: Vec<Vec<u32>> = clusters
            .iter()
            .map(|c| c.records.iter().map(|r| r.0).collect())
            .collect();
        assert_eq!(members, vec![vec![0], vec![1, 3, 4, 5], vec![2]]);
        assert_eq!(clusters.clusters[1].id, ClusterId(1));
        assert_eq!(
            clusters.cluster_of(RecordIndex(5)).map(|c| c.id),
            Some(ClusterId(1))
        );
    }

    #[test]
    fn test_empty_forest_has_no_clusters() {
        let mut dsu = DisjointSet::new(0);
        assert!(dsu.is_empty());
        assert!(dsu.clusters().is_empty());
    }
}
