//! Query types and bounded best-of-k selection.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::{Result, SpillTreeError};
use crate::source::Key;
use crate::vector::Vector;

/// What a retrieval or k-nearest query is anchored on.
#[derive(Debug, Clone, PartialEq)]
pub enum Query<K> {
    /// An existing member of the tree; the member itself is excluded from results.
    Key(K),
    /// An arbitrary point in the tree's space.
    Vector(Vector),
}

impl<K> Query<K> {
    /// Build a query from optional parts, preferring the key when both are given.
    ///
    /// Fails when neither a key nor a vector is supplied.
    pub fn from_parts(key: Option<K>, vector: Option<Vector>) -> Result<Self> {
        match (key, vector) {
            (Some(key), _) => Ok(Query::Key(key)),
            (None, Some(vector)) => Ok(Query::Vector(vector)),
            (None, None) => Err(SpillTreeError::query(
                "query must be supplied with either a key or a vector",
            )),
        }
    }

    /// Query anchored on a vector.
    pub fn vector(vector: impl Into<Vector>) -> Self {
        Query::Vector(vector.into())
    }
}

/// A candidate with its squared Euclidean distance to the query.
#[derive(Debug, Clone)]
pub struct Neighbor<K> {
    /// Key of the candidate.
    pub key: K,
    /// Squared Euclidean distance to the query.
    pub distance: f64,
}

impl<K: Key> PartialEq for Neighbor<K> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K: Key> Eq for Neighbor<K> {}

impl<K: Key> PartialOrd for Neighbor<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Key> Ord for Neighbor<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Closer first; ties broken by key.
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.key.cmp(&other.key))
    }
}

/// Keeps the `k` closest candidates seen so far.
///
/// Backed by a max-heap whose top is the current worst kept neighbor, so each
/// offer is `O(log k)` and the remainder is never sorted.
#[derive(Debug)]
pub struct NeighborCollector<K: Key> {
    k: usize,
    heap: BinaryHeap<Neighbor<K>>,
    offered: usize,
}

impl<K: Key> NeighborCollector<K> {
    /// Create a collector for the `k` nearest candidates.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(1024)),
            offered: 0,
        }
    }

    /// Offer a candidate.
    pub fn collect(&mut self, key: K, distance: f64) {
        self.offered += 1;
        if self.k == 0 {
            return;
        }

        let candidate = Neighbor { key, distance };
        if self.heap.len() < self.k {
            self.heap.push(candidate);
        } else if let Some(worst) = self.heap.peek()
            && candidate < *worst
        {
            self.heap.pop();
            self.heap.push(candidate);
        }
    }

    /// Distance of the worst kept neighbor once the collector is full.
    pub fn threshold(&self) -> Option<f64> {
        if self.heap.len() < self.k {
            None
        } else {
            self.heap.peek().map(|n| n.distance)
        }
    }

    /// Number of candidates offered so far.
    pub fn offered(&self) -> usize {
        self.offered
    }

    /// Consume the collector, returning neighbors by ascending distance.
    pub fn into_sorted_vec(self) -> Vec<Neighbor<K>> {
        self.heap.into_sorted_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_from_parts() {
        let query: Query<u32> = Query::from_parts(Some(3), None).unwrap();
        assert_eq!(query, Query::Key(3));

        let query: Query<u32> = Query::from_parts(None, Some(Vector::from([1.0f32]))).unwrap();
        assert!(matches!(query, Query::Vector(_)));

        let err = Query::<u32>::from_parts(None, None).unwrap_err();
        assert!(matches!(err, SpillTreeError::Query(_)));
    }

    #[test]
    fn test_collector_keeps_k_smallest() {
        let mut collector = NeighborCollector::new(3);
        for (key, distance) in [(1, 5.0), (2, 1.0), (3, 4.0), (4, 0.5), (5, 9.0), (6, 2.0)] {
            collector.collect(key, distance);
        }
        assert_eq!(collector.offered(), 6);
        assert_eq!(collector.threshold(), Some(2.0));

        let keys: Vec<i32> = collector.into_sorted_vec().into_iter().map(|n| n.key).collect();
        assert_eq!(keys, vec![4, 2, 6]);
    }

    #[test]
    fn test_collector_with_fewer_candidates_than_k() {
        let mut collector = NeighborCollector::new(10);
        collector.collect("b", 2.0);
        collector.collect("a", 2.0);
        assert_eq!(collector.threshold(), None);

        let keys: Vec<&str> = collector.into_sorted_vec().into_iter().map(|n| n.key).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
