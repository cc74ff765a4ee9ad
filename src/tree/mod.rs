//! The spill tree: construction entry points, queries and incremental update.
//!
//! # Example
//!
//! ```
//! use spilltree::{DenseSource, Query, SpillTree, SpillTreeConfig, SplitRule};
//!
//! let source = DenseSource::new((0..200).map(|i| vec![i as f32, (i % 7) as f32])).unwrap();
//! let config = SpillTreeConfig::new()
//!     .with_rule(SplitRule::Kd)
//!     .with_spill(0.25)
//!     .with_height(3)
//!     .with_min_items(8)
//!     .with_seed(42);
//! let tree = SpillTree::build(&source, config).unwrap();
//!
//! let neighbors = tree.k_nearest(&source, &Query::vector([10.0f32, 3.0]), 5).unwrap();
//! assert_eq!(neighbors.len(), 5);
//! ```

pub mod node;

use std::collections::{BTreeSet, HashSet};
use std::time::Instant;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SpillTreeConfig;
use crate::error::{Result, SpillTreeError};
use crate::partition::Thresholds;
use crate::search::{Neighbor, NeighborCollector, Query};
use crate::source::{Addressing, DataSource, Key};
use crate::split::SplitRule;
use crate::vector::Vector;

pub use node::{Node, PARALLEL_BUILD_THRESHOLD, Split};
use node::BuildContext;

/// Approximate nearest-neighbor index over the keys of a data source.
///
/// The tree stores keys only; vectors are looked up in the data source during
/// construction and k-nearest queries. Shape, directions and thresholds are
/// fixed at construction; [`SpillTree::update`] only adds members.
#[derive(Debug, Clone)]
pub struct SpillTree<K: Key> {
    root: Node<K>,
    config: SpillTreeConfig,
    addressing: Addressing,
    dimension: usize,
}

/// Shape summary of a built tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeStats {
    /// Total number of nodes.
    pub nodes: usize,
    /// Number of leaves.
    pub leaves: usize,
    /// Height of the root.
    pub height: usize,
    /// Number of distinct member keys.
    pub members: usize,
    /// Sum of leaf sizes; counts spilled keys once per leaf.
    pub leaf_members: usize,
    /// Size of the largest leaf.
    pub max_leaf_size: usize,
    /// Mean leaf size.
    pub mean_leaf_size: f64,
    /// `leaf_members / members`; 1.0 for a strict partition.
    pub duplication: f64,
}

impl<K: Key> SpillTree<K> {
    /// Build a tree over every key of `source`.
    pub fn build<S>(source: &S, config: SpillTreeConfig) -> Result<Self>
    where
        S: DataSource<Key = K>,
    {
        Self::build_with_keys(source, source.keys(), config)
    }

    /// Build a tree over an explicit subset of the source's keys.
    ///
    /// The split-rule random source is seeded from `config.seed` when set.
    pub fn build_with_keys<S>(
        source: &S,
        keys: impl IntoIterator<Item = K>,
        config: SpillTreeConfig,
    ) -> Result<Self>
    where
        S: DataSource<Key = K>,
    {
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let mut rng = StdRng::seed_from_u64(seed);
        Self::build_with_rng(source, keys, config, &mut rng)
    }

    /// Build a tree drawing split-rule randomness from `rng`.
    ///
    /// `config.seed` is ignored.
    pub fn build_with_rng<S, R>(
        source: &S,
        keys: impl IntoIterator<Item = K>,
        config: SpillTreeConfig,
        rng: &mut R,
    ) -> Result<Self>
    where
        S: DataSource<Key = K>,
        R: Rng + ?Sized,
    {
        let start = Instant::now();
        config.validate()?;

        let members: BTreeSet<K> = keys.into_iter().collect();
        let dimension = match members.first() {
            Some(first) => source.vector_at(first)?.dimension(),
            None => source.dimension(),
        };
        for key in &members {
            source.vector_at(key)?.validate_dimension(dimension)?;
        }

        let height = config.resolve_height(members.len())?;
        let ctx = BuildContext {
            source,
            rule: config.rule,
            spill: config.spill,
            min_items: config.min_items,
            dimension,
            parallel: config.parallel_build,
        };
        let root = Node::build(&ctx, members, height, rng)?;

        info!(
            "built {} tree over {} members: height {} (budget {height}), spill {}, {:?}",
            config.rule,
            root.len(),
            root.height(),
            config.spill,
            start.elapsed()
        );

        Ok(Self {
            root,
            config,
            addressing: source.addressing(),
            dimension,
        })
    }

    /// Height of the tree; 0 when the root is a leaf.
    pub fn height(&self) -> usize {
        self.root.height()
    }

    /// The split rule used at every node.
    pub fn rule(&self) -> SplitRule {
        self.config.rule
    }

    /// The spill fraction used at every node.
    pub fn spill(&self) -> f64 {
        self.config.spill
    }

    /// Minimum member count for a node to split.
    pub fn min_items(&self) -> usize {
        self.config.min_items
    }

    /// The configuration the tree was built with.
    pub fn config(&self) -> &SpillTreeConfig {
        &self.config
    }

    /// Addressing kind of the source the tree was built over.
    pub fn addressing(&self) -> Addressing {
        self.addressing
    }

    /// Dimensionality of member vectors.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Root split direction and thresholds, if the root is internal.
    pub fn split(&self) -> Option<(&Vector, &Thresholds)> {
        self.root.split().map(|s| (s.direction(), s.thresholds()))
    }

    /// The root node.
    pub fn root(&self) -> &Node<K> {
        &self.root
    }

    /// Number of member keys.
    pub fn len(&self) -> usize {
        self.root.len()
    }

    /// Whether the tree holds no members.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Check whether `key` is a member.
    ///
    /// Distinguishes an absent key from a member whose retrieval set is empty.
    pub fn contains(&self, key: &K) -> bool {
        self.root.contains(key)
    }

    /// Iterate over member keys in key order.
    pub fn iter(&self) -> impl Iterator<Item = &K> + '_ {
        self.root.members()
    }

    /// Co-members of `key` across every leaf that holds it, excluding `key`.
    ///
    /// Returns an empty set when `key` is not a member.
    pub fn retrieve_by_key(&self, key: &K) -> HashSet<K> {
        let mut out = HashSet::new();
        self.root.collect_by_key(key, &mut out);
        out
    }

    /// Members of every leaf the query vector routes to.
    pub fn retrieve_by_vector(&self, query: &[f32]) -> Result<HashSet<K>> {
        self.check_query(query)?;
        let mut out = HashSet::new();
        self.root.collect_by_vector(query, &mut out);
        Ok(out)
    }

    /// [`SpillTree::retrieve_by_key`] descending sibling subtrees on the rayon pool.
    pub fn par_retrieve_by_key(&self, key: &K) -> HashSet<K> {
        self.root.par_retrieve_by_key(key)
    }

    /// [`SpillTree::retrieve_by_vector`] descending sibling subtrees on the rayon pool.
    pub fn par_retrieve_by_vector(&self, query: &[f32]) -> Result<HashSet<K>> {
        self.check_query(query)?;
        Ok(self.root.par_retrieve_by_vector(query))
    }

    /// Candidate set for a query, before distance ranking.
    pub fn retrieval_set(&self, query: &Query<K>) -> Result<HashSet<K>> {
        match query {
            Query::Key(key) => Ok(self.retrieve_by_key(key)),
            Query::Vector(vector) => self.retrieve_by_vector(&vector.data),
        }
    }

    /// Keys of the `k` approximate nearest neighbors, closest first.
    pub fn k_nearest<S>(&self, source: &S, query: &Query<K>, k: usize) -> Result<Vec<K>>
    where
        S: DataSource<Key = K>,
    {
        Ok(self
            .k_nearest_with_distances(source, query, k)?
            .into_iter()
            .map(|neighbor| neighbor.key)
            .collect())
    }

    /// The `k` approximate nearest neighbors with squared Euclidean distances.
    ///
    /// Candidates come from [`SpillTree::retrieval_set`]; fewer than `k` are
    /// returned when the retrieval set is smaller.
    pub fn k_nearest_with_distances<S>(
        &self,
        source: &S,
        query: &Query<K>,
        k: usize,
    ) -> Result<Vec<Neighbor<K>>>
    where
        S: DataSource<Key = K>,
    {
        if k < 1 {
            return Err(SpillTreeError::config("k must be a positive integer"));
        }

        let (point, candidates) = match query {
            Query::Key(key) => (source.vector_at(key)?, self.retrieve_by_key(key)),
            Query::Vector(vector) => (vector, self.retrieve_by_vector(&vector.data)?),
        };

        let mut collector = NeighborCollector::new(k);
        for candidate in candidates {
            let distance = point.squared_distance(&source.vector_at(&candidate)?.data);
            collector.collect(candidate, distance);
        }

        debug!(
            "k_nearest k={k}: {} candidates, threshold {:?}",
            collector.offered(),
            collector.threshold()
        );
        Ok(collector.into_sorted_vec())
    }

    /// Add new key/vector pairs without changing the tree's shape.
    ///
    /// Only trees built over a key-addressed source accept updates. Every
    /// entry is validated before any node is touched. The caller is
    /// responsible for making the same vectors available from the data source
    /// used for later k-nearest queries.
    pub fn update<V>(&mut self, entries: impl IntoIterator<Item = (K, V)>) -> Result<()>
    where
        V: Into<Vector>,
    {
        if !self.addressing.supports_update() {
            return Err(SpillTreeError::capability(
                "update is only supported for trees over key-addressed sources",
            ));
        }

        let entries: Vec<(K, Vector)> = entries
            .into_iter()
            .map(|(key, vector)| (key, vector.into()))
            .collect();
        if entries.is_empty() {
            return Ok(());
        }

        let dimension = if self.dimension == 0 {
            entries[0].1.dimension()
        } else {
            self.dimension
        };
        for (key, vector) in &entries {
            vector.validate_dimension(dimension)?;
            if !vector.is_valid() {
                return Err(SpillTreeError::invalid_vector(format!(
                    "vector for key {key:?} contains invalid values (NaN or infinity)"
                )));
            }
        }
        self.dimension = dimension;

        let refs: Vec<(&K, &[f32])> = entries
            .iter()
            .map(|(key, vector)| (key, vector.as_slice()))
            .collect();
        self.root.update(&refs);

        debug!("updated tree with {} entries, now {} members", refs.len(), self.len());
        Ok(())
    }

    /// Summarise the tree's shape.
    pub fn stats(&self) -> TreeStats {
        let mut nodes = 0;
        let mut leaves = 0;
        let mut leaf_members = 0;
        let mut max_leaf_size = 0;
        self.root.walk(&mut |node| {
            nodes += 1;
            if node.is_leaf() {
                leaves += 1;
                leaf_members += node.len();
                max_leaf_size = max_leaf_size.max(node.len());
            }
        });

        let members = self.len();
        TreeStats {
            nodes,
            leaves,
            height: self.height(),
            members,
            leaf_members,
            max_leaf_size,
            mean_leaf_size: if leaves > 0 {
                leaf_members as f64 / leaves as f64
            } else {
                0.0
            },
            duplication: if members > 0 {
                leaf_members as f64 / members as f64
            } else {
                1.0
            },
        }
    }

    fn check_query(&self, query: &[f32]) -> Result<()> {
        if self.dimension > 0 && query.len() != self.dimension {
            return Err(SpillTreeError::dimension_mismatch(self.dimension, query.len()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{DenseSource, KeyedSource};

    fn grid_source() -> DenseSource {
        DenseSource::new((0..100).map(|i| vec![(i % 10) as f32, (i / 10) as f32])).unwrap()
    }

    fn config() -> SpillTreeConfig {
        SpillTreeConfig::new()
            .with_spill(0.2)
            .with_height(3)
            .with_min_items(4)
            .with_seed(1)
    }

    #[test]
    fn test_build_accessors() {
        let source = grid_source();
        let tree = SpillTree::build(&source, config()).unwrap();

        assert_eq!(tree.len(), 100);
        assert_eq!(tree.dimension(), 2);
        assert_eq!(tree.height(), 3);
        assert_eq!(tree.rule(), SplitRule::Kd);
        assert_eq!(tree.spill(), 0.2);
        assert_eq!(tree.min_items(), 4);
        assert_eq!(tree.addressing(), Addressing::Positional);
        assert!(tree.split().is_some());
        assert!(tree.contains(&42));
        assert!(!tree.contains(&100));
        assert_eq!(tree.iter().count(), 100);
    }

    #[test]
    fn test_invalid_spill_fails() {
        let source = grid_source();
        let result = SpillTree::build(&source, config().with_spill(1.0));
        assert!(matches!(result, Err(SpillTreeError::Config(_))));
    }

    #[test]
    fn test_unknown_key_fails_build() {
        let source = grid_source();
        let result = SpillTree::build_with_keys(&source, [1, 2, 500], config());
        assert!(matches!(result, Err(SpillTreeError::NotFound(_))));
    }

    #[test]
    fn test_default_height_for_small_sets_is_leaf() {
        let source = grid_source();
        let tree = SpillTree::build(&source, SpillTreeConfig::new()).unwrap();
        assert!(tree.root().is_leaf());
        assert_eq!(tree.height(), 0);
    }

    #[test]
    fn test_seeded_builds_are_identical() {
        // Large enough that the root and its children take the rayon branch.
        let source =
            DenseSource::new((0..2048).map(|i| vec![(i % 64) as f32, (i / 64) as f32])).unwrap();
        assert!(source.len() >= 2 * PARALLEL_BUILD_THRESHOLD);
        let cfg = config()
            .with_rule(SplitRule::random_projection())
            .with_min_items(16);
        let a = SpillTree::build(&source, cfg.clone()).unwrap();
        let b = SpillTree::build(&source, cfg.clone().with_parallel_build(true)).unwrap();

        let leaves_a: Vec<Vec<usize>> = a
            .root()
            .leaves()
            .iter()
            .map(|leaf| leaf.members().copied().collect())
            .collect();
        let leaves_b: Vec<Vec<usize>> = b
            .root()
            .leaves()
            .iter()
            .map(|leaf| leaf.members().copied().collect())
            .collect();
        assert_eq!(leaves_a, leaves_b);
    }

    #[test]
    fn test_query_dimension_checked() {
        let source = grid_source();
        let tree = SpillTree::build(&source, config()).unwrap();
        assert!(matches!(
            tree.retrieve_by_vector(&[1.0, 2.0, 3.0]),
            Err(SpillTreeError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_k_zero_is_config_error() {
        let source = grid_source();
        let tree = SpillTree::build(&source, config()).unwrap();
        let result = tree.k_nearest(&source, &Query::Key(0), 0);
        assert!(matches!(result, Err(SpillTreeError::Config(_))));
    }

    #[test]
    fn test_stats() {
        let source = grid_source();
        let tree = SpillTree::build(&source, config()).unwrap();
        let stats = tree.stats();

        assert_eq!(stats.members, 100);
        assert_eq!(stats.height, 3);
        assert_eq!(stats.nodes, 2 * stats.leaves - 1);
        assert!(stats.duplication >= 1.0);
        assert!(stats.max_leaf_size as f64 >= stats.mean_leaf_size);
    }

    #[test]
    fn test_update_on_empty_keyed_tree() {
        let source: KeyedSource<String> = KeyedSource::new();
        let mut tree = SpillTree::build(&source, SpillTreeConfig::new()).unwrap();
        assert!(tree.is_empty());

        tree.update([("a".to_string(), vec![1.0f32, 2.0])]).unwrap();
        assert_eq!(tree.dimension(), 2);
        assert!(tree.contains(&"a".to_string()));
        assert!(tree.update([("b".to_string(), vec![1.0f32])]).is_err());
    }
}
