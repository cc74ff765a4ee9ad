//! Tree nodes: recursive construction, retrieval and update.

use std::collections::{BTreeSet, HashSet};

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Result, SpillTreeError};
use crate::partition::{Thresholds, partition};
use crate::source::{DataSource, Key};
use crate::split::SplitRule;
use crate::vector::Vector;

/// Nodes with at least this many members build their children on the rayon
/// pool when parallel construction is enabled.
pub const PARALLEL_BUILD_THRESHOLD: usize = 1024;

/// Parameters shared by every node of one construction call.
pub(crate) struct BuildContext<'a, S: DataSource> {
    pub source: &'a S,
    pub rule: SplitRule,
    pub spill: f64,
    pub min_items: usize,
    pub dimension: usize,
    pub parallel: bool,
}

/// Split state of an internal node.
#[derive(Debug, Clone)]
pub struct Split<K> {
    direction: Vector,
    thresholds: Thresholds,
    left: Box<Node<K>>,
    right: Box<Node<K>>,
}

impl<K> Split<K> {
    /// The projection direction.
    pub fn direction(&self) -> &Vector {
        &self.direction
    }

    /// The `(lo, hi)` threshold pair.
    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// The left child (projections below `hi`).
    pub fn left(&self) -> &Node<K> {
        &self.left
    }

    /// The right child (projections at or above `lo`).
    pub fn right(&self) -> &Node<K> {
        &self.right
    }
}

/// A node of a spill tree. The root node is the tree.
///
/// A node is a leaf iff it has no split iff its height is 0.
#[derive(Debug, Clone)]
pub struct Node<K> {
    members: BTreeSet<K>,
    height: usize,
    split: Option<Split<K>>,
}

impl<K: Key> Node<K> {
    fn leaf(members: BTreeSet<K>) -> Self {
        Self {
            members,
            height: 0,
            split: None,
        }
    }

    /// Build a subtree over `members` with at most `budget` levels below it.
    pub(crate) fn build<S, R>(
        ctx: &BuildContext<'_, S>,
        members: BTreeSet<K>,
        budget: usize,
        rng: &mut R,
    ) -> Result<Self>
    where
        S: DataSource<Key = K>,
        R: Rng + ?Sized,
    {
        if budget == 0 || members.len() < ctx.min_items {
            return Ok(Self::leaf(members));
        }

        let keys: Vec<K> = members.iter().cloned().collect();
        let direction = ctx.rule.direction(ctx.source, &keys, ctx.dimension, rng)?;

        let projections = keys
            .iter()
            .map(|key| Ok(direction.dot(&ctx.source.vector_at(key)?.data)))
            .collect::<Result<Vec<f64>>>()?;
        let thresholds = Thresholds::from_projections(&projections, ctx.spill)
            .ok_or_else(|| SpillTreeError::numerical("no projections to threshold"))?;

        let (left_members, right_members) =
            partition(keys.into_iter().zip(projections), &thresholds);
        debug!(
            "split {} members with {} (budget {budget}): lo={:.4e} hi={:.4e} left={} right={}",
            members.len(),
            ctx.rule,
            thresholds.lo,
            thresholds.hi,
            left_members.len(),
            right_members.len()
        );

        // Child seeds are drawn before recursing so that parallel and
        // sequential builds see the same random streams.
        let left_seed: u64 = rng.random();
        let right_seed: u64 = rng.random();
        let child_budget = budget - 1;

        let (left, right) = if ctx.parallel && members.len() >= PARALLEL_BUILD_THRESHOLD {
            let (left, right) = rayon::join(
                || {
                    Self::build(
                        ctx,
                        left_members,
                        child_budget,
                        &mut StdRng::seed_from_u64(left_seed),
                    )
                },
                || {
                    Self::build(
                        ctx,
                        right_members,
                        child_budget,
                        &mut StdRng::seed_from_u64(right_seed),
                    )
                },
            );
            (left?, right?)
        } else {
            let left = Self::build(
                ctx,
                left_members,
                child_budget,
                &mut StdRng::seed_from_u64(left_seed),
            )?;
            let right = Self::build(
                ctx,
                right_members,
                child_budget,
                &mut StdRng::seed_from_u64(right_seed),
            )?;
            (left, right)
        };

        Ok(Self {
            members,
            height: 1 + left.height.max(right.height),
            split: Some(Split {
                direction,
                thresholds,
                left: Box::new(left),
                right: Box::new(right),
            }),
        })
    }

    /// Height of this subtree; 0 for a leaf.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Whether this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.split.is_none()
    }

    /// Split state, present iff the node is internal.
    pub fn split(&self) -> Option<&Split<K>> {
        self.split.as_ref()
    }

    /// The `(left, right)` children of an internal node.
    pub fn children(&self) -> Option<(&Node<K>, &Node<K>)> {
        self.split.as_ref().map(|s| (s.left.as_ref(), s.right.as_ref()))
    }

    /// Number of member keys.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the node holds no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Check whether `key` is a member of this subtree.
    pub fn contains(&self, key: &K) -> bool {
        self.members.contains(key)
    }

    /// Iterate over member keys in key order.
    pub fn members(&self) -> impl Iterator<Item = &K> + '_ {
        self.members.iter()
    }

    /// All leaves of this subtree, left to right.
    pub fn leaves(&self) -> Vec<&Node<K>> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Node<K>>) {
        match &self.split {
            None => out.push(self),
            Some(split) => {
                split.left.collect_leaves(out);
                split.right.collect_leaves(out);
            }
        }
    }

    /// Add the co-members of `key` in every leaf that holds it.
    pub(crate) fn collect_by_key(&self, key: &K, out: &mut HashSet<K>) {
        if !self.members.contains(key) {
            return;
        }
        match &self.split {
            None => out.extend(self.members.iter().filter(|k| *k != key).cloned()),
            Some(split) => {
                split.left.collect_by_key(key, out);
                split.right.collect_by_key(key, out);
            }
        }
    }

    /// Add the members of every leaf `query` routes to.
    pub(crate) fn collect_by_vector(&self, query: &[f32], out: &mut HashSet<K>) {
        match &self.split {
            None => out.extend(self.members.iter().cloned()),
            Some(split) => {
                let projection = split.direction.dot(query);
                if split.thresholds.goes_right(projection) {
                    split.right.collect_by_vector(query, out);
                }
                if split.thresholds.goes_left(projection) {
                    split.left.collect_by_vector(query, out);
                }
            }
        }
    }

    /// Parallel form of [`Node::collect_by_key`].
    pub(crate) fn par_retrieve_by_key(&self, key: &K) -> HashSet<K> {
        if !self.members.contains(key) {
            return HashSet::new();
        }
        match &self.split {
            None => self.members.iter().filter(|k| *k != key).cloned().collect(),
            Some(split) => {
                let (left, right) = rayon::join(
                    || split.left.par_retrieve_by_key(key),
                    || split.right.par_retrieve_by_key(key),
                );
                union(left, right)
            }
        }
    }

    /// Parallel form of [`Node::collect_by_vector`].
    pub(crate) fn par_retrieve_by_vector(&self, query: &[f32]) -> HashSet<K> {
        match &self.split {
            None => self.members.iter().cloned().collect(),
            Some(split) => {
                let projection = split.direction.dot(query);
                let (right, left) = rayon::join(
                    || {
                        if split.thresholds.goes_right(projection) {
                            split.right.par_retrieve_by_vector(query)
                        } else {
                            HashSet::new()
                        }
                    },
                    || {
                        if split.thresholds.goes_left(projection) {
                            split.left.par_retrieve_by_vector(query)
                        } else {
                            HashSet::new()
                        }
                    },
                );
                union(left, right)
            }
        }
    }

    /// Thread new entries down the existing splits.
    ///
    /// Never changes the shape, directions or thresholds of the subtree.
    pub(crate) fn update(&mut self, entries: &[(&K, &[f32])]) {
        self.members
            .extend(entries.iter().map(|(key, _)| (*key).clone()));

        let Some(split) = &mut self.split else {
            return;
        };

        let mut left = Vec::new();
        let mut right = Vec::new();
        for &(key, vector) in entries {
            let projection = split.direction.dot(vector);
            if split.thresholds.goes_right(projection) {
                right.push((key, vector));
            }
            if split.thresholds.goes_left(projection) {
                left.push((key, vector));
            }
        }

        split.left.update(&left);
        split.right.update(&right);
    }

    /// Visit every node of this subtree in pre-order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node<K>)) {
        visit(self);
        if let Some(split) = &self.split {
            split.left.walk(visit);
            split.right.walk(visit);
        }
    }
}

fn union<K: Key>(a: HashSet<K>, b: HashSet<K>) -> HashSet<K> {
    let (mut larger, smaller) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    larger.extend(smaller);
    larger
}
