//! Data source abstraction consumed by the tree.
//!
//! A tree never owns vectors. It stores keys and asks a [`DataSource`] for the
//! vector behind a key whenever it needs to project or measure a point. Two
//! concrete sources are provided: [`DenseSource`], addressed by position, and
//! [`KeyedSource`], addressed by caller-supplied keys.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::error::{Result, SpillTreeError};
use crate::vector::Vector;

/// Bounds every key type must satisfy.
///
/// Keys must be totally ordered as well as hashable. Node members are kept in
/// key order, so a seeded build visits members identically on every run and
/// reproduces the same tree. Token types without a natural order can derive
/// `Ord` or be mapped to an ordered surrogate such as an integer id.
pub trait Key: Clone + Eq + Hash + Ord + Debug + Send + Sync {}

impl<T> Key for T where T: Clone + Eq + Hash + Ord + Debug + Send + Sync {}

/// How a data source addresses its vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// Keys are positions `0..n`; the key universe is fixed.
    Positional,
    /// Keys are arbitrary caller tokens; new entries may be added.
    Keyed,
}

impl Addressing {
    /// Whether trees over this kind of source accept incremental updates.
    pub fn supports_update(self) -> bool {
        matches!(self, Addressing::Keyed)
    }
}

/// A collection of same-dimension vectors addressed by key.
pub trait DataSource: Send + Sync {
    /// The key type addressing vectors in this source.
    type Key: Key;

    /// The addressing capability of this source.
    fn addressing(&self) -> Addressing;

    /// Dimensionality shared by every vector, or 0 for an empty source.
    fn dimension(&self) -> usize;

    /// Number of vectors in the source.
    fn len(&self) -> usize;

    /// Whether the source holds no vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up the vector stored under `key`.
    fn vector_at(&self, key: &Self::Key) -> Result<&Vector>;

    /// Iterate over the full key universe.
    fn keys(&self) -> Box<dyn Iterator<Item = Self::Key> + '_>;
}

/// Check that a vector can be stored next to vectors of `dimension`.
///
/// A `dimension` of 0 means the source is still empty and accepts any length.
fn check_vector(vector: &Vector, dimension: usize) -> Result<()> {
    if dimension > 0 {
        vector.validate_dimension(dimension)?;
    }
    if !vector.is_valid() {
        return Err(SpillTreeError::invalid_vector(
            "vector contains invalid values (NaN or infinity)",
        ));
    }
    Ok(())
}

/// A position-addressed source: vector `i` has key `i`.
#[derive(Debug, Clone, Default)]
pub struct DenseSource {
    vectors: Vec<Vector>,
    dimension: usize,
}

impl DenseSource {
    /// Create a source from an ordered collection of vectors.
    ///
    /// Fails if the vectors disagree on dimension or contain non-finite values.
    pub fn new<V: Into<Vector>>(vectors: impl IntoIterator<Item = V>) -> Result<Self> {
        let vectors: Vec<Vector> = vectors.into_iter().map(Into::into).collect();
        let dimension = vectors.first().map(Vector::dimension).unwrap_or(0);
        for vector in &vectors {
            check_vector(vector, dimension)?;
        }
        Ok(Self { vectors, dimension })
    }

    /// Borrow all vectors in position order.
    pub fn vectors(&self) -> &[Vector] {
        &self.vectors
    }
}

impl DataSource for DenseSource {
    type Key = usize;

    fn addressing(&self) -> Addressing {
        Addressing::Positional
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn vector_at(&self, key: &usize) -> Result<&Vector> {
        self.vectors
            .get(*key)
            .ok_or_else(|| {
                SpillTreeError::not_found(format!("position {key} (len {})", self.len()))
            })
    }

    fn keys(&self) -> Box<dyn Iterator<Item = usize> + '_> {
        Box::new(0..self.vectors.len())
    }
}

/// A key-addressed source backed by a hash map.
#[derive(Debug, Clone)]
pub struct KeyedSource<K: Key> {
    vectors: HashMap<K, Vector>,
    dimension: usize,
}

impl<K: Key> Default for KeyedSource<K> {
    fn default() -> Self {
        Self {
            vectors: HashMap::new(),
            dimension: 0,
        }
    }
}

impl<K: Key> KeyedSource<K> {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source from key/vector pairs.
    pub fn from_entries<V: Into<Vector>>(
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self> {
        let mut source = Self::new();
        source.extend(entries)?;
        Ok(source)
    }

    /// Insert or replace the vector stored under `key`.
    ///
    /// Returns the previous vector, if any.
    pub fn insert(&mut self, key: K, vector: impl Into<Vector>) -> Result<Option<Vector>> {
        let vector = vector.into();
        check_vector(&vector, self.dimension)?;
        if self.dimension == 0 {
            self.dimension = vector.dimension();
        }
        Ok(self.vectors.insert(key, vector))
    }

    /// Insert every pair, stopping at the first invalid vector.
    pub fn extend<V: Into<Vector>>(
        &mut self,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Result<()> {
        for (key, vector) in entries {
            self.insert(key, vector)?;
        }
        Ok(())
    }

    /// Check whether a key is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.vectors.contains_key(key)
    }
}

impl<K: Key> DataSource for KeyedSource<K> {
    type Key = K;

    fn addressing(&self) -> Addressing {
        Addressing::Keyed
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn vector_at(&self, key: &K) -> Result<&Vector> {
        self.vectors
            .get(key)
            .ok_or_else(|| SpillTreeError::not_found(format!("key {key:?}")))
    }

    fn keys(&self) -> Box<dyn Iterator<Item = K> + '_> {
        Box::new(self.vectors.keys().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_source() {
        let source = DenseSource::new([[0.0f32, 1.0], [2.0, 3.0]]).unwrap();
        assert_eq!(source.addressing(), Addressing::Positional);
        assert_eq!(source.dimension(), 2);
        assert_eq!(source.keys().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(source.vector_at(&1).unwrap().data, vec![2.0, 3.0]);
        assert!(matches!(
            source.vector_at(&2),
            Err(SpillTreeError::NotFound(_))
        ));
    }

    #[test]
    fn test_dense_source_rejects_mixed_dimensions() {
        let result = DenseSource::new(vec![vec![0.0f32, 1.0], vec![2.0]]);
        assert!(matches!(
            result,
            Err(SpillTreeError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_keyed_source() {
        let mut source =
            KeyedSource::from_entries([("a", [1.0f32, 0.0]), ("b", [0.0, 1.0])]).unwrap();
        assert_eq!(source.addressing(), Addressing::Keyed);
        assert!(source.addressing().supports_update());
        assert_eq!(source.dimension(), 2);
        assert_eq!(source.len(), 2);

        let previous = source.insert("a", [5.0f32, 5.0]).unwrap();
        assert_eq!(previous.map(|v| v.data), Some(vec![1.0, 0.0]));
        assert!(source.insert("c", [1.0f32, 2.0, 3.0]).is_err());
        assert!(source.insert("d", [f32::INFINITY, 0.0]).is_err());
        assert!(!source.contains_key(&"c"));

        let mut keys: Vec<_> = source.keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
