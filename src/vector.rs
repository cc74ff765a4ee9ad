//! Dense vector type shared by data sources, split rules and queries.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpillTreeError};

/// A dense, fixed-length vector of `f32` coordinates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    /// The vector coordinates.
    pub data: Vec<f32>,
}

impl Vector {
    /// Create a new vector from its coordinates.
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// Create the zero vector of the given dimension.
    pub fn zeros(dimension: usize) -> Self {
        Self {
            data: vec![0.0; dimension],
        }
    }

    /// Create the standard basis vector `e_axis` of the given dimension.
    pub fn basis(dimension: usize, axis: usize) -> Self {
        let mut data = vec![0.0; dimension];
        if let Some(value) = data.get_mut(axis) {
            *value = 1.0;
        }
        Self { data }
    }

    /// Get the dimensionality of this vector.
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Borrow the coordinates.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Calculate the L2 norm (magnitude) of this vector.
    pub fn norm(&self) -> f32 {
        self.data.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Normalize this vector to unit length.
    ///
    /// The zero vector is left unchanged.
    pub fn normalize(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            for value in &mut self.data {
                *value /= norm;
            }
        }
    }

    /// Get a normalized copy of this vector.
    pub fn normalized(&self) -> Self {
        let mut normalized = self.clone();
        normalized.normalize();
        normalized
    }

    /// Dot product with a coordinate slice, accumulated in `f64`.
    pub fn dot(&self, other: &[f32]) -> f64 {
        project(&self.data, other)
    }

    /// Squared Euclidean distance to a coordinate slice, accumulated in `f64`.
    pub fn squared_distance(&self, other: &[f32]) -> f64 {
        squared_distance(&self.data, other)
    }

    /// Validate that this vector has the expected dimension.
    pub fn validate_dimension(&self, expected_dim: usize) -> Result<()> {
        if self.data.len() != expected_dim {
            return Err(SpillTreeError::dimension_mismatch(
                expected_dim,
                self.data.len(),
            ));
        }
        Ok(())
    }

    /// Check if this vector contains any NaN or infinite values.
    pub fn is_valid(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}

impl<const N: usize> From<[f32; N]> for Vector {
    fn from(data: [f32; N]) -> Self {
        Self::new(data.to_vec())
    }
}

impl AsRef<[f32]> for Vector {
    fn as_ref(&self) -> &[f32] {
        &self.data
    }
}

/// Project `x` onto `direction`.
///
/// Construction, update and retrieval all compare thresholds against values
/// produced by this function, so routing is consistent across them.
pub fn project(direction: &[f32], x: &[f32]) -> f64 {
    direction
        .iter()
        .zip(x.iter())
        .map(|(&w, &v)| w as f64 * v as f64)
        .sum()
}

/// Squared Euclidean distance between two coordinate slices.
pub fn squared_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let diff = x as f64 - y as f64;
            diff * diff
        })
        .sum()
}
