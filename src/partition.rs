//! Quantile thresholds and left/right routing for spill splits.
//!
//! Every internal node keeps a pair of thresholds `(lo, hi)` read off the
//! distribution of member projections at the quantiles `0.5 - spill/2` and
//! `0.5 + spill/2`. A projection `p` routes:
//!
//! - right when `p >= lo`,
//! - left when `p < hi`,
//!
//! so points in `[lo, hi)` reach both children. With `spill = 0` the two
//! thresholds coincide and a point exactly on the threshold goes right only.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::source::Key;

/// Sample quantile of already-sorted values by linear interpolation.
///
/// Quantile `q` is read at position `q * (n - 1)` between adjacent order
/// statistics. Returns `None` for an empty slice.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let position = q.clamp(0.0, 1.0) * last as f64;
    let lower = position.floor() as usize;
    let upper = (lower + 1).min(last);
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// The pair of split thresholds bounding the spill region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Lower threshold; projections at or above it route right.
    pub lo: f64,
    /// Upper threshold; projections below it route left.
    pub hi: f64,
}

impl Thresholds {
    /// Compute thresholds from a set of projections and a spill fraction.
    ///
    /// Returns `None` when there are no projections.
    pub fn from_projections(projections: &[f64], spill: f64) -> Option<Self> {
        let mut sorted = projections.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let lo = quantile(&sorted, 0.5 - spill / 2.0)?;
        let hi = quantile(&sorted, 0.5 + spill / 2.0)?;
        Some(Self { lo, hi })
    }

    /// Whether a projection routes to the right child.
    pub fn goes_right(&self, projection: f64) -> bool {
        projection >= self.lo
    }

    /// Whether a projection routes to the left child.
    pub fn goes_left(&self, projection: f64) -> bool {
        projection < self.hi
    }

    /// Whether a projection falls in the spill region and reaches both children.
    pub fn in_spill(&self, projection: f64) -> bool {
        self.goes_right(projection) && self.goes_left(projection)
    }

    /// Width of the spill region.
    pub fn width(&self) -> f64 {
        self.hi - self.lo
    }
}

/// Split keyed projections into left and right member sets.
pub fn partition<K: Key>(
    projections: impl IntoIterator<Item = (K, f64)>,
    thresholds: &Thresholds,
) -> (BTreeSet<K>, BTreeSet<K>) {
    let mut left = BTreeSet::new();
    let mut right = BTreeSet::new();

    for (key, projection) in projections {
        if thresholds.goes_left(projection) {
            left.insert(key.clone());
        }
        if thresholds.goes_right(projection) {
            right.insert(key);
        }
    }

    (left, right)
}
