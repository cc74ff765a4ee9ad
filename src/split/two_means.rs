//! Two-means split using streaming (online) k-means with two centroids.
//!
//! Both centroids start at the origin with zero observations. Each step takes
//! the next member of a shuffled pass, assigns it to the centroid minimising
//! `dist(x, mu_j) * c_j / (1 + c_j)` and folds it into that centroid's running
//! mean. The weighting makes a centroid with no observations free to claim the
//! first point it sees.

use log::{trace, warn};
use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::{Result, SpillTreeError};
use crate::source::DataSource;
use crate::vector::Vector;

/// Return the unit-normalised difference between the two centroids.
///
/// Runs until more than `max(members.len(), steps)` assignments have been made,
/// reshuffling the members before every full pass. The shuffle order comes
/// from `rng`, so a seeded generator gives a reproducible direction.
pub fn direction<S, R>(
    source: &S,
    members: &[S::Key],
    dimension: usize,
    steps: usize,
    rng: &mut R,
) -> Result<Vector>
where
    S: DataSource + ?Sized,
    R: Rng + ?Sized,
{
    if members.is_empty() {
        return Err(SpillTreeError::numerical(
            "2-means split attempted on a node with no members",
        ));
    }

    let mut centers = [vec![0.0f64; dimension], vec![0.0f64; dimension]];
    let mut counts = [0usize; 2];

    let mut order: Vec<&S::Key> = members.iter().collect();
    let budget = members.len().max(steps);
    let mut count = 0usize;

    'passes: loop {
        order.shuffle(rng);

        for &key in &order {
            let x = source.vector_at(key)?;
            x.validate_dimension(dimension)?;

            let j = nearest_center(&centers, &counts, &x.data);
            let c = counts[j] as f64;
            for (mu, &v) in centers[j].iter_mut().zip(x.data.iter()) {
                *mu = (*mu * c + v as f64) / (c + 1.0);
            }
            counts[j] += 1;

            count += 1;
            if count > budget {
                break 'passes;
            }
        }
    }

    trace!(
        "2-means split after {count} steps, cluster sizes {}/{}",
        counts[0], counts[1]
    );

    let mut w = Vector::new(
        centers[0]
            .iter()
            .zip(centers[1].iter())
            .map(|(a, b)| (a - b) as f32)
            .collect(),
    );
    if w.norm() == 0.0 {
        warn!(
            "2-means centroids coincide over {} members; using zero direction",
            members.len()
        );
    }
    w.normalize();
    Ok(w)
}

/// Index of the centroid with the smallest confidence-weighted distance.
///
/// Ties go to the first centroid.
fn nearest_center(centers: &[Vec<f64>; 2], counts: &[usize; 2], x: &[f32]) -> usize {
    let score = |j: usize| {
        let c = counts[j] as f64;
        let dist: f64 = centers[j]
            .iter()
            .zip(x.iter())
            .map(|(&mu, &v)| (v as f64 - mu).powi(2))
            .sum();
        dist * c / (1.0 + c)
    };
    if score(1) < score(0) { 1 } else { 0 }
}
