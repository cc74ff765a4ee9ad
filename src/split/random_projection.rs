//! Random-projection split.
//!
//! Samples directions uniformly from the unit sphere and keeps the one along
//! which the members spread the widest. A cheap stand-in for the principal
//! component that needs no eigendecomposition.

use log::{trace, warn};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::error::{Result, SpillTreeError};
use crate::source::DataSource;
use crate::vector::Vector;

/// Return the sampled unit direction with the largest projection range.
pub fn direction<S, R>(
    source: &S,
    members: &[S::Key],
    dimension: usize,
    samples: usize,
    rng: &mut R,
) -> Result<Vector>
where
    S: DataSource + ?Sized,
    R: Rng + ?Sized,
{
    if samples == 0 {
        return Err(SpillTreeError::config("samples_rp must be at least 1"));
    }

    let candidates: Vec<Vector> = (0..samples)
        .map(|_| {
            let mut w = Vector::new(
                (0..dimension)
                    .map(|_| Distribution::<f32>::sample(&StandardNormal, rng))
                    .collect(),
            );
            w.normalize();
            w
        })
        .collect();

    let mut min_val = vec![f64::INFINITY; samples];
    let mut max_val = vec![f64::NEG_INFINITY; samples];

    for key in members {
        let x = source.vector_at(key)?;
        x.validate_dimension(dimension)?;
        for (i, w) in candidates.iter().enumerate() {
            let p = w.dot(&x.data);
            min_val[i] = min_val[i].min(p);
            max_val[i] = max_val[i].max(p);
        }
    }

    let mut best = 0;
    let mut best_spread = f64::NEG_INFINITY;
    for i in 0..samples {
        let spread = max_val[i] - min_val[i];
        if spread > best_spread {
            best = i;
            best_spread = spread;
        }
    }

    trace!("rp split picked sample {best}/{samples} with spread {best_spread:.4e}");

    let w = candidates
        .into_iter()
        .nth(best)
        .unwrap_or_else(|| Vector::zeros(dimension));
    if w.norm() == 0.0 {
        warn!("rp sampled a zero direction in {dimension} dimensions");
    }
    Ok(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DenseSource;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_returns_unit_direction() {
        let source =
            DenseSource::new([[0.0f32, 0.0, 0.0], [1.0, 2.0, 3.0], [-1.0, 0.5, 2.0]]).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let w = direction(&source, &[0, 1, 2], 3, 10, &mut rng).unwrap();
        assert_eq!(w.dimension(), 3);
        assert_abs_diff_eq!(w.norm(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_prefers_direction_of_largest_spread() {
        // Points spread only along x; with many samples the best candidate
        // should be close to the x axis.
        let points: Vec<Vec<f32>> = (0..50).map(|i| vec![i as f32, 0.0]).collect();
        let source = DenseSource::new(points).unwrap();
        let members: Vec<usize> = (0..50).collect();
        let mut rng = StdRng::seed_from_u64(5);

        let w = direction(&source, &members, 2, 200, &mut rng).unwrap();
        assert!(w.data[0].abs() > 0.95);
    }

    #[test]
    fn test_zero_samples_is_config_error() {
        let source = DenseSource::new([[0.0f32, 1.0]]).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let result = direction(&source, &[0], 2, 0, &mut rng);
        assert!(matches!(result, Err(SpillTreeError::Config(_))));
    }
}
