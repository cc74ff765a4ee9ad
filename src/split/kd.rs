//! Axis-aligned split on the coordinate of maximum variance.

use log::trace;

use super::{argmax, mean};
use crate::error::Result;
use crate::source::DataSource;
use crate::vector::Vector;

/// Return the standard basis vector of the highest-variance coordinate.
///
/// Variance uses the unbiased `n - 1` denominator. Ties go to the lowest axis.
pub fn direction<S>(source: &S, members: &[S::Key], dimension: usize) -> Result<Vector>
where
    S: DataSource + ?Sized,
{
    let mean = mean(source, members, dimension)?;

    let mut variance = vec![0.0; dimension];
    for key in members {
        let vector = source.vector_at(key)?;
        for ((v, &m), &x) in variance.iter_mut().zip(mean.iter()).zip(vector.data.iter()) {
            let diff = x as f64 - m;
            *v += diff * diff;
        }
    }

    // A single member has zero variance on every axis.
    let denominator = members.len().saturating_sub(1).max(1) as f64;
    for v in &mut variance {
        *v /= denominator;
    }

    let axis = argmax(&variance).unwrap_or(0);
    trace!(
        "kd split on axis {axis} (variance {:.4e}) over {} members",
        variance.get(axis).copied().unwrap_or(0.0),
        members.len()
    );

    Ok(Vector::basis(dimension, axis))
}
