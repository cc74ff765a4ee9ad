//! Principal-component split.
//!
//! The covariance matrix is accumulated in `f64` and diagonalised with cyclic
//! Jacobi rotations, which are exact for symmetric matrices and need no
//! random start vector.

use log::trace;
use ndarray::{Array1, Array2, Axis};

use super::{argmax, mean};
use crate::error::{Result, SpillTreeError};
use crate::source::DataSource;
use crate::vector::Vector;

const MAX_SWEEPS: usize = 64;
const TOLERANCE: f64 = 1e-12;

/// Return the unit eigenvector of the largest covariance eigenvalue.
///
/// Requires at least two members; the covariance of a single point is
/// undefined under the `n - 1` denominator.
pub fn direction<S>(source: &S, members: &[S::Key], dimension: usize) -> Result<Vector>
where
    S: DataSource + ?Sized,
{
    if members.len() < 2 {
        return Err(SpillTreeError::numerical(format!(
            "pca split needs at least 2 members, got {}",
            members.len()
        )));
    }

    let covariance = covariance(source, members, dimension)?;
    let (eigenvalues, eigenvectors) = symmetric_eigen(covariance);

    let top = argmax(eigenvalues.as_slice().unwrap_or(&[])).unwrap_or(0);
    trace!(
        "pca split with eigenvalue {:.4e} over {} members",
        eigenvalues.get(top).copied().unwrap_or(0.0),
        members.len()
    );

    let column = eigenvectors.column(top);
    let mut w = Vector::new(column.iter().map(|&x| x as f32).collect());
    w.normalize();
    Ok(w)
}

/// Unbiased sample covariance of the member vectors.
fn covariance<S>(source: &S, members: &[S::Key], dimension: usize) -> Result<Array2<f64>>
where
    S: DataSource + ?Sized,
{
    let mean = Array1::from(mean(source, members, dimension)?);
    let mut sigma = Array2::<f64>::zeros((dimension, dimension));

    for key in members {
        let x = source.vector_at(key)?;
        let centered = Array1::from_iter(x.data.iter().map(|&v| v as f64)) - &mean;
        let column = centered.view().insert_axis(Axis(1));
        let row = centered.view().insert_axis(Axis(0));
        sigma += &column.dot(&row);
    }

    sigma /= (members.len() - 1) as f64;
    Ok(sigma)
}

/// Eigen-decompose a symmetric matrix.
///
/// Returns the eigenvalues and a matrix whose columns are the matching
/// eigenvectors.
pub(crate) fn symmetric_eigen(mut a: Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut v = Array2::<f64>::eye(n);

    for _ in 0..MAX_SWEEPS {
        let off_diagonal: f64 = (0..n)
            .flat_map(|p| (p + 1..n).map(move |q| (p, q)))
            .map(|(p, q)| a[[p, q]] * a[[p, q]])
            .sum();
        let scale: f64 = a.iter().map(|x| x * x).sum();
        if off_diagonal <= TOLERANCE * TOLERANCE * scale.max(f64::MIN_POSITIVE) {
            break;
        }

        for p in 0..n {
            for q in p + 1..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }

                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let sign = if theta >= 0.0 { 1.0 } else { -1.0 };
                let t = sign / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    (a.diag().to_owned(), v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DenseSource;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_symmetric_eigen_diagonalises() {
        let m = array![[2.0, 1.0], [1.0, 2.0]];
        let (values, vectors) = symmetric_eigen(m.clone());

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_abs_diff_eq!(sorted[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(sorted[1], 3.0, epsilon = 1e-9);

        for i in 0..2 {
            let v = vectors.column(i).to_owned();
            let mv = m.dot(&v);
            for k in 0..2 {
                assert_abs_diff_eq!(mv[k], values[i] * v[k], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_direction_follows_diagonal() {
        let source = DenseSource::new([
            [0.0f32, 0.1],
            [1.0, 0.9],
            [2.0, 2.1],
            [3.0, 2.9],
            [4.0, 4.0],
        ])
        .unwrap();
        let w = direction(&source, &[0, 1, 2, 3, 4], 2).unwrap();

        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert_abs_diff_eq!(w.norm(), 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(w.data[0].abs(), expected, epsilon = 0.02);
        assert_abs_diff_eq!(w.data[1].abs(), expected, epsilon = 0.02);
        assert!(w.data[0] * w.data[1] > 0.0);
    }

    #[test]
    fn test_direction_is_not_a_row_of_the_eigenvector_matrix() {
        // Spread along (1, 2); a transposed read would return a mirrored axis.
        let source = DenseSource::new([
            [-2.0f32, -4.0],
            [-1.0, -2.1],
            [0.0, 0.1],
            [1.0, 1.9],
            [2.0, 4.0],
        ])
        .unwrap();
        let w = direction(&source, &[0, 1, 2, 3, 4], 2).unwrap();
        let alignment = (w.data[0] + 2.0 * w.data[1]) / 5.0f32.sqrt();
        assert!(alignment.abs() > 0.99);
    }

    #[test]
    fn test_single_member_is_numerical_error() {
        let source = DenseSource::new([[1.0f32, 2.0]]).unwrap();
        let result = direction(&source, &[0], 2);
        assert!(matches!(result, Err(SpillTreeError::Numerical(_))));
    }
}
