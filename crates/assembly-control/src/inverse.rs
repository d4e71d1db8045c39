//! Matrix inversion that degrades to a damped pseudo-inverse.

use nalgebra::SMatrix;

/// Smallest accepted ratio between the extreme diagonal entries of the
/// Cholesky factor before the direct inverse is considered ill-conditioned.
const MIN_FACTOR_RATIO: f32 = 1.0e-4;

/// Inverse of a symmetric positive-definite matrix.
///
/// Falls back to `A^T (A A^T + damping^2 I)^-1` when `A` is singular,
/// indefinite, or ill-conditioned, and to zero when even that fails.
pub fn robust_inverse<const N: usize>(a: &SMatrix<f32, N, N>, damping: f32) -> SMatrix<f32, N, N> {
    if let Some(chol) = a.cholesky() {
        let diag = chol.l().diagonal();
        let (lo, hi) = (diag.min(), diag.max());
        if hi > 0.0 && lo / hi >= MIN_FACTOR_RATIO {
            let inv = chol.inverse();
            if inv.iter().all(|v| v.is_finite()) {
                return inv;
            }
        }
    }
    damped_pseudo_inverse(a, damping)
}

/// `A^T (A A^T + damping^2 I)^-1`.
pub fn damped_pseudo_inverse<const N: usize>(
    a: &SMatrix<f32, N, N>,
    damping: f32,
) -> SMatrix<f32, N, N> {
    let damped = a * a.transpose() + SMatrix::<f32, N, N>::identity() * (damping * damping);
    match damped.cholesky() {
        Some(chol) => {
            let pinv = a.transpose() * chol.inverse();
            if pinv.iter().all(|v| v.is_finite()) {
                pinv
            } else {
                SMatrix::zeros()
            }
        }
        None => SMatrix::zeros(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
