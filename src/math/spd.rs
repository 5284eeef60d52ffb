//! Symmetric positive-definite 3×3 matrix helpers for tensor models.
//!
//! Log-Euclidean averaging maps each diffusion matrix through the matrix
//! logarithm, averages linearly and maps back with the exponential, which keeps
//! the result positive definite.

use nalgebra::{Matrix3, SymmetricEigen};

/// Build a symmetric matrix from `[xx, xy, xz, yy, yz, zz]`.
pub fn sym_from_upper(v: &[f64]) -> Matrix3<f64> {
    Matrix3::new(v[0], v[1], v[2], v[1], v[3], v[4], v[2], v[4], v[5])
}

/// Inverse of [`sym_from_upper`].
pub fn sym_to_upper(m: &Matrix3<f64>) -> [f64; 6] {
    [m[(0, 0)], m[(0, 1)], m[(0, 2)], m[(1, 1)], m[(1, 2)], m[(2, 2)]]
}

/// Matrix logarithm; `None` unless every eigenvalue is finite and positive.
pub fn sym_log(m: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    if m.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let eig = SymmetricEigen::new(*m);
    if eig.eigenvalues.iter().any(|l| !(*l > 0.0)) {
        return None;
    }
    let logs = eig.eigenvalues.map(f64::ln);
    Some(eig.eigenvectors * Matrix3::from_diagonal(&logs) * eig.eigenvectors.transpose())
}

/// Matrix exponential of a symmetric matrix.
pub fn sym_exp(m: &Matrix3<f64>) -> Matrix3<f64> {
    let eig = SymmetricEigen::new(*m);
    let exps = eig.eigenvalues.map(f64::exp);
    eig.eigenvectors * Matrix3::from_diagonal(&exps) * eig.eigenvectors.transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_then_exp_is_identity_on_spd() {
        let m = sym_from_upper(&[2.0, 0.3, 0.1, 1.5, -0.2, 1.0]);
        let back = sym_exp(&sym_log(&m).unwrap());
        assert!((back - m).amax() < 1e-12);
    }

    #[test]
    fn log_rejects_non_positive_definite() {
        let m = sym_from_upper(&[1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        assert!(sym_log(&m).is_none());
        let m = sym_from_upper(&[1.0, 0.0, 0.0, -1.0, 0.0, 1.0]);
        assert!(sym_log(&m).is_none());
    }

    #[test]
    fn upper_packing_round_trips() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(sym_to_upper(&sym_from_upper(&v)), v);
    }
}
