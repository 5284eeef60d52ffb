//! Small dense least-squares solves.
//!
//! Used for linear initializations of nonlinear fits and for projecting
//! sampled spherical functions onto a harmonic basis:
//!
//! ```text
//! minimize Σ w_i (y_i - x_i^T β)^2
//! ```
//!
//! Rows are scaled by `sqrt(w_i)` and the ordinary problem is solved with SVD,
//! which copes with tall and nearly rank-deficient design matrices.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Progressively looser rank tolerances before giving up.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Weighted variant: rows with non-positive or non-finite weight are dropped.
pub fn solve_weighted_least_squares(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    w: &[f64],
) -> Option<DVector<f64>> {
    let rows: Vec<usize> = (0..x.nrows())
        .filter(|&r| w[r].is_finite() && w[r] > 0.0)
        .collect();
    if rows.len() < x.ncols() {
        return None;
    }

    let mut xw = DMatrix::<f64>::zeros(rows.len(), x.ncols());
    let mut yw = DVector::<f64>::zeros(rows.len());
    for (out, &r) in rows.iter().enumerate() {
        let sw = w[r].sqrt();
        for c in 0..x.ncols() {
            xw[(out, c)] = x[(r, c)] * sw;
        }
        yw[out] = y[r] * sw;
    }
    solve_least_squares(&xw, &yw)
}
