//! Log-Euclidean tensor mean.
//!
//! Diffusion matrices are averaged in the matrix-log domain and mapped back,
//! so the result stays positive definite. The baseline signal is averaged
//! linearly over the same retained inputs.

use crate::domain::ModelVector;
use crate::estimate::total_weight;
use crate::math::{sym_exp, sym_from_upper, sym_log, sym_to_upper};
use nalgebra::Matrix3;

const TENSOR_DIM: usize = 7;

pub fn log_tensor_mean(weights: &[f64], vectors: &[&[f64]]) -> Option<ModelVector> {
    total_weight(weights, vectors.len())?;
    if vectors.iter().any(|v| v.len() != TENSOR_DIM) {
        return None;
    }

    let mut retained = Vec::with_capacity(vectors.len());
    for (w, v) in weights.iter().zip(vectors) {
        if !v[0].is_finite() {
            continue;
        }
        // Non-positive-definite inputs are skipped, not clamped.
        if let Some(log) = sym_log(&sym_from_upper(&v[1..TENSOR_DIM])) {
            retained.push((*w, v[0], log));
        }
    }

    let total: f64 = retained.iter().map(|(w, _, _)| w).sum();
    if !(total > 0.0) {
        return None;
    }

    let mut base = 0.0;
    let mut log_mean = Matrix3::zeros();
    for (w, b, log) in &retained {
        let f = w / total;
        base += f * b;
        log_mean += log * f;
    }

    let mut out = ModelVector::zeros(TENSOR_DIM);
    out[0] = base;
    for (o, x) in out.iter_mut().skip(1).zip(sym_to_upper(&sym_exp(&log_mean))) {
        *o = x;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_tensors_average_to_themselves() {
        let t = [200.0, 1.7e-3, 1e-4, 0.0, 3e-4, 0.0, 3e-4];
        let out = log_tensor_mean(&[1.0, 2.0, 0.5], &[&t, &t, &t]).unwrap();
        for (o, x) in out.iter().zip(t) {
            assert!((o - x).abs() <= 1e-12 * x.abs().max(1e-3));
        }
    }

    #[test]
    fn log_mean_is_geometric_on_diagonals() {
        let a = [100.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0];
        let b = [300.0, 4.0, 0.0, 0.0, 1.0, 0.0, 9.0];
        let out = log_tensor_mean(&[1.0, 1.0], &[&a, &b]).unwrap();
        assert!((out[0] - 200.0).abs() < 1e-12);
        assert!((out[1] - 2.0).abs() < 1e-12);
        assert!((out[4] - 1.0).abs() < 1e-12);
        assert!((out[6] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn non_positive_definite_inputs_are_skipped() {
        let good = [100.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0];
        let bad = [900.0, -1.0, 0.0, 0.0, 1.0, 0.0, 1.0];
        let out = log_tensor_mean(&[1.0, 5.0], &[&good, &bad]).unwrap();
        assert!((out[0] - 100.0).abs() < 1e-12);
        assert!(log_tensor_mean(&[1.0], &[&bad]).is_none());
    }
}
