//! Weighted arithmetic mean of model vectors.

use crate::domain::ModelVector;
use crate::estimate::total_weight;

/// `Σ (w_i / W) v_i`; `None` on empty, mismatched or unweighted input.
pub fn linear_mean(weights: &[f64], vectors: &[&[f64]]) -> Option<ModelVector> {
    let total = total_weight(weights, vectors.len())?;
    let dim = vectors[0].len();
    if vectors.iter().any(|v| v.len() != dim) {
        return None;
    }

    let mut out = ModelVector::zeros(dim);
    for (w, v) in weights.iter().zip(vectors) {
        let f = w / total;
        for (o, x) in out.iter_mut().zip(v.iter()) {
            *o += f * x;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_weights_give_the_arithmetic_mean() {
        let a = [1.0, 2.0, 3.0];
        let b = [3.0, 4.0, 5.0];
        let out = linear_mean(&[0.5, 0.5], &[&a, &b]).unwrap();
        assert_eq!(out.as_slice(), &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn single_input_is_reproduced_exactly() {
        let a = [0.1, -7.25, 1e-9, 3.3];
        let out = linear_mean(&[0.37], &[&a]).unwrap();
        assert_eq!(out.as_slice(), &a);
    }

    #[test]
    fn unusable_inputs_yield_none() {
        let a = [1.0, 2.0];
        let b = [1.0];
        assert!(linear_mean(&[], &[]).is_none());
        assert!(linear_mean(&[1.0], &[&a, &a]).is_none());
        assert!(linear_mean(&[1.0, 1.0], &[&a, &b]).is_none());
        assert!(linear_mean(&[0.0, 0.0], &[&a, &a]).is_none());
        assert!(linear_mean(&[1.0, -1.0], &[&a, &a]).is_none());
    }
}
