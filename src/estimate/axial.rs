//! Axial (sign-ambiguous orientation) statistics.
//!
//! Orientations `u` and `-u` are the same axis, so they are averaged through
//! their dyadic `u uᵀ`. Accumulation is split into `update` and a single
//! `compile`, which performs the eigen-decomposition once.

use nalgebra::{Matrix3, SymmetricEigen, Vector3};

use crate::domain::ModelVector;
use crate::estimate::total_weight;

/// Result of compiling an [`AxialAccumulator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxialStats {
    /// Unit principal axis; the component of largest magnitude is positive.
    pub mean: Vector3<f64>,
    /// Dominant eigenvalue of the weighted-mean dyadic, in `[1/3, 1]`.
    pub lambda: f64,
    /// Dominant eigenvalue over the trace.
    pub coherence: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxialAccumulator {
    sum: Matrix3<f64>,
    weight: f64,
    count: usize,
}

impl AxialAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one orientation. Zero, non-finite or unweighted inputs are ignored.
    pub fn update(&mut self, weight: f64, v: &Vector3<f64>) {
        let norm = v.norm();
        if !(weight > 0.0 && weight.is_finite() && norm > 0.0 && norm.is_finite()) {
            return;
        }
        let u = v / norm;
        self.sum += (u * u.transpose()) * weight;
        self.weight += weight;
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn compile(&self) -> Option<AxialStats> {
        if !(self.weight > 0.0) {
            return None;
        }
        let dyadic = self.sum / self.weight;
        let eig = SymmetricEigen::new(dyadic);
        let (idx, lambda) = eig
            .eigenvalues
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, l)| if l > best.1 { (i, l) } else { best });

        let mean = canonical(&eig.eigenvectors.column(idx).into_owned());
        let trace = dyadic.trace();
        let coherence = if trace > 0.0 { lambda / trace } else { 0.0 };
        Some(AxialStats {
            mean,
            lambda,
            coherence,
            count: self.count,
        })
    }
}

/// Flip the sign so the component of largest magnitude is positive.
pub fn canonical(v: &Vector3<f64>) -> Vector3<f64> {
    let imax = v.iamax();
    if v[imax] < 0.0 { -v } else { *v }
}

/// Weighted axial mean of 3-vector encodings.
pub fn axial_mean(weights: &[f64], vectors: &[&[f64]]) -> Option<ModelVector> {
    total_weight(weights, vectors.len())?;
    if vectors.iter().any(|v| v.len() != 3) {
        return None;
    }
    let mut acc = AxialAccumulator::new();
    for (w, v) in weights.iter().zip(vectors) {
        acc.update(*w, &Vector3::new(v[0], v[1], v[2]));
    }
    let stats = acc.compile()?;
    Some(ModelVector::from_column_slice(stats.mean.as_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_signs_are_the_same_axis() {
        let mut acc = AxialAccumulator::new();
        acc.update(1.0, &Vector3::new(0.0, 0.0, 2.0));
        acc.update(1.0, &Vector3::new(0.0, 0.0, -1.0));
        let stats = acc.compile().unwrap();
        assert!((stats.mean - Vector3::z()).norm() < 1e-12);
        assert!((stats.lambda - 1.0).abs() < 1e-12);
        assert!((stats.coherence - 1.0).abs() < 1e-12);
        assert_eq!(stats.count, 2);
    }

    #[test]
    fn weights_select_the_dominant_axis() {
        let mut acc = AxialAccumulator::new();
        acc.update(3.0, &Vector3::x());
        acc.update(1.0, &Vector3::y());
        let stats = acc.compile().unwrap();
        assert!((stats.mean - Vector3::x()).norm() < 1e-12);
        assert!((stats.lambda - 0.75).abs() < 1e-12);
    }

    #[test]
    fn empty_or_degenerate_accumulator_does_not_compile() {
        let mut acc = AxialAccumulator::new();
        assert!(acc.compile().is_none());
        acc.update(1.0, &Vector3::zeros());
        acc.update(0.0, &Vector3::x());
        acc.update(1.0, &Vector3::new(f64::NAN, 0.0, 0.0));
        assert_eq!(acc.count(), 0);
        assert!(acc.compile().is_none());
    }

    #[test]
    fn axial_mean_returns_a_canonical_unit_vector() {
        let a = [0.0, -1.0, 0.0];
        let out = axial_mean(&[1.0], &[&a]).unwrap();
        assert!((out[1] - 1.0).abs() < 1e-12);
    }
}
