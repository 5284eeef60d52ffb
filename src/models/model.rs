//! Per-model helpers used by adaptive weighting.
//!
//! The weighting code needs two primitive operations on encodings:
//! - a scalar baseline signal (for the signal-adaptive factor), when the model has one
//! - a distance between two encodings (for the direction-adaptive factor)
//!
//! Both are implemented here as pure functions dispatching on `ModelKind`.

use nalgebra::Vector3;

use crate::domain::ModelKind;
use crate::math::sym_from_upper;
use crate::models::fibers::{Fibers, axial_distance, fibers_distance};

/// Baseline signal of an encoding, if the model exposes one.
pub fn baseline(model: ModelKind, v: &[f64]) -> Option<f64> {
    match model {
        ModelKind::Tensor
        | ModelKind::Fibers
        | ModelKind::Noddi
        | ModelKind::Mcsmt
        | ModelKind::Exprec => v.first().copied(),
        ModelKind::Vect | ModelKind::Spharm | ModelKind::Axial => None,
    }
}

/// Model-specific distance between two encodings of equal kind.
pub fn distance(model: ModelKind, a: &[f64], b: &[f64]) -> f64 {
    match model {
        ModelKind::Tensor => {
            let da = sym_from_upper(&a[1..7]);
            let db = sym_from_upper(&b[1..7]);
            (da - db).norm()
        }
        ModelKind::Fibers => fibers_distance(&Fibers::decode(a), &Fibers::decode(b)),
        ModelKind::Noddi => {
            let scalars: f64 = (1..4).map(|i| (a[i] - b[i]).powi(2)).sum();
            scalars.sqrt() + axial_distance(&orientation(a, 4), &orientation(b, 4))
        }
        ModelKind::Axial => axial_distance(&orientation(a, 0), &orientation(b, 0)),
        ModelKind::Vect | ModelKind::Spharm | ModelKind::Mcsmt | ModelKind::Exprec => a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f64>()
            .sqrt(),
    }
}

fn orientation(v: &[f64], at: usize) -> Vector3<f64> {
    Vector3::new(v[at], v[at + 1], v[at + 2])
}
