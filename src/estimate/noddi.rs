//! NODDI mean: scalars averaged linearly, orientation averaged axially.

use nalgebra::Vector3;

use crate::domain::ModelVector;
use crate::estimate::AxialAccumulator;
use crate::estimate::total_weight;

const NODDI_DIM: usize = 7;
const SCALARS: usize = 4;

pub fn noddi_mean(weights: &[f64], vectors: &[&[f64]]) -> Option<ModelVector> {
    let total = total_weight(weights, vectors.len())?;
    if vectors.iter().any(|v| v.len() != NODDI_DIM) {
        return None;
    }

    let mut out = ModelVector::zeros(NODDI_DIM);
    let mut axis = AxialAccumulator::new();
    for (w, v) in weights.iter().zip(vectors) {
        let f = w / total;
        for idx in 0..SCALARS {
            out[idx] += f * v[idx];
        }
        axis.update(*w, &Vector3::new(v[4], v[5], v[6]));
    }

    // No usable orientation leaves the direction at zero.
    if let Some(stats) = axis.compile() {
        out.fixed_rows_mut::<3>(SCALARS).copy_from(&stats.mean);
    }
    Some(out)
}
