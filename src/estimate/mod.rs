//! Per-model estimators: combine weighted model vectors into one.
//!
//! The set of rules is closed and the rule for a model is fixed by its
//! identity, see [`ModelEstimator::for_model`]. Every rule returns `None` when
//! no estimate can be formed; the engine then leaves the voxel at zero.

pub mod axial;
pub mod fibers;
pub mod linear;
pub mod noddi;
pub mod tensor;

pub use axial::{AxialAccumulator, AxialStats, axial_mean, canonical};
pub use fibers::FibersEstimator;
pub use linear::linear_mean;
pub use noddi::noddi_mean;
pub use tensor::log_tensor_mean;

use crate::domain::{FibersConfig, ModelKind, ModelVector};

#[derive(Debug, Clone, PartialEq)]
pub enum ModelEstimator {
    LinearMean,
    LogTensor,
    AxialMean,
    Noddi,
    Fibers(FibersEstimator),
}

impl ModelEstimator {
    pub fn for_model(model: ModelKind, fibers: &FibersConfig) -> Self {
        match model {
            ModelKind::Vect | ModelKind::Spharm | ModelKind::Mcsmt | ModelKind::Exprec => {
                ModelEstimator::LinearMean
            }
            ModelKind::Tensor => ModelEstimator::LogTensor,
            ModelKind::Axial => ModelEstimator::AxialMean,
            ModelKind::Noddi => ModelEstimator::Noddi,
            ModelKind::Fibers => ModelEstimator::Fibers(FibersEstimator::new(fibers.clone())),
        }
    }

    pub fn run(&self, weights: &[f64], vectors: &[&[f64]]) -> Option<ModelVector> {
        match self {
            ModelEstimator::LinearMean => linear_mean(weights, vectors),
            ModelEstimator::LogTensor => log_tensor_mean(weights, vectors),
            ModelEstimator::AxialMean => axial_mean(weights, vectors),
            ModelEstimator::Noddi => noddi_mean(weights, vectors),
            ModelEstimator::Fibers(est) => est.run(weights, vectors),
        }
    }

    /// Length of the estimates produced from inputs of length `input_dim`.
    pub fn output_dim(&self, input_dim: usize) -> usize {
        match self {
            ModelEstimator::Fibers(est) => est.output_dim(),
            _ => input_dim,
        }
    }
}

/// Sum of weights, or `None` for empty, mismatched, negative or non-finite
/// weights and for a non-positive total.
pub(crate) fn total_weight(weights: &[f64], count: usize) -> Option<f64> {
    if weights.is_empty() || weights.len() != count {
        return None;
    }
    if weights.iter().any(|w| !(w.is_finite() && *w >= 0.0)) {
        return None;
    }
    let total: f64 = weights.iter().sum();
    (total > 0.0 && total.is_finite()).then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_is_fixed_by_model() {
        let cfg = FibersConfig::default();
        assert_eq!(ModelEstimator::for_model(ModelKind::Vect, &cfg), ModelEstimator::LinearMean);
        assert_eq!(ModelEstimator::for_model(ModelKind::Spharm, &cfg), ModelEstimator::LinearMean);
        assert_eq!(ModelEstimator::for_model(ModelKind::Tensor, &cfg), ModelEstimator::LogTensor);
        assert_eq!(ModelEstimator::for_model(ModelKind::Axial, &cfg), ModelEstimator::AxialMean);
        assert!(matches!(
            ModelEstimator::for_model(ModelKind::Fibers, &cfg),
            ModelEstimator::Fibers(_)
        ));
    }

    #[test]
    fn output_dim_follows_the_rule() {
        let cfg = FibersConfig::default();
        assert_eq!(ModelEstimator::LinearMean.output_dim(5), 5);
        let fibers = ModelEstimator::for_model(ModelKind::Fibers, &cfg);
        assert_eq!(fibers.output_dim(6), 14);
    }

    #[test]
    fn total_weight_rejects_degenerate_weights() {
        assert_eq!(total_weight(&[0.25, 0.75], 2), Some(1.0));
        assert_eq!(total_weight(&[1.0], 2), None);
        assert_eq!(total_weight(&[f64::NAN], 1), None);
        assert_eq!(total_weight(&[0.0], 1), None);
    }
}
