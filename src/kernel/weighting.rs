//! Feature-adaptive weighting factors.
//!
//! The combined weight of a neighbor is
//!
//! ```text
//! w = spatial × exp(-d(center, neighbor)² / hdir²) × exp(-(b_center - b_neighbor)² / hsig²)
//! ```
//!
//! where the directional factor is applied only when `hdir` is configured and
//! the signal factor only when `hsig` is configured and the model exposes a
//! baseline.

use crate::domain::{KernelConfig, ModelKind};
use crate::models::{baseline, distance};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveWeighting {
    model: ModelKind,
    hdir: Option<f64>,
    hsig: Option<f64>,
}

impl AdaptiveWeighting {
    pub fn new(model: ModelKind, hdir: Option<f64>, hsig: Option<f64>) -> Self {
        Self { model, hdir, hsig }
    }

    pub fn from_config(model: ModelKind, config: &KernelConfig) -> Self {
        Self::new(model, config.hdir, config.hsig)
    }

    /// Whether any factor depends on the neighbor's model.
    pub fn is_adaptive(&self) -> bool {
        self.hdir.is_some() || (self.hsig.is_some() && self.model_has_baseline())
    }

    fn model_has_baseline(&self) -> bool {
        !matches!(
            self.model,
            ModelKind::Vect | ModelKind::Spharm | ModelKind::Axial
        )
    }

    /// Product of the directional and signal factors for one neighbor.
    pub fn factor(&self, center: &[f64], neighbor: &[f64]) -> f64 {
        let mut factor = 1.0;

        if let Some(h) = self.hdir {
            let d = distance(self.model, center, neighbor);
            factor *= (-(d * d) / (h * h)).exp();
        }

        if let Some(h) = self.hsig {
            if let (Some(bc), Some(bn)) = (baseline(self.model, center), baseline(self.model, neighbor)) {
                let db = bc - bn;
                factor *= (-(db * db) / (h * h)).exp();
            }
        }

        factor
    }

    /// Full neighbor weight given its spatial weight.
    pub fn weight(&self, spatial: f64, center: &[f64], neighbor: &[f64]) -> f64 {
        if self.is_adaptive() {
            spatial * self.factor(center, neighbor)
        } else {
            spatial
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_adaptive_weight_is_spatial() {
        let w = AdaptiveWeighting::new(ModelKind::Vect, None, None);
        assert!(!w.is_adaptive());
        assert_eq!(w.weight(0.25, &[0.0], &[100.0]), 0.25);
    }

    #[test]
    fn directional_factor_uses_model_distance() {
        let w = AdaptiveWeighting::new(ModelKind::Vect, Some(2.0), None);
        let f = w.factor(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((f - (-25.0f64 / 4.0).exp()).abs() < 1e-15);
    }

    #[test]
    fn signal_factor_needs_a_baseline() {
        let w = AdaptiveWeighting::new(ModelKind::Vect, None, Some(1.0));
        assert!(!w.is_adaptive());
        assert_eq!(w.factor(&[0.0], &[5.0]), 1.0);

        let w = AdaptiveWeighting::new(ModelKind::Mcsmt, None, Some(10.0));
        let f = w.factor(&[100.0, 0.5, 1e-3], &[110.0, 0.5, 1e-3]);
        assert!((f - (-1.0f64).exp()).abs() < 1e-15);
    }

    #[test]
    fn identical_models_get_full_weight() {
        let w = AdaptiveWeighting::new(ModelKind::Noddi, Some(0.1), Some(0.1));
        let v = [1.0, 0.4, 0.1, 0.3, 0.0, 1.0, 0.0];
        assert_eq!(w.weight(0.7, &v, &v), 0.7);
    }
}
