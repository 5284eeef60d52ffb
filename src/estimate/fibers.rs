//! Multi-compartment fiber estimation by clustering pooled compartments.
//!
//! Every active compartment of every input contributes its orientation with
//! mass `(w_i / W) · frac`. The pooled axes are grouped with axial k-means,
//! restarted `restarts` times per candidate component count, and each cluster
//! becomes one output compartment whose fraction is the cluster mass.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::cluster::{AxialKMeans, Clusterer, restarts};
use crate::domain::{FibersConfig, ModelVector, SelectionRule};
use crate::estimate::total_weight;
use crate::models::{Compartment, Fibers};

#[derive(Debug, Clone, PartialEq)]
pub struct FibersEstimator {
    config: FibersConfig,
}

impl FibersEstimator {
    pub fn new(config: FibersConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FibersConfig {
        &self.config
    }

    pub fn output_dim(&self) -> usize {
        Fibers::encoding_size(self.config.maxcomps)
    }

    pub fn run(&self, weights: &[f64], vectors: &[&[f64]]) -> Option<ModelVector> {
        let total = total_weight(weights, vectors.len())?;
        if vectors.iter().any(|v| Fibers::count_for(v.len()) == 0) {
            return None;
        }

        let mut out = Fibers::new(0);
        let mut dirs = Vec::new();
        let mut masses = Vec::new();
        for (w, v) in weights.iter().zip(vectors) {
            let f = w / total;
            let fibers = Fibers::decode(v);
            out.base += f * fibers.base;
            out.diff += f * fibers.diff;
            for comp in fibers.active() {
                dirs.push(comp.line);
                masses.push(f * comp.frac);
            }
        }

        if !dirs.is_empty() {
            if let Some(best) = self.cluster(dirs, masses) {
                out.comps = best
                    .centers()
                    .iter()
                    .zip(best.cluster_masses())
                    .map(|(line, frac)| Compartment { frac, line: *line })
                    .filter(|c| c.frac >= self.config.minfrac)
                    .collect();
                out.comps.sort_by(|a, b| b.frac.total_cmp(&a.frac));
            }
        }

        let encoded = out.convert(self.config.maxcomps).encode();
        Some(ModelVector::from_vec(encoded))
    }

    /// Best clustering under the configured selection rule.
    fn cluster(&self, dirs: Vec<nalgebra::Vector3<f64>>, masses: Vec<f64>) -> Option<AxialKMeans> {
        let kmax = self.config.maxcomps.min(dirs.len());
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        match self.config.selection {
            SelectionRule::Fixed => {
                let km = AxialKMeans::new(kmax, dirs, masses);
                restarts(&km, self.config.restarts, &mut rng)
            }
            SelectionRule::Penalized { lambda } => {
                let mut best: Option<(f64, AxialKMeans)> = None;
                for k in 1..=kmax {
                    let km = AxialKMeans::new(k, dirs.clone(), masses.clone());
                    let Some(fit) = restarts(&km, self.config.restarts, &mut rng) else {
                        continue;
                    };
                    let score = fit.cost() + lambda * k as f64;
                    // Strict comparison keeps the smallest k on ties.
                    if best.as_ref().is_none_or(|(s, _)| score < *s) {
                        best = Some((score, fit));
                    }
                }
                best.map(|(_, fit)| fit)
            }
        }
    }
}
