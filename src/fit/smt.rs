//! Multi-compartment spherical mean technique (MC-SMT) with a fixed
//! intrinsic diffusivity.
//!
//! Signals are averaged per b-value shell, which removes the dependence on
//! fiber orientation. With intrinsic diffusivity `λ` and intra-axonal fraction
//! `v`, the extra-axonal perpendicular diffusivity follows the tortuosity
//! model `λ⊥ = (1 - v) λ` and the shell means are
//!
//! ```text
//! E_in(b) = √π/2 · erf(√(bλ)) / √(bλ)
//! E_ex(b) = exp(-bλ⊥) · √π/2 · erf(√(b(λ - λ⊥))) / √(b(λ - λ⊥))
//! S(b)    = base · (v E_in(b) + (1 - v) E_ex(b))
//! ```

use std::f64::consts::PI;

use statrs::function::erf::erf;

use crate::domain::{FitConfig, ModelKind};
use crate::error::{Error, Result};
use crate::fit::VoxelFit;
use crate::fit::simplex::{Bounds, SimplexOptions, minimize};

/// b-values closer than this (s/mm²) belong to the same shell.
const SHELL_TOLERANCE: f64 = 100.0;
/// Upper bound of the normalized baseline parameter.
const MAX_BASE: f64 = 10.0;

/// Grouping of measurements into b-value shells.
#[derive(Debug, Clone, PartialEq)]
pub struct Shells {
    bvals: Vec<f64>,
    shell_of: Vec<usize>,
    counts: Vec<usize>,
}

impl Shells {
    pub fn new(bvals: &[f64]) -> Result<Self> {
        if bvals.is_empty() {
            return Err(Error::config("no b-values given"));
        }
        if bvals.iter().any(|b| !(b.is_finite() && *b >= 0.0)) {
            return Err(Error::config("b-values must be finite and >= 0"));
        }

        let mut order: Vec<usize> = (0..bvals.len()).collect();
        order.sort_by(|&a, &b| bvals[a].total_cmp(&bvals[b]));

        let mut shell_of = vec![0; bvals.len()];
        let mut sums: Vec<f64> = Vec::new();
        let mut counts: Vec<usize> = Vec::new();
        let mut start = f64::NEG_INFINITY;
        for idx in order {
            let b = bvals[idx];
            if b - start > SHELL_TOLERANCE {
                start = b;
                sums.push(0.0);
                counts.push(0);
            }
            let shell = sums.len() - 1;
            sums[shell] += b;
            counts[shell] += 1;
            shell_of[idx] = shell;
        }

        let bvals = sums.iter().zip(&counts).map(|(s, c)| s / *c as f64).collect();
        Ok(Self {
            bvals,
            shell_of,
            counts,
        })
    }

    /// Mean b-value per shell, increasing.
    pub fn bvals(&self) -> &[f64] {
        &self.bvals
    }

    pub fn measurements(&self) -> usize {
        self.shell_of.len()
    }

    /// Spherical mean signal per shell.
    pub fn means(&self, signal: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.bvals.len()];
        for (s, &shell) in signal.iter().zip(&self.shell_of) {
            out[shell] += s;
        }
        for (o, c) in out.iter_mut().zip(&self.counts) {
            *o /= *c as f64;
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct SmtFit {
    shells: Shells,
    diffusivity: f64,
    frac: f64,
    options: SimplexOptions,
}

impl SmtFit {
    pub fn new(bvals: &[f64], config: &FitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shells: Shells::new(bvals)?,
            diffusivity: config.diffusivity,
            frac: config.frac,
            options: SimplexOptions::from_config(config),
        })
    }

    pub fn shells(&self) -> &Shells {
        &self.shells
    }

    /// Predicted shell means for a baseline and intra-axonal fraction.
    pub fn predict(&self, base: f64, frac: f64) -> Vec<f64> {
        self.shells
            .bvals()
            .iter()
            .map(|&b| base * smt_signal(b, self.diffusivity, frac))
            .collect()
    }
}

impl VoxelFit for SmtFit {
    fn model(&self) -> ModelKind {
        ModelKind::Mcsmt
    }

    fn input_dim(&self) -> usize {
        self.shells.measurements()
    }

    fn fit(&self, signal: &[f64]) -> Option<Vec<f64>> {
        let means = self.shells.means(signal);
        let peak = means.iter().copied().fold(0.0, f64::max);
        let scale = if peak > 0.0 { peak } else { 1.0 };
        let target: Vec<f64> = means.iter().map(|m| m / scale).collect();

        let objective = |x: &[f64]| -> f64 {
            self.predict(x[0], x[1])
                .iter()
                .zip(&target)
                .map(|(p, t)| (p - t).powi(2))
                .sum()
        };
        let bounds = Bounds::new(vec![0.0, 0.0], vec![MAX_BASE, 1.0]).ok()?;
        let min = minimize(objective, &[1.0, self.frac], &bounds, &self.options).ok()?;

        Some(vec![min.x[0] * scale, min.x[1], self.diffusivity])
    }
}

/// `√π/2 · erf(√x) / √x`, the powder average of `exp(-x cos²θ)`.
fn powder(x: f64) -> f64 {
    if x < 1e-10 {
        1.0 - x / 3.0
    } else {
        let r = x.sqrt();
        0.5 * PI.sqrt() * erf(r) / r
    }
}

/// Normalized spherical mean signal at b-value `b`.
fn smt_signal(b: f64, diffusivity: f64, frac: f64) -> f64 {
    let perp = (1.0 - frac) * diffusivity;
    let intra = powder(b * diffusivity);
    let extra = (-b * perp).exp() * powder(b * (diffusivity - perp));
    frac * intra + (1.0 - frac) * extra
}
