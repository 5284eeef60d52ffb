//! Exponential recovery fit: `S(t) = α (1 - β e^{-t/T1})`.
//!
//! The start point comes from a log-linear least-squares fit of
//! `ln(1 - S/α₀) = ln β - t/T1` with a plateau guess `α₀`. Rows are weighted
//! by the squared residual `(1 - S/α₀)²`; points near the plateau get none. The simplex then refines all three
//! parameters in units of that start point.

use nalgebra::{DMatrix, DVector};

use crate::domain::{FitConfig, ModelKind};
use crate::error::{Error, Result};
use crate::fit::VoxelFit;
use crate::fit::simplex::{Bounds, SimplexOptions, minimize};
use crate::math::solve_weighted_least_squares;

/// Plateau guess relative to the largest observed magnitude.
const PLATEAU: f64 = 1.05;
/// Fallback inversion efficiency when the linear fit fails.
const DEFAULT_BETA: f64 = 2.0;
const MAX_BETA: f64 = 3.0;
/// Points this close to the plateau are left out of the log-linear fit.
const MIN_RESIDUAL: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct ExpRecoveryFit {
    times: Vec<f64>,
    options: SimplexOptions,
}

/// Start point `(α, β, T1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecoveryGuess {
    pub alpha: f64,
    pub beta: f64,
    pub t1: f64,
}

impl ExpRecoveryFit {
    pub fn new(times: &[f64], config: &FitConfig) -> Result<Self> {
        config.validate()?;
        if times.len() < 3 {
            return Err(Error::config("exponential recovery needs at least 3 time points"));
        }
        if times.iter().any(|t| !(t.is_finite() && *t >= 0.0)) {
            return Err(Error::config("recovery times must be finite and >= 0"));
        }
        Ok(Self {
            times: times.to_vec(),
            options: SimplexOptions::from_config(config),
        })
    }

    pub fn predict(&self, alpha: f64, beta: f64, t1: f64) -> Vec<f64> {
        self.times
            .iter()
            .map(|t| alpha * (1.0 - beta * (-t / t1).exp()))
            .collect()
    }

    /// Log-linear start point.
    pub fn guess(&self, signal: &[f64]) -> RecoveryGuess {
        let peak = signal.iter().map(|s| s.abs()).fold(0.0, f64::max);
        let alpha = if peak > 0.0 { PLATEAU * peak } else { 1.0 };
        let median_time = {
            let mut sorted = self.times.clone();
            sorted.sort_by(f64::total_cmp);
            sorted[sorted.len() / 2].max(f64::EPSILON)
        };
        let fallback = RecoveryGuess {
            alpha,
            beta: DEFAULT_BETA,
            t1: median_time,
        };

        let residuals: Vec<f64> = signal.iter().map(|s| 1.0 - s / alpha).collect();
        let weights: Vec<f64> = residuals
            .iter()
            .map(|r| if *r > MIN_RESIDUAL { r * r } else { 0.0 })
            .collect();

        let n = self.times.len();
        let x = DMatrix::from_fn(n, 2, |r, c| if c == 0 { 1.0 } else { self.times[r] });
        let y = DVector::from_iterator(n, residuals.iter().map(|r| r.max(MIN_RESIDUAL).ln()));
        let Some(beta) = solve_weighted_least_squares(&x, &y, &weights) else {
            return fallback;
        };
        let (intercept, slope) = (beta[0], beta[1]);
        if !(slope < 0.0) {
            return fallback;
        }
        RecoveryGuess {
            alpha,
            beta: intercept.exp().clamp(0.0, MAX_BETA),
            t1: -1.0 / slope,
        }
    }
}

impl VoxelFit for ExpRecoveryFit {
    fn model(&self) -> ModelKind {
        ModelKind::Exprec
    }

    fn input_dim(&self) -> usize {
        self.times.len()
    }

    fn fit(&self, signal: &[f64]) -> Option<Vec<f64>> {
        let guess = self.guess(signal);
        let objective = |x: &[f64]| -> f64 {
            self.predict(x[0] * guess.alpha, x[1], x[2] * guess.t1)
                .iter()
                .zip(signal)
                .map(|(p, s)| ((p - s) / guess.alpha).powi(2))
                .sum()
        };
        let bounds = Bounds::new(vec![0.0, 0.0, 1e-3], vec![10.0, MAX_BETA, 100.0]).ok()?;
        let min = minimize(objective, &[1.0, guess.beta, 1.0], &bounds, &self.options).ok()?;

        Some(vec![min.x[0] * guess.alpha, min.x[1], min.x[2] * guess.t1])
    }
}
