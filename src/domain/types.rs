//! Shared domain types.
//!
//! This module defines:
//!
//! - model identities (`ModelKind`) and their encoding rules
//! - kernel and selection enums used by the estimation engine
//! - the serializable run configuration (`EstimationConfig`) and its validation

use std::str::FromStr;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A fixed-length per-voxel model encoding.
///
/// Length and meaning are determined by a `ModelKind`; the engine treats it
/// opaquely and only interprets it through the model helpers in `models`.
pub type ModelVector = DVector<f64>;

/// Which model a volume encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Generic vector of any length.
    Vect,
    /// Diffusion tensor: `[s0, dxx, dxy, dxz, dyy, dyz, dzz]`.
    Tensor,
    /// Multi-compartment fibers: `[base, diff, (frac, x, y, z) × n]`.
    Fibers,
    /// NODDI: `[baseline, ficvf, fiso, odi, x, y, z]`.
    Noddi,
    /// Real symmetric spherical harmonic coefficients (even orders).
    Spharm,
    /// A single orientation with sign ambiguity.
    Axial,
    /// Multi-compartment spherical mean fit output: `[base, frac, diff]`.
    Mcsmt,
    /// Exponential recovery fit output: `[alpha, beta, t1]`.
    Exprec,
}

impl ModelKind {
    pub const ALL: [ModelKind; 8] = [
        ModelKind::Vect,
        ModelKind::Tensor,
        ModelKind::Fibers,
        ModelKind::Noddi,
        ModelKind::Spharm,
        ModelKind::Axial,
        ModelKind::Mcsmt,
        ModelKind::Exprec,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Vect => "vect",
            ModelKind::Tensor => "tensor",
            ModelKind::Fibers => "fibers",
            ModelKind::Noddi => "noddi",
            ModelKind::Spharm => "spharm",
            ModelKind::Axial => "axial",
            ModelKind::Mcsmt => "mcsmt",
            ModelKind::Exprec => "exprec",
        }
    }

    /// Check that `dim` channels form a valid encoding of this model.
    pub fn check_dim(self, dim: usize) -> Result<()> {
        let ok = match self {
            ModelKind::Vect => dim >= 1,
            ModelKind::Tensor | ModelKind::Noddi => dim == 7,
            ModelKind::Fibers => dim >= 6 && (dim - 2) % 4 == 0,
            ModelKind::Spharm => crate::math::spharm_order(dim).is_some(),
            ModelKind::Axial => dim == 3,
            ModelKind::Mcsmt | ModelKind::Exprec => dim == 3,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::dimension(
                self.display_name(),
                dim,
                self.encoding_hint(),
            ))
        }
    }

    fn encoding_hint(self) -> &'static str {
        match self {
            ModelKind::Vect => "expected at least one channel",
            ModelKind::Tensor => "expected 7 channels [s0, dxx, dxy, dxz, dyy, dyz, dzz]",
            ModelKind::Fibers => "expected 2 + 4n channels with n >= 1",
            ModelKind::Noddi => "expected 7 channels [baseline, ficvf, fiso, odi, x, y, z]",
            ModelKind::Spharm => "expected (L+1)(L+2)/2 channels for an even order L",
            ModelKind::Axial => "expected 3 channels",
            ModelKind::Mcsmt => "expected 3 channels [base, frac, diff]",
            ModelKind::Exprec => "expected 3 channels [alpha, beta, t1]",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        ModelKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.display_name() == lower)
            .ok_or_else(|| Error::UnknownModel {
                name: s.to_string(),
            })
    }
}

/// Separable spatial kernel shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelKind {
    /// `exp(-|offset * spacing|^2 / hpos^2)`.
    Gaussian,
    /// Linear ramp reaching zero one voxel beyond the support.
    Triangle,
    /// Uniform inside the support.
    Box,
}

/// How the multi-component estimator picks its number of components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionRule {
    /// Use as many components as allowed (and available).
    Fixed,
    /// Minimize `cost_k + lambda * k` over `k = 1..=maxcomps`.
    Penalized { lambda: f64 },
}

/// Kernel and dispatch options for the estimation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub kernel: KernelKind,
    /// Filter radius in voxels.
    pub support: usize,
    /// Positional bandwidth (mm).
    pub hpos: f64,
    /// Directionally adaptive bandwidth.
    pub hdir: Option<f64>,
    /// Baseline signal adaptive bandwidth.
    pub hsig: Option<f64>,
    pub threads: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            kernel: KernelKind::Gaussian,
            support: 3,
            hpos: 1.0,
            hdir: None,
            hsig: None,
            threads: 1,
        }
    }
}

/// Options for the multi-component (fibers) estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FibersConfig {
    pub selection: SelectionRule,
    /// Maximum number of output compartments (also the output encoding size).
    pub maxcomps: usize,
    /// Compartments with a smaller volume fraction are dropped.
    pub minfrac: f64,
    /// Clustering restarts per candidate component count.
    pub restarts: usize,
    pub seed: u64,
}

impl Default for FibersConfig {
    fn default() -> Self {
        Self {
            selection: SelectionRule::Fixed,
            maxcomps: 3,
            minfrac: 0.01,
            restarts: 5,
            seed: 42,
        }
    }
}

/// Options for the per-voxel nonlinear fits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub rhobeg: f64,
    pub rhoend: f64,
    pub maxiter: usize,
    /// Fixed intrinsic diffusivity (mm^2/s).
    pub diffusivity: f64,
    /// Initial intra-axonal volume fraction.
    pub frac: f64,
    pub threads: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            rhobeg: 0.1,
            rhoend: 1e-3,
            maxiter: 5000,
            diffusivity: 1.7e-3,
            frac: 0.5,
            threads: 1,
        }
    }
}

/// Options for spherical harmonic peak extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeaksConfig {
    pub max_peaks: usize,
    /// Minimum amplitude relative to the largest peak.
    pub min_amp: f64,
    /// Number of hemisphere directions searched.
    pub resolution: usize,
    /// Angular neighborhood (degrees) used to test for a local maximum.
    pub angle: f64,
}

impl Default for PeaksConfig {
    fn default() -> Self {
        Self {
            max_peaks: 3,
            min_amp: 0.1,
            resolution: 2000,
            angle: 15.0,
        }
    }
}

/// Complete configuration of an estimation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationConfig {
    pub model: ModelKind,
    pub kernel: KernelConfig,
    pub fibers: FibersConfig,
    pub fit: FitConfig,
    pub peaks: PeaksConfig,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::Vect,
            kernel: KernelConfig::default(),
            fibers: FibersConfig::default(),
            fit: FitConfig::default(),
            peaks: PeaksConfig::default(),
        }
    }
}

impl EstimationConfig {
    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: EstimationConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.kernel.validate()?;
        self.fibers.validate()?;
        self.fit.validate()?;
        self.peaks.validate()
    }
}

impl KernelConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.hpos.is_finite() && self.hpos > 0.0) {
            return Err(Error::config(format!("hpos must be > 0, got {}", self.hpos)));
        }
        if let Some(h) = self.hdir {
            if !(h.is_finite() && h > 0.0) {
                return Err(Error::config(format!("hdir must be > 0, got {h}")));
            }
        }
        if let Some(h) = self.hsig {
            if !(h.is_finite() && h > 0.0) {
                return Err(Error::config(format!("hsig must be > 0, got {h}")));
            }
        }
        if self.threads == 0 {
            return Err(Error::config("threads must be >= 1"));
        }
        Ok(())
    }
}

impl FibersConfig {
    pub fn validate(&self) -> Result<()> {
        if self.maxcomps == 0 {
            return Err(Error::config("maxcomps must be >= 1"));
        }
        if !(self.minfrac.is_finite() && (0.0..1.0).contains(&self.minfrac)) {
            return Err(Error::config(format!("minfrac must be in [0, 1), got {}", self.minfrac)));
        }
        if let SelectionRule::Penalized { lambda } = self.selection {
            if !(lambda.is_finite() && lambda >= 0.0) {
                return Err(Error::config(format!("selection lambda must be >= 0, got {lambda}")));
            }
        }
        Ok(())
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.rhobeg.is_finite() && self.rhobeg > 0.0) {
            return Err(Error::config(format!("rhobeg must be > 0, got {}", self.rhobeg)));
        }
        if !(self.rhoend.is_finite() && self.rhoend > 0.0 && self.rhoend <= self.rhobeg) {
            return Err(Error::config(format!(
                "rhoend must be in (0, rhobeg], got {}",
                self.rhoend
            )));
        }
        if self.maxiter == 0 {
            return Err(Error::config("maxiter must be >= 1"));
        }
        if !(self.diffusivity.is_finite() && self.diffusivity > 0.0) {
            return Err(Error::config("diffusivity must be > 0"));
        }
        if !(self.frac.is_finite() && (0.0..=1.0).contains(&self.frac)) {
            return Err(Error::config("frac must be in [0, 1]"));
        }
        if self.threads == 0 {
            return Err(Error::config("threads must be >= 1"));
        }
        Ok(())
    }
}

impl PeaksConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_peaks == 0 {
            return Err(Error::config("max_peaks must be >= 1"));
        }
        if self.resolution < 10 {
            return Err(Error::config("peak resolution must be >= 10"));
        }
        if !(self.min_amp.is_finite() && self.min_amp >= 0.0) {
            return Err(Error::config("min_amp must be >= 0"));
        }
        if !(self.angle.is_finite() && self.angle > 0.0 && self.angle < 90.0) {
            return Err(Error::config("peak angle must be in (0, 90) degrees"));
        }
        Ok(())
    }
}
