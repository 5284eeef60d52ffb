//! Configuration-driven entry points.
//!
//! Each function validates the whole configuration first, then wires the
//! grid, kernel, estimator and fitting components together for one task:
//! smoothing, fusion, zooming, axial fusion, peak extraction or per-voxel
//! fitting. Callers own file I/O and argument parsing.

use nalgebra::Vector3;

use crate::cluster::{LandmarkOptions, landmarks};
use crate::domain::EstimationConfig;
use crate::engine::{AxialFusion, AxialFusionOutput, KernelEngine, SpharmPeaks};
use crate::error::{Error, Result};
use crate::fit::{ExpRecoveryFit, SmtFit, fit_volume};
use crate::grid::{Mask, SamplingGrid, Volume};

/// Kernel smoothing of a model volume.
pub fn run_smooth(config: &EstimationConfig, source: &Volume, mask: Option<&Mask>) -> Result<Volume> {
    config.validate()?;
    KernelEngine::from_config(config)?.smooth(source, mask)
}

/// Joint kernel estimate from repeated model volumes.
pub fn run_fuse(config: &EstimationConfig, sources: &[&Volume], mask: Option<&Mask>) -> Result<Volume> {
    config.validate()?;
    log::info!("fusing {} {} volume(s)", sources.len(), config.model);
    KernelEngine::from_config(config)?.fuse(sources, mask)
}

/// Kernel zoom of a model volume by an isotropic factor.
pub fn run_zoom(
    config: &EstimationConfig,
    source: &Volume,
    mask: Option<&Mask>,
    factor: f64,
) -> Result<Volume> {
    config.validate()?;
    KernelEngine::from_config(config)?.zoom(source, mask, factor)
}

/// Kernel resampling of a model volume onto `output`.
pub fn run_resample(
    config: &EstimationConfig,
    source: &Volume,
    mask: Option<&Mask>,
    output: &SamplingGrid,
) -> Result<Volume> {
    config.validate()?;
    KernelEngine::from_config(config)?.resample(source, mask, output)
}

/// Voxelwise axial fusion of 3-vector volumes.
pub fn run_axial_fuse(inputs: &[&Volume], mask: Option<&Mask>) -> Result<AxialFusionOutput> {
    let first = inputs
        .first()
        .ok_or_else(|| Error::config("axial fusion needs at least one input volume"))?;
    let mut fusion = new_fusion(first.grid(), mask)?;

    log::info!("using {} input axial volume(s)", inputs.len());
    for input in inputs {
        fusion.update(input)?;
    }
    Ok(fusion.compile())
}

/// Voxelwise axial fusion of a polar/azimuthal angle pair.
pub fn run_axial_fuse_spherical(
    thetas: &Volume,
    phis: &Volume,
    mask: Option<&Mask>,
) -> Result<AxialFusionOutput> {
    let mut fusion = new_fusion(thetas.grid(), mask)?;
    log::info!("using spherical coordinate input");
    fusion.update_spherical(thetas, phis)?;
    Ok(fusion.compile())
}

fn new_fusion(grid: &SamplingGrid, mask: Option<&Mask>) -> Result<AxialFusion> {
    let fusion = AxialFusion::new(grid.clone());
    match mask {
        Some(mask) => fusion.with_mask(mask.clone()),
        None => Ok(fusion),
    }
}

/// Peaks of every voxel of a spherical harmonic volume, encoded as fibers.
pub fn run_peaks(config: &EstimationConfig, source: &Volume, mask: Option<&Mask>) -> Result<Volume> {
    config.validate()?;
    SpharmPeaks::new(source.dim(), &config.peaks)?.volume(source, mask, config.kernel.threads)
}

/// Peaks of the kernel-smoothed spherical harmonic function at world points.
///
/// Points where no estimate can be formed yield `None`.
pub fn run_peak_field(
    config: &EstimationConfig,
    source: &Volume,
    mask: Option<&Mask>,
    points: &[Vector3<f64>],
) -> Result<Vec<Option<Vec<f64>>>> {
    config.validate()?;
    let engine = KernelEngine::from_config(config)?;
    let finder = SpharmPeaks::new(source.dim(), &config.peaks)?;
    points
        .iter()
        .map(|p| Ok(finder.peaks_at(&engine, source, mask, p)?.map(|f| f.encode())))
        .collect()
}

/// Single- or multi-shell MC-SMT fit of a diffusion signal volume.
pub fn run_smt_fit(
    config: &EstimationConfig,
    bvals: &[f64],
    signal: &Volume,
    mask: Option<&Mask>,
) -> Result<Volume> {
    config.validate()?;
    let fit = SmtFit::new(bvals, &config.fit)?;
    log::info!(
        "fitting {} shell(s) with diffusivity {}",
        fit.shells().bvals().len(),
        config.fit.diffusivity
    );
    fit_volume(signal, mask, &fit, config.fit.threads)
}

/// Exponential recovery fit of a relaxometry signal volume.
pub fn run_exprec_fit(
    config: &EstimationConfig,
    times: &[f64],
    signal: &Volume,
    mask: Option<&Mask>,
) -> Result<Volume> {
    config.validate()?;
    let fit = ExpRecoveryFit::new(times, &config.fit)?;
    fit_volume(signal, mask, &fit, config.fit.threads)
}

/// Landmarks of a point cloud, seeded from the fibers clustering options.
pub fn run_landmarks(
    config: &EstimationConfig,
    points: &[Vector3<f64>],
    num: usize,
    radius: Option<f64>,
) -> Result<Vec<Vector3<f64>>> {
    config.validate()?;
    let opts = LandmarkOptions {
        num,
        radius,
        restarts: config.fibers.restarts,
        seed: config.fibers.seed,
        ..LandmarkOptions::default()
    };
    landmarks(points, &opts)
}
