//! Per-voxel fitting over a signal volume.

use crate::domain::ModelKind;
use crate::engine::for_each_voxel;
use crate::error::{Error, Result};
use crate::grid::{Mask, Volume};

/// A model fitted independently in every voxel.
pub trait VoxelFit: Sync {
    /// Model kind of the fitted parameters.
    fn model(&self) -> ModelKind;

    /// Number of signal measurements per voxel.
    fn input_dim(&self) -> usize;

    fn output_dim(&self) -> usize {
        3
    }

    /// Fitted parameters, or `None` if the voxel cannot be fitted.
    fn fit(&self, signal: &[f64]) -> Option<Vec<f64>>;
}

/// Fit every valid voxel of `signal` on `threads` workers.
///
/// Voxels outside the mask, voxels with non-finite input and failed fits are
/// left at zero.
pub fn fit_volume<F: VoxelFit>(
    signal: &Volume,
    mask: Option<&Mask>,
    fit: &F,
    threads: usize,
) -> Result<Volume> {
    if signal.dim() != fit.input_dim() {
        return Err(Error::dimension(
            fit.model().display_name(),
            signal.dim(),
            format!("fit expects {} measurements per voxel", fit.input_dim()),
        ));
    }
    if threads == 0 {
        return Err(Error::config("threads must be >= 1"));
    }
    if let Some(mask) = mask {
        mask.check_grid(signal.grid())?;
    }

    let grid = signal.grid();
    log::info!(
        "fitting {} model in {} voxels with {} thread(s)",
        fit.model(),
        mask.map_or(grid.size(), Mask::count),
        threads
    );

    let mut out = Volume::zeros(grid.clone(), fit.output_dim());
    for_each_voxel(&mut out, threads, |idx, chunk| {
        if mask.is_some_and(|m| !m.get(&grid.sample(idx))) {
            return;
        }
        let values = signal.slot(idx);
        if values.iter().any(|v| !v.is_finite()) {
            return;
        }
        if let Some(params) = fit.fit(values) {
            if params.len() == chunk.len() && params.iter().all(|p| p.is_finite()) {
                chunk.copy_from_slice(&params);
            }
        }
    })?;

    log::info!("finished fitting");
    Ok(out)
}
