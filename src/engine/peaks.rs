//! Peak extraction from spherical harmonic orientation functions.
//!
//! The function is evaluated on a Fibonacci hemisphere; local maxima within
//! an angular neighborhood (antipodes included) become fiber compartments
//! with fractions proportional to their amplitude.

use nalgebra::Vector3;

use crate::domain::{ModelKind, PeaksConfig};
use crate::engine::{KernelEngine, for_each_voxel};
use crate::error::{Error, Result};
use crate::grid::{Mask, Volume};
use crate::math::{fibonacci_hemisphere, spharm_basis, spharm_order};
use crate::models::{Compartment, Fibers};

#[derive(Debug, Clone)]
pub struct SpharmPeaks {
    dim: usize,
    max_peaks: usize,
    min_amp: f64,
    dirs: Vec<Vector3<f64>>,
    basis: Vec<Vec<f64>>,
    neighbors: Vec<Vec<usize>>,
}

impl SpharmPeaks {
    /// Peak finder for coefficient vectors of length `dim`.
    pub fn new(dim: usize, config: &PeaksConfig) -> Result<Self> {
        config.validate()?;
        let order = spharm_order(dim).ok_or_else(|| {
            Error::dimension("spharm", dim, "expected (L+1)(L+2)/2 channels for an even order L")
        })?;

        let dirs = fibonacci_hemisphere(config.resolution);
        let basis = dirs.iter().map(|d| spharm_basis(order, d)).collect();
        let cos_angle = config.angle.to_radians().cos();
        let neighbors = dirs
            .iter()
            .enumerate()
            .map(|(i, u)| {
                dirs.iter()
                    .enumerate()
                    .filter(|(j, v)| *j != i && u.dot(v).abs() >= cos_angle)
                    .map(|(j, _)| j)
                    .collect()
            })
            .collect();

        Ok(Self {
            dim,
            max_peaks: config.max_peaks,
            min_amp: config.min_amp,
            dirs,
            basis,
            neighbors,
        })
    }

    pub fn output_dim(&self) -> usize {
        Fibers::encoding_size(self.max_peaks)
    }

    /// Peaks of one function, padded to `max_peaks` compartments.
    ///
    /// `base` holds the largest amplitude; compartments hold the peak axes.
    pub fn peaks(&self, coeffs: &[f64]) -> Fibers {
        let mut out = Fibers::new(0);
        if coeffs.len() != self.dim {
            return out.convert(self.max_peaks);
        }

        let amps: Vec<f64> = self
            .basis
            .iter()
            .map(|b| b.iter().zip(coeffs).map(|(x, c)| x * c).sum())
            .collect();

        let mut found: Vec<usize> = (0..amps.len())
            .filter(|&i| amps[i] > 0.0 && amps[i].is_finite())
            .filter(|&i| {
                self.neighbors[i]
                    .iter()
                    .all(|&j| amps[i] > amps[j] || (amps[i] == amps[j] && i < j))
            })
            .collect();
        found.sort_by(|&a, &b| amps[b].total_cmp(&amps[a]));
        found.truncate(self.max_peaks);

        let Some(&top) = found.first() else {
            return out.convert(self.max_peaks);
        };
        let floor = self.min_amp * amps[top];
        found.retain(|&i| amps[i] >= floor);

        let total: f64 = found.iter().map(|&i| amps[i]).sum();
        out.base = amps[top];
        out.comps = found
            .iter()
            .map(|&i| Compartment {
                frac: amps[i] / total,
                line: self.dirs[i],
            })
            .collect();
        out.convert(self.max_peaks)
    }

    /// Peaks of every voxel of a spherical harmonic volume.
    pub fn volume(&self, source: &Volume, mask: Option<&Mask>, threads: usize) -> Result<Volume> {
        ModelKind::Spharm.check_dim(source.dim())?;
        if source.dim() != self.dim {
            return Err(Error::dimension(
                "spharm",
                source.dim(),
                format!("peak finder was built for {} coefficients", self.dim),
            ));
        }
        if let Some(mask) = mask {
            mask.check_grid(source.grid())?;
        }

        log::info!(
            "extracting up to {} peaks per voxel from {} directions",
            self.max_peaks,
            self.dirs.len()
        );
        let mut out = Volume::zeros(source.grid().clone(), self.output_dim());
        let grid = source.grid();
        for_each_voxel(&mut out, threads, |idx, chunk| {
            if mask.is_some_and(|m| !m.get(&grid.sample(idx))) {
                return;
            }
            let fibers = self.peaks(source.slot(idx));
            chunk.copy_from_slice(&fibers.encode());
        })?;
        Ok(out)
    }

    /// Peaks of the kernel estimate at a world point.
    pub fn peaks_at(
        &self,
        engine: &KernelEngine,
        source: &Volume,
        mask: Option<&Mask>,
        world: &Vector3<f64>,
    ) -> Result<Option<Fibers>> {
        if engine.model() != ModelKind::Spharm {
            return Err(Error::config(format!(
                "peak fields need a spharm engine, got {}",
                engine.model()
            )));
        }
        let estimate = engine.estimate_at(source, mask, world)?;
        Ok(estimate.map(|coeffs| self.peaks(coeffs.as_slice())))
    }
}
