//! Online voxelwise fusion of axial volumes.
//!
//! Volumes are folded in one at a time with `update` (3-vector axes) or
//! `update_spherical` (theta/phi angle pairs); `compile` then produces the
//! per-voxel principal axis, its eigenvalue and the coherence.

use nalgebra::Vector3;

use crate::error::{Error, Result};
use crate::estimate::AxialAccumulator;
use crate::grid::{Mask, SamplingGrid, Volume};

#[derive(Debug, Clone)]
pub struct AxialFusion {
    grid: SamplingGrid,
    mask: Option<Mask>,
    accs: Vec<AxialAccumulator>,
    inputs: usize,
}

/// Compiled fusion outputs on the fusion grid.
#[derive(Debug, Clone, PartialEq)]
pub struct AxialFusionOutput {
    /// Principal axis (3 channels).
    pub mean: Volume,
    /// Dominant eigenvalue of the mean dyadic (1 channel).
    pub lambda: Volume,
    /// Dominant eigenvalue over the trace (1 channel).
    pub coherence: Volume,
}

impl AxialFusion {
    pub fn new(grid: SamplingGrid) -> Self {
        let accs = vec![AxialAccumulator::new(); grid.size()];
        Self {
            grid,
            mask: None,
            accs,
            inputs: 0,
        }
    }

    pub fn with_mask(mut self, mask: Mask) -> Result<Self> {
        mask.check_grid(&self.grid)?;
        self.mask = Some(mask);
        Ok(self)
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    /// Fold in a volume of axes.
    pub fn update(&mut self, volume: &Volume) -> Result<()> {
        self.check(volume, 3)?;
        self.fold(|idx| {
            let v = volume.slot(idx);
            Vector3::new(v[0], v[1], v[2])
        });
        Ok(())
    }

    /// Fold in axes given as polar (`thetas`) and azimuthal (`phis`) angles.
    pub fn update_spherical(&mut self, thetas: &Volume, phis: &Volume) -> Result<()> {
        self.check(thetas, 1)?;
        self.check(phis, 1)?;
        self.fold(|idx| {
            let (theta, phi) = (thetas.slot(idx)[0], phis.slot(idx)[0]);
            Vector3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos())
        });
        Ok(())
    }

    pub fn compile(&self) -> AxialFusionOutput {
        log::info!("compiling axial statistics from {} input(s)", self.inputs);
        let mut mean = Volume::zeros(self.grid.clone(), 3);
        let mut lambda = Volume::zeros(self.grid.clone(), 1);
        let mut coherence = Volume::zeros(self.grid.clone(), 1);

        for (idx, acc) in self.accs.iter().enumerate() {
            let Some(stats) = acc.compile() else {
                continue;
            };
            let s = self.grid.sample(idx);
            mean.set(&s, stats.mean.as_slice());
            lambda.set(&s, &[stats.lambda]);
            coherence.set(&s, &[stats.coherence]);
        }

        AxialFusionOutput {
            mean,
            lambda,
            coherence,
        }
    }

    fn check(&self, volume: &Volume, dim: usize) -> Result<()> {
        if !volume.grid().same_geometry(&self.grid) {
            return Err(Error::mismatch("axial input does not match the fusion grid"));
        }
        if volume.dim() != dim {
            return Err(Error::dimension(
                "axial",
                volume.dim(),
                format!("expected {dim} channel(s)"),
            ));
        }
        Ok(())
    }

    fn fold(&mut self, axis: impl Fn(usize) -> Vector3<f64>) {
        for (idx, acc) in self.accs.iter_mut().enumerate() {
            if let Some(mask) = &self.mask {
                if !mask.get(&self.grid.sample(idx)) {
                    continue;
                }
            }
            acc.update(1.0, &axis(idx));
        }
        self.inputs += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Sample;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn fused_axes_ignore_sign() {
        let grid = SamplingGrid::unit(2, 1, 1).unwrap();
        let mut fusion = AxialFusion::new(grid.clone());
        fusion.update(&Volume::constant(grid.clone(), &[0.0, 1.0, 0.0])).unwrap();
        fusion.update(&Volume::constant(grid, &[0.0, -1.0, 0.0])).unwrap();
        let out = fusion.compile();

        assert_eq!(fusion.inputs(), 2);
        let s = Sample::new(1, 0, 0);
        assert!((out.mean.values(&s)[1] - 1.0).abs() < 1e-12);
        assert!((out.lambda.values(&s)[0] - 1.0).abs() < 1e-12);
        assert!((out.coherence.values(&s)[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn orthogonal_axes_lower_the_coherence() {
        let grid = SamplingGrid::unit(1, 1, 1).unwrap();
        let mut fusion = AxialFusion::new(grid.clone());
        for axis in [[1.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]] {
            fusion.update(&Volume::constant(grid.clone(), &axis)).unwrap();
        }
        let out = fusion.compile();
        assert!((out.lambda.slot(0)[0] - 2.0 / 3.0).abs() < 1e-12);
        assert!((out.mean.slot(0)[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn spherical_input_matches_cartesian() {
        let grid = SamplingGrid::unit(1, 1, 1).unwrap();
        let mut fusion = AxialFusion::new(grid.clone());
        fusion
            .update_spherical(
                &Volume::constant(grid.clone(), &[FRAC_PI_2]),
                &Volume::constant(grid, &[FRAC_PI_2]),
            )
            .unwrap();
        let out = fusion.compile();
        assert!((out.mean.slot(0)[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn masked_voxels_stay_empty() {
        let grid = SamplingGrid::unit(2, 1, 1).unwrap();
        let mask = Mask::from_fn(grid.clone(), |s| s.i == 0);
        let mut fusion = AxialFusion::new(grid.clone()).with_mask(mask).unwrap();
        fusion.update(&Volume::constant(grid, &[1.0, 0.0, 0.0])).unwrap();
        let out = fusion.compile();
        assert_eq!(out.mean.slot(1), &[0.0, 0.0, 0.0]);
        assert_eq!(out.lambda.slot(1), &[0.0]);
        assert!((out.mean.slot(0)[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        let grid = SamplingGrid::unit(2, 1, 1).unwrap();
        let mut fusion = AxialFusion::new(grid.clone());
        assert!(fusion.update(&Volume::constant(grid, &[1.0, 0.0])).is_err());
        let other = SamplingGrid::unit(3, 1, 1).unwrap();
        assert!(fusion.update(&Volume::constant(other, &[1.0, 0.0, 0.0])).is_err());
        assert_eq!(fusion.inputs(), 0);
    }
}
