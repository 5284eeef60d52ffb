//! Kernel-weighted volume estimation.
//!
//! For each output voxel the engine:
//! - maps the voxel into the source grid (identity, or world-space resampling
//!   to the nearest source voxel)
//! - enumerates the neighborhood pattern and drops neighbors outside the grid
//!   or the mask
//! - weights the remaining neighbors (spatial × adaptive factors)
//! - hands `(weights, vectors)` to the model estimator
//!
//! Voxels are dispatched with [`for_each_voxel`], each writing its own output
//! chunk, so results do not depend on the number of threads.

use nalgebra::Vector3;

use crate::domain::{EstimationConfig, FibersConfig, KernelConfig, ModelKind, ModelVector};
use crate::engine::for_each_voxel;
use crate::error::{Error, Result};
use crate::estimate::ModelEstimator;
use crate::grid::{Mask, Sample, SamplingGrid, Volume};
use crate::kernel::{AdaptiveWeighting, Kernel, NeighborhoodPattern};

#[derive(Debug, Clone)]
pub struct KernelEngine {
    model: ModelKind,
    config: KernelConfig,
    weighting: AdaptiveWeighting,
    estimator: ModelEstimator,
}

/// Per-run state shared by all workers.
struct Plan<'a> {
    sources: &'a [&'a Volume],
    mask: Option<&'a Mask>,
    kernel: Kernel,
    pattern: NeighborhoodPattern,
}

impl KernelEngine {
    pub fn new(model: ModelKind, config: KernelConfig, fibers: &FibersConfig) -> Result<Self> {
        config.validate()?;
        fibers.validate()?;
        Ok(Self {
            model,
            weighting: AdaptiveWeighting::from_config(model, &config),
            estimator: ModelEstimator::for_model(model, fibers),
            config,
        })
    }

    pub fn from_config(config: &EstimationConfig) -> Result<Self> {
        Self::new(config.model, config.kernel.clone(), &config.fibers)
    }

    pub fn model(&self) -> ModelKind {
        self.model
    }

    pub fn estimator(&self) -> &ModelEstimator {
        &self.estimator
    }

    /// Kernel-weighted estimate on the source grid.
    pub fn smooth(&self, source: &Volume, mask: Option<&Mask>) -> Result<Volume> {
        self.run(&[source], mask, source.grid())
    }

    /// Joint estimate from several volumes of equal geometry.
    ///
    /// Each source contributes every valid neighbor at weight
    /// `spatial / sources.len()`.
    pub fn fuse(&self, sources: &[&Volume], mask: Option<&Mask>) -> Result<Volume> {
        let first = sources
            .first()
            .ok_or_else(|| Error::config("fusion needs at least one input volume"))?;
        self.run(sources, mask, first.grid())
    }

    /// Estimate on an arbitrary output grid by world-space resampling.
    pub fn resample(&self, source: &Volume, mask: Option<&Mask>, output: &SamplingGrid) -> Result<Volume> {
        self.run(&[source], mask, output)
    }

    pub fn zoom(&self, source: &Volume, mask: Option<&Mask>, factor: f64) -> Result<Volume> {
        let output = source.grid().zoom(factor)?;
        self.resample(source, mask, &output)
    }

    /// Estimate at a single world point; `None` if no estimate can be formed.
    pub fn estimate_at(
        &self,
        source: &Volume,
        mask: Option<&Mask>,
        world: &Vector3<f64>,
    ) -> Result<Option<ModelVector>> {
        let sources = [source];
        let plan = self.plan(&sources, mask)?;
        let continuous = source.grid().world_to_voxel(world);
        Ok(self.estimate_voxel(&plan, source.grid().nearest(world), Some(&continuous)))
    }

    fn plan<'a>(&self, sources: &'a [&'a Volume], mask: Option<&'a Mask>) -> Result<Plan<'a>> {
        let first = sources
            .first()
            .ok_or_else(|| Error::config("no input volume given"))?;
        self.model.check_dim(first.dim())?;
        for other in &sources[1..] {
            if self.model == ModelKind::Fibers {
                // Compartment counts may differ; the estimator converts to `maxcomps`.
                self.model.check_dim(other.dim())?;
            } else if other.dim() != first.dim() {
                return Err(Error::mismatch(format!(
                    "input volumes have {} and {} channels",
                    first.dim(),
                    other.dim()
                )));
            }
            if !other.grid().same_geometry(first.grid()) {
                return Err(Error::mismatch("input volumes do not share a sampling grid"));
            }
        }
        if let Some(mask) = mask {
            mask.check_grid(first.grid())?;
        }

        let kernel = Kernel::from_config(&self.config, first.grid().spacing());
        let pattern = NeighborhoodPattern::new(&kernel);
        Ok(Plan {
            sources,
            mask,
            kernel,
            pattern,
        })
    }

    fn run(&self, sources: &[&Volume], mask: Option<&Mask>, output: &SamplingGrid) -> Result<Volume> {
        let plan = self.plan(sources, mask)?;
        let source_grid = sources[0].grid();
        let identity = output.same_geometry(source_grid);
        let out_dim = self.estimator.output_dim(sources[0].dim());
        let mut out = Volume::zeros(output.clone(), out_dim);

        let total = output.size();
        log::info!(
            "estimating {} model over {} voxels from {} input(s) with {} thread(s)",
            self.model,
            total,
            sources.len(),
            self.config.threads
        );
        log::debug!(
            "kernel {:?}, support {}, hpos {}, hdir {:?}, hsig {:?}, identity geometry {}",
            self.config.kernel,
            self.config.support,
            self.config.hpos,
            self.config.hdir,
            self.config.hsig,
            identity
        );

        for_each_voxel(&mut out, self.config.threads, |idx, chunk| {
            let sample = output.sample(idx);
            let estimate = if identity {
                self.estimate_voxel(&plan, sample, None)
            } else {
                let world = output.voxel_to_world(&sample);
                let continuous = source_grid.world_to_voxel(&world);
                self.estimate_voxel(&plan, source_grid.nearest(&world), Some(&continuous))
            };
            if let Some(v) = estimate {
                chunk.copy_from_slice(v.as_slice());
            }
        })?;

        log::info!("finished estimating {} voxels", total);
        Ok(out)
    }

    /// Gather, weight and estimate around `center`.
    ///
    /// `continuous` is the exact source-space position when resampling; spatial
    /// weights are then evaluated at the fractional offsets.
    fn estimate_voxel(
        &self,
        plan: &Plan<'_>,
        center: Sample,
        continuous: Option<&Vector3<f64>>,
    ) -> Option<ModelVector> {
        let reference = plan.sources[0];
        if !reference.valid(&center, plan.mask) {
            return None;
        }
        let center_values = reference.values(&center);
        let share = plan.sources.len() as f64;

        let mut weights = Vec::with_capacity(plan.pattern.len() * plan.sources.len());
        let mut vectors: Vec<&[f64]> = Vec::with_capacity(weights.capacity());
        for (offset, base) in plan.pattern.iter() {
            let neighbor = center.offset(offset[0], offset[1], offset[2]);
            if !reference.valid(&neighbor, plan.mask) {
                continue;
            }
            let spatial = match continuous {
                None => base,
                Some(c) => {
                    let at = Vector3::new(neighbor.i as f64, neighbor.j as f64, neighbor.k as f64);
                    plan.kernel.weight_at(&(at - c))
                }
            };
            if !(spatial > 0.0) {
                continue;
            }
            for source in plan.sources {
                let values = source.values(&neighbor);
                weights.push(self.weighting.weight(spatial / share, center_values, values));
                vectors.push(values);
            }
        }

        self.estimator.run(&weights, &vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::KernelKind;
    use crate::estimate::linear_mean;
    use crate::models::Fibers;

    fn gaussian(support: usize, threads: usize) -> KernelConfig {
        KernelConfig {
            kernel: KernelKind::Gaussian,
            support,
            hpos: 1.0,
            hdir: None,
            hsig: None,
            threads,
        }
    }

    fn engine(model: ModelKind, config: KernelConfig) -> KernelEngine {
        KernelEngine::new(model, config, &FibersConfig::default()).unwrap()
    }

    fn ramp(grid: &SamplingGrid) -> Volume {
        Volume::from_fn(grid.clone(), 2, |s| {
            vec![(s.i + 3 * s.j + 9 * s.k) as f64, ((s.i * s.j) as f64).sin()]
        })
    }

    #[test]
    fn identical_vectors_are_reproduced() {
        let grid = SamplingGrid::unit(3, 3, 3).unwrap();
        let value = [0.25, -1.5, 3.0];
        let source = Volume::constant(grid, &value);
        let out = engine(ModelKind::Vect, gaussian(1, 1)).smooth(&source, None).unwrap();
        for idx in 0..out.grid().size() {
            for (o, v) in out.slot(idx).iter().zip(value) {
                assert!((o - v).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn fusing_zero_and_one_gives_one_half() {
        let grid = SamplingGrid::unit(3, 3, 3).unwrap();
        let zeros = Volume::constant(grid.clone(), &[0.0]);
        let ones = Volume::constant(grid.clone(), &[1.0]);
        let mask = Mask::from_fn(grid, |s| s.k < 2);

        let out = engine(ModelKind::Vect, gaussian(1, 2))
            .fuse(&[&zeros, &ones], Some(&mask))
            .unwrap();
        for s in out.grid().samples() {
            let v = out.values(&s)[0];
            if mask.get(&s) {
                assert!((v - 0.5).abs() < 1e-12);
            } else {
                assert_eq!(v, 0.0);
            }
        }
    }

    /// Linear mean over the valid neighbors of `center`, built by hand.
    fn valid_neighbor_mean(
        source: &Volume,
        mask: Option<&Mask>,
        config: &KernelConfig,
        center: Sample,
    ) -> ModelVector {
        let kernel = Kernel::from_config(config, source.grid().spacing());
        let pattern = NeighborhoodPattern::new(&kernel);
        let weighting = AdaptiveWeighting::from_config(ModelKind::Vect, config);

        let mut weights = Vec::new();
        let mut vectors = Vec::new();
        for (offset, base) in pattern.iter() {
            let n = center.offset(offset[0], offset[1], offset[2]);
            if source.valid(&n, mask) {
                weights.push(weighting.weight(base, source.values(&center), source.values(&n)));
                vectors.push(source.values(&n));
            }
        }
        assert!(vectors.len() < pattern.len());
        linear_mean(&weights, &vectors).unwrap()
    }

    #[test]
    fn excluded_neighbors_do_not_contribute() {
        let grid = SamplingGrid::unit(4, 4, 4).unwrap();
        let source = ramp(&grid);
        let mask = Mask::from_fn(grid.clone(), |s| (s.i + s.j + s.k) % 3 != 0);
        let mut config = gaussian(1, 1);
        config.hdir = Some(5.0);
        let eng = engine(ModelKind::Vect, config.clone());

        let masked = eng.smooth(&source, Some(&mask)).unwrap();
        for center in [Sample::new(1, 1, 2), Sample::new(0, 0, 1)] {
            assert!(mask.get(&center));
            let expected = valid_neighbor_mean(&source, Some(&mask), &config, center);
            assert_eq!(masked.values(&center), expected.as_slice());
        }

        // Corners lose every neighbor with a negative index.
        let unmasked = eng.smooth(&source, None).unwrap();
        for center in [Sample::new(0, 0, 0), Sample::new(3, 3, 3)] {
            let expected = valid_neighbor_mean(&source, None, &config, center);
            assert_eq!(unmasked.values(&center), expected.as_slice());
        }
    }

    #[test]
    fn results_do_not_depend_on_thread_count() {
        let grid = SamplingGrid::unit(5, 4, 3).unwrap();
        let source = ramp(&grid);
        let one = engine(ModelKind::Vect, gaussian(2, 1)).smooth(&source, None).unwrap();
        let four = engine(ModelKind::Vect, gaussian(2, 4)).smooth(&source, None).unwrap();
        assert_eq!(one, four);
    }

    #[test]
    fn zoom_doubles_extents_and_keeps_constants() {
        let grid = SamplingGrid::axis_aligned([3, 3, 2], [2.0, 2.0, 2.0]).unwrap();
        let source = Volume::constant(grid, &[7.0]);
        let out = engine(ModelKind::Vect, gaussian(1, 1)).zoom(&source, None, 2.0).unwrap();
        assert_eq!(out.grid().extents(), [6, 6, 4]);
        for idx in 0..out.grid().size() {
            let v = out.slot(idx)[0];
            assert!(v == 0.0 || (v - 7.0).abs() < 1e-12);
        }
        assert!((out.slot(0)[0] - 7.0).abs() < 1e-12);
    }

    #[test]
    fn estimate_at_interpolates_between_voxels() {
        let grid = SamplingGrid::unit(3, 1, 1).unwrap();
        let source = Volume::from_fn(grid, 1, |s| vec![s.i as f64]);
        let eng = engine(ModelKind::Vect, gaussian(1, 1));

        // Centered on voxel 1 with fractional offsets -0.5, 0.5 and 1.5.
        let mid = eng.estimate_at(&source, None, &Vector3::new(0.5, 0.0, 0.0)).unwrap().unwrap();
        let (near, far) = ((-0.25f64).exp(), (-2.25f64).exp());
        let expected = (near + 2.0 * far) / (2.0 * near + far);
        assert!((mid[0] - expected).abs() < 1e-12);

        let outside = eng.estimate_at(&source, None, &Vector3::new(-5.0, 0.0, 0.0)).unwrap();
        assert!(outside.is_none());
    }

    #[test]
    fn fibers_output_uses_the_configured_encoding() {
        let grid = SamplingGrid::unit(2, 2, 1).unwrap();
        let source = Volume::constant(grid, &[10.0, 1e-3, 0.5, 0.0, 0.0, 1.0]);
        let out = engine(ModelKind::Fibers, gaussian(1, 1)).smooth(&source, None).unwrap();
        assert_eq!(out.dim(), Fibers::encoding_size(3));
        let fibers = Fibers::decode(out.slot(0));
        assert!((fibers.comps[0].frac - 0.5).abs() < 1e-12);
        assert!(fibers.comps[0].line.z > 0.999);
    }

    #[test]
    fn fibers_fusion_accepts_different_compartment_counts() {
        let grid = SamplingGrid::unit(2, 2, 1).unwrap();
        let one = Volume::constant(grid.clone(), &[10.0, 1e-3, 0.5, 1.0, 0.0, 0.0]);
        let two = Volume::constant(
            grid,
            &[10.0, 1e-3, 0.3, 0.0, 1.0, 0.0, 0.2, 0.0, 0.0, 1.0],
        );
        let out = engine(ModelKind::Fibers, gaussian(1, 1)).fuse(&[&one, &two], None).unwrap();
        assert_eq!(out.dim(), Fibers::encoding_size(3));

        let fibers = Fibers::decode(out.slot(0));
        assert_eq!(fibers.active().count(), 3);
        assert!((fibers.comps[0].frac - 0.25).abs() < 1e-9);
        assert!(fibers.comps[0].line.x.abs() > 0.999);
        assert!((fibers.comps[1].frac - 0.15).abs() < 1e-9);
        assert!(fibers.comps[1].line.y.abs() > 0.999);
        assert!((fibers.comps[2].frac - 0.1).abs() < 1e-9);
        assert!(fibers.comps[2].line.z.abs() > 0.999);

        let broken = Volume::constant(SamplingGrid::unit(2, 2, 1).unwrap(), &[10.0, 1e-3, 0.5]);
        assert!(matches!(
            engine(ModelKind::Fibers, gaussian(1, 1)).fuse(&[&one, &broken], None),
            Err(Error::Dimension { .. })
        ));
    }

    #[test]
    fn vector_fusion_still_requires_equal_channels() {
        let grid = SamplingGrid::unit(2, 2, 1).unwrap();
        let a = Volume::constant(grid.clone(), &[1.0, 2.0]);
        let b = Volume::constant(grid, &[1.0, 2.0, 3.0]);
        assert!(matches!(
            engine(ModelKind::Vect, gaussian(1, 1)).fuse(&[&a, &b], None),
            Err(Error::GeometryMismatch { .. })
        ));
    }

    #[test]
    fn configuration_errors_fail_before_processing() {
        let grid = SamplingGrid::unit(2, 2, 2).unwrap();
        let other = SamplingGrid::unit(3, 2, 2).unwrap();
        let source = Volume::constant(grid.clone(), &[1.0]);
        let eng = engine(ModelKind::Vect, gaussian(1, 1));

        let mask = Mask::full(other.clone());
        assert!(matches!(eng.smooth(&source, Some(&mask)), Err(Error::GeometryMismatch { .. })));

        let moved = Volume::constant(other, &[1.0]);
        assert!(eng.fuse(&[&source, &moved], None).is_err());
        assert!(eng.fuse(&[], None).is_err());

        let tensor = engine(ModelKind::Tensor, gaussian(1, 1));
        assert!(matches!(tensor.smooth(&source, None), Err(Error::Dimension { .. })));

        let mut bad = gaussian(1, 1);
        bad.threads = 0;
        assert!(KernelEngine::new(ModelKind::Vect, bad, &FibersConfig::default()).is_err());
    }
}
