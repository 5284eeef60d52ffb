//! Structured 3D sampling grids.
//!
//! A grid maps integer voxel coordinates to world space:
//!
//! ```text
//! world = origin + R · (spacing ⊙ voxel)
//! ```
//!
//! where `R` is the orientation matrix. Linear indices run with `i` fastest,
//! i.e. `index = i + ni * (j + nj * k)`.

use nalgebra::{Matrix3, Vector3};

use crate::error::{Error, Result};

/// Tolerance used when comparing grid geometry.
const GEOMETRY_EPS: f64 = 1e-6;

/// An integer grid coordinate.
///
/// Components are signed so that neighborhood offsets may step outside a grid;
/// use [`SamplingGrid::contains`] before addressing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Sample {
    pub i: i64,
    pub j: i64,
    pub k: i64,
}

impl Sample {
    pub const fn new(i: i64, j: i64, k: i64) -> Self {
        Self { i, j, k }
    }

    pub fn offset(self, di: i64, dj: i64, dk: i64) -> Self {
        Self::new(self.i + di, self.j + dj, self.k + dk)
    }

    fn to_vector(self) -> Vector3<f64> {
        Vector3::new(self.i as f64, self.j as f64, self.k as f64)
    }
}

/// Geometry of a 3D voxel grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingGrid {
    origin: Vector3<f64>,
    orientation: Matrix3<f64>,
    inverse: Matrix3<f64>,
    spacing: Vector3<f64>,
    extents: [usize; 3],
}

impl SamplingGrid {
    /// Create a grid, validating spacing and orientation.
    pub fn new(
        origin: Vector3<f64>,
        orientation: Matrix3<f64>,
        spacing: Vector3<f64>,
        extents: [usize; 3],
    ) -> Result<Self> {
        if spacing.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(Error::geometry(format!(
                "spacing must be finite and > 0, got ({}, {}, {})",
                spacing.x, spacing.y, spacing.z
            )));
        }
        if origin.iter().any(|v| !v.is_finite()) {
            return Err(Error::geometry("origin must be finite"));
        }
        let inverse = orientation
            .try_inverse()
            .filter(|m| m.iter().all(|v| v.is_finite()))
            .ok_or_else(|| Error::geometry("orientation matrix is singular"))?;

        Ok(Self {
            origin,
            orientation,
            inverse,
            spacing,
            extents,
        })
    }

    /// Axis-aligned grid at the world origin.
    pub fn axis_aligned(extents: [usize; 3], spacing: [f64; 3]) -> Result<Self> {
        Self::new(
            Vector3::zeros(),
            Matrix3::identity(),
            Vector3::from(spacing),
            extents,
        )
    }

    /// Unit-spaced, axis-aligned grid at the world origin.
    pub fn unit(ni: usize, nj: usize, nk: usize) -> Result<Self> {
        Self::axis_aligned([ni, nj, nk], [1.0, 1.0, 1.0])
    }

    pub fn origin(&self) -> &Vector3<f64> {
        &self.origin
    }

    pub fn orientation(&self) -> &Matrix3<f64> {
        &self.orientation
    }

    pub fn spacing(&self) -> &Vector3<f64> {
        &self.spacing
    }

    pub fn extents(&self) -> [usize; 3] {
        self.extents
    }

    /// Total number of voxels.
    pub fn size(&self) -> usize {
        self.extents[0] * self.extents[1] * self.extents[2]
    }

    pub fn contains(&self, s: &Sample) -> bool {
        s.i >= 0
            && s.j >= 0
            && s.k >= 0
            && (s.i as usize) < self.extents[0]
            && (s.j as usize) < self.extents[1]
            && (s.k as usize) < self.extents[2]
    }

    /// Linear index of a sample. The sample must be contained in the grid.
    pub fn index(&self, s: &Sample) -> usize {
        debug_assert!(self.contains(s), "sample {s:?} outside grid");
        let [ni, nj, _] = self.extents;
        s.i as usize + ni * (s.j as usize + nj * s.k as usize)
    }

    /// Inverse of [`SamplingGrid::index`].
    pub fn sample(&self, index: usize) -> Sample {
        let [ni, nj, _] = self.extents;
        let i = index % ni;
        let j = (index / ni) % nj;
        let k = index / (ni * nj);
        Sample::new(i as i64, j as i64, k as i64)
    }

    /// Iterate all samples in index order.
    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        (0..self.size()).map(move |idx| self.sample(idx))
    }

    pub fn voxel_to_world(&self, s: &Sample) -> Vector3<f64> {
        self.continuous_to_world(&s.to_vector())
    }

    /// Map a continuous voxel coordinate to world space.
    pub fn continuous_to_world(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.origin + self.orientation * v.component_mul(&self.spacing)
    }

    /// Map a world point to continuous voxel coordinates.
    pub fn world_to_voxel(&self, p: &Vector3<f64>) -> Vector3<f64> {
        (self.inverse * (p - self.origin)).component_div(&self.spacing)
    }

    /// Nearest sample to a world point (may lie outside the grid).
    pub fn nearest(&self, p: &Vector3<f64>) -> Sample {
        let v = self.world_to_voxel(p);
        Sample::new(
            v.x.round() as i64,
            v.y.round() as i64,
            v.z.round() as i64,
        )
    }

    /// Grow the grid by `pi/pj/pk` voxels on both sides of each axis.
    pub fn pad(&self, pi: usize, pj: usize, pk: usize) -> Result<Self> {
        let shift = Vector3::new(-(pi as f64), -(pj as f64), -(pk as f64));
        Self::new(
            self.continuous_to_world(&shift),
            self.orientation,
            self.spacing,
            [
                self.extents[0] + 2 * pi,
                self.extents[1] + 2 * pj,
                self.extents[2] + 2 * pk,
            ],
        )
    }

    /// Sub-grid covering `[first, last)`.
    pub fn range(&self, first: &Sample, last: &Sample) -> Result<Self> {
        let lo = [first.i, first.j, first.k];
        let hi = [last.i, last.j, last.k];
        let mut extents = [0usize; 3];
        for axis in 0..3 {
            if lo[axis] < 0 || hi[axis] < lo[axis] || hi[axis] as usize > self.extents[axis] {
                return Err(Error::geometry(format!(
                    "invalid range on axis {axis}: [{}, {}) within extent {}",
                    lo[axis], hi[axis], self.extents[axis]
                )));
            }
            extents[axis] = (hi[axis] - lo[axis]) as usize;
        }
        Self::new(
            self.voxel_to_world(first),
            self.orientation,
            self.spacing,
            extents,
        )
    }

    /// Isotropic zoom: extents scaled by `factor`, spacing divided by it.
    pub fn zoom(&self, factor: f64) -> Result<Self> {
        self.zoom_axes([factor, factor, factor])
    }

    /// Per-axis zoom. The origin is preserved.
    pub fn zoom_axes(&self, factors: [f64; 3]) -> Result<Self> {
        if factors.iter().any(|f| !(f.is_finite() && *f > 0.0)) {
            return Err(Error::geometry(format!(
                "zoom factors must be finite and > 0, got {factors:?}"
            )));
        }
        let mut extents = self.extents;
        let mut spacing = self.spacing;
        for axis in 0..3 {
            extents[axis] = (self.extents[axis] as f64 * factors[axis]).round() as usize;
            spacing[axis] /= factors[axis];
        }
        Self::new(self.origin, self.orientation, spacing, extents)
    }

    /// Same grid with a new origin.
    pub fn with_origin(&self, origin: Vector3<f64>) -> Result<Self> {
        Self::new(origin, self.orientation, self.spacing, self.extents)
    }

    /// Same grid with a new voxel spacing.
    pub fn with_spacing(&self, spacing: Vector3<f64>) -> Result<Self> {
        Self::new(self.origin, self.orientation, spacing, self.extents)
    }

    /// Equal extents and geometry within a small tolerance.
    pub fn same_geometry(&self, other: &SamplingGrid) -> bool {
        self.extents == other.extents
            && (self.origin - other.origin).amax() < GEOMETRY_EPS
            && (self.spacing - other.spacing).amax() < GEOMETRY_EPS
            && (self.orientation - other.orientation).amax() < GEOMETRY_EPS
    }
}
