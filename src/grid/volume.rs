//! Multi-channel volumes and binary masks on a `SamplingGrid`.
//!
//! Data is stored voxel-major: the `dim` channels of voxel `idx` live at
//! `data[idx * dim .. (idx + 1) * dim]`. This lets the engine hand each worker
//! a disjoint chunk per output voxel.

use crate::domain::ModelVector;
use crate::error::{Error, Result};
use crate::grid::{Sample, SamplingGrid};

/// A grid of fixed-length vectors, zero by default.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    grid: SamplingGrid,
    dim: usize,
    data: Vec<f64>,
}

impl Volume {
    pub fn zeros(grid: SamplingGrid, dim: usize) -> Self {
        let data = vec![0.0; grid.size() * dim];
        Self { grid, dim, data }
    }

    /// Build a volume from a raw voxel-major buffer.
    pub fn from_data(grid: SamplingGrid, dim: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != grid.size() * dim {
            return Err(Error::mismatch(format!(
                "buffer holds {} values, grid of {} voxels with {dim} channels needs {}",
                data.len(),
                grid.size(),
                grid.size() * dim
            )));
        }
        Ok(Self { grid, dim, data })
    }

    /// Fill every voxel from a function of its sample.
    pub fn from_fn(grid: SamplingGrid, dim: usize, mut f: impl FnMut(&Sample) -> Vec<f64>) -> Self {
        let mut out = Self::zeros(grid, dim);
        for idx in 0..out.grid.size() {
            let s = out.grid.sample(idx);
            let values = f(&s);
            out.slot_mut(idx).copy_from_slice(&values[..dim]);
        }
        out
    }

    /// Every voxel holds `value`.
    pub fn constant(grid: SamplingGrid, value: &[f64]) -> Self {
        Self::from_fn(grid, value.len(), |_| value.to_vec())
    }

    pub fn grid(&self) -> &SamplingGrid {
        &self.grid
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Channels of the voxel at linear index `idx`.
    pub fn slot(&self, idx: usize) -> &[f64] {
        &self.data[idx * self.dim..(idx + 1) * self.dim]
    }

    fn slot_mut(&mut self, idx: usize) -> &mut [f64] {
        let dim = self.dim;
        &mut self.data[idx * dim..(idx + 1) * dim]
    }

    /// Channels at a sample. The sample must be inside the grid.
    pub fn values(&self, s: &Sample) -> &[f64] {
        self.slot(self.grid.index(s))
    }

    pub fn get(&self, s: &Sample) -> ModelVector {
        ModelVector::from_column_slice(self.values(s))
    }

    pub fn set(&mut self, s: &Sample, value: &[f64]) {
        let idx = self.grid.index(s);
        let dim = self.dim;
        self.slot_mut(idx).copy_from_slice(&value[..dim]);
    }

    /// Inside the grid and (when given) inside the mask.
    pub fn valid(&self, s: &Sample, mask: Option<&Mask>) -> bool {
        self.grid.contains(s) && mask.is_none_or(|m| m.get(s))
    }

    /// Same data on a re-stamped grid with equal extents.
    pub fn with_grid(&self, grid: SamplingGrid) -> Result<Self> {
        if grid.extents() != self.grid.extents() {
            return Err(Error::mismatch(format!(
                "cannot re-stamp extents {:?} onto {:?}",
                self.grid.extents(),
                grid.extents()
            )));
        }
        Ok(Self {
            grid,
            dim: self.dim,
            data: self.data.clone(),
        })
    }

    /// Copy into a grid padded by `pad` voxels on every side.
    pub fn pad(&self, pad: usize) -> Result<Self> {
        let padded = self.grid.pad(pad, pad, pad)?;
        let mut out = Self::zeros(padded, self.dim);
        for s in self.grid.samples() {
            let target = out.grid.nearest(&self.grid.voxel_to_world(&s));
            if out.grid.contains(&target) {
                out.set(&target, self.values(&s));
            }
        }
        Ok(out)
    }

    /// Copy of the sub-volume covering `[first, last)`.
    pub fn crop(&self, first: &Sample, last: &Sample) -> Result<Self> {
        let sub = self.grid.range(first, last)?;
        let mut out = Self::zeros(sub, self.dim);
        for idx in 0..out.grid.size() {
            let s = out.grid.sample(idx);
            let src = s.offset(first.i, first.j, first.k);
            out.slot_mut(idx).copy_from_slice(self.values(&src));
        }
        Ok(out)
    }

    /// Single plane at `index` along `axis` (0 = i, 1 = j, 2 = k).
    pub fn slice(&self, axis: usize, index: usize) -> Result<Self> {
        if axis > 2 {
            return Err(Error::geometry(format!("slice axis must be 0, 1 or 2, got {axis}")));
        }
        let [ni, nj, nk] = self.grid.extents();
        let mut first = [0i64; 3];
        let mut last = [ni as i64, nj as i64, nk as i64];
        first[axis] = index as i64;
        last[axis] = index as i64 + 1;
        self.crop(
            &Sample::new(first[0], first[1], first[2]),
            &Sample::new(last[0], last[1], last[2]),
        )
    }
}

/// Binary validity mask on a grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    grid: SamplingGrid,
    data: Vec<bool>,
}

impl Mask {
    pub fn full(grid: SamplingGrid) -> Self {
        let data = vec![true; grid.size()];
        Self { grid, data }
    }

    pub fn from_fn(grid: SamplingGrid, mut f: impl FnMut(&Sample) -> bool) -> Self {
        let data = (0..grid.size()).map(|idx| f(&grid.sample(idx))).collect();
        Self { grid, data }
    }

    pub fn grid(&self) -> &SamplingGrid {
        &self.grid
    }

    /// False outside the grid.
    pub fn get(&self, s: &Sample) -> bool {
        self.grid.contains(s) && self.data[self.grid.index(s)]
    }

    pub fn set(&mut self, s: &Sample, value: bool) {
        let idx = self.grid.index(s);
        self.data[idx] = value;
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|v| **v).count()
    }

    /// Fail unless the mask shares the geometry of `grid`.
    pub fn check_grid(&self, grid: &SamplingGrid) -> Result<()> {
        if self.grid.same_geometry(grid) {
            Ok(())
        } else {
            Err(Error::mismatch(format!(
                "mask extents {:?} do not match volume extents {:?} (or geometry differs)",
                self.grid.extents(),
                grid.extents()
            )))
        }
    }
}
