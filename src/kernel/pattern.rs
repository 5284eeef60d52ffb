//! Spatial kernels and the fixed neighborhood pattern derived from them.
//!
//! A pattern is computed once per run and reused for every output voxel:
//! `(2s+1)^3` integer offsets with their base spatial weights, center weight 1.

use nalgebra::Vector3;

use crate::domain::{KernelConfig, KernelKind};

/// Separable spatial kernel in voxel-offset coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    kind: KernelKind,
    support: usize,
    hpos: f64,
    spacing: Vector3<f64>,
}

impl Kernel {
    pub fn new(kind: KernelKind, support: usize, hpos: f64, spacing: &Vector3<f64>) -> Self {
        Self {
            kind,
            support,
            hpos,
            spacing: *spacing,
        }
    }

    pub fn from_config(config: &KernelConfig, spacing: &Vector3<f64>) -> Self {
        Self::new(config.kernel, config.support, config.hpos, spacing)
    }

    pub fn support(&self) -> usize {
        self.support
    }

    /// Weight of a (possibly fractional) voxel offset from the center.
    pub fn weight_at(&self, offset: &Vector3<f64>) -> f64 {
        match self.kind {
            KernelKind::Gaussian => {
                let d2 = offset.component_mul(&self.spacing).norm_squared();
                (-d2 / (self.hpos * self.hpos)).exp()
            }
            KernelKind::Triangle => {
                let width = self.support as f64 + 1.0;
                offset
                    .iter()
                    .map(|d| (1.0 - d.abs() / width).max(0.0))
                    .product()
            }
            KernelKind::Box => {
                let reach = self.support as f64 + 0.5;
                if offset.iter().all(|d| d.abs() <= reach) {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Fixed list of neighbor offsets with base spatial weights.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborhoodPattern {
    support: usize,
    offsets: Vec<[i64; 3]>,
    weights: Vec<f64>,
}

impl NeighborhoodPattern {
    /// Enumerate the cube of radius `kernel.support()` (i fastest).
    pub fn new(kernel: &Kernel) -> Self {
        let s = kernel.support() as i64;
        let side = (2 * s + 1) as usize;
        let mut offsets = Vec::with_capacity(side * side * side);
        let mut weights = Vec::with_capacity(side * side * side);
        for dk in -s..=s {
            for dj in -s..=s {
                for di in -s..=s {
                    offsets.push([di, dj, dk]);
                    weights.push(kernel.weight_at(&Vector3::new(di as f64, dj as f64, dk as f64)));
                }
            }
        }
        Self {
            support: kernel.support(),
            offsets,
            weights,
        }
    }

    pub fn support(&self) -> usize {
        self.support
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Position of the zero offset within the pattern.
    pub fn center_index(&self) -> usize {
        self.offsets.len() / 2
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[i64; 3], f64)> + '_ {
        self.offsets.iter().zip(self.weights.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> Vector3<f64> {
        Vector3::new(1.0, 1.0, 1.0)
    }

    #[test]
    fn pattern_has_cubic_length_and_unit_center() {
        for kind in [KernelKind::Gaussian, KernelKind::Triangle, KernelKind::Box] {
            for support in 0..3 {
                let pattern = NeighborhoodPattern::new(&Kernel::new(kind, support, 1.5, &unit()));
                let side = 2 * support + 1;
                assert_eq!(pattern.len(), side * side * side);

                let (offset, center) = pattern.iter().nth(pattern.center_index()).unwrap();
                assert_eq!(*offset, [0, 0, 0]);
                assert_eq!(center, 1.0);
                assert!(pattern.iter().all(|(_, w)| w <= center));
            }
        }
    }

    #[test]
    fn gaussian_uses_world_spacing() {
        let spacing = Vector3::new(2.0, 1.0, 1.0);
        let kernel = Kernel::new(KernelKind::Gaussian, 1, 1.0, &spacing);
        let wi = kernel.weight_at(&Vector3::new(1.0, 0.0, 0.0));
        let wj = kernel.weight_at(&Vector3::new(0.0, 1.0, 0.0));
        assert!((wi - (-4.0f64).exp()).abs() < 1e-15);
        assert!((wj - (-1.0f64).exp()).abs() < 1e-15);
    }

    #[test]
    fn triangle_ramps_to_zero_past_support() {
        let kernel = Kernel::new(KernelKind::Triangle, 2, 1.0, &unit());
        assert!((kernel.weight_at(&Vector3::new(1.0, 0.0, 0.0)) - 2.0 / 3.0).abs() < 1e-15);
        assert!((kernel.weight_at(&Vector3::new(2.0, 2.0, 0.0)) - 1.0 / 9.0).abs() < 1e-15);
        assert_eq!(kernel.weight_at(&Vector3::new(3.0, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn box_is_flat_inside_support() {
        let pattern = NeighborhoodPattern::new(&Kernel::new(KernelKind::Box, 1, 1.0, &unit()));
        assert!(pattern.iter().all(|(_, w)| w == 1.0));
    }
}
