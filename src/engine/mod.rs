//! Volume-level estimation: kernel smoothing, fusion and resampling, online
//! axial fusion, and spherical harmonic peak extraction.

pub mod axial;
pub mod dispatch;
pub mod kernel;
pub mod peaks;

pub use axial::{AxialFusion, AxialFusionOutput};
pub use dispatch::for_each_voxel;
pub use kernel::KernelEngine;
pub use peaks::SpharmPeaks;
