//! Constrained nonlinear fitting.
//!
//! - `simplex`: bounded derivative-free minimizer
//! - `smt`, `relaxometry`: per-voxel biophysical models built on it
//! - `volume`: parallel per-voxel driver

pub mod relaxometry;
pub mod simplex;
pub mod smt;
pub mod volume;

pub use relaxometry::{ExpRecoveryFit, RecoveryGuess};
pub use simplex::{Bounds, Minimum, SimplexOptions, minimize};
pub use smt::{Shells, SmtFit};
pub use volume::{VoxelFit, fit_volume};
