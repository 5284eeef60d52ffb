//! `voxkern` library crate.
//!
//! Kernel-weighted estimation of model-valued volumes (tensors, fibers,
//! spherical harmonics, axes), restart-based clustering and bounded per-voxel
//! fitting. Layout, leaves first:
//!
//! - `grid`: sampling grids, volumes and masks
//! - `math`, `models`: numerical helpers and model encodings
//! - `kernel`: neighborhood patterns and adaptive weights
//! - `estimate`: per-model combination rules
//! - `engine`: volume-level estimation, axial fusion and peaks
//! - `cluster`: clusterers and best-of-m restarts
//! - `fit`: bounded simplex and per-voxel fits
//! - `app`: configuration-driven workflows
//!
//! File formats and command-line handling are left to callers.

pub mod app;
pub mod cluster;
pub mod domain;
pub mod engine;
pub mod error;
pub mod estimate;
pub mod fit;
pub mod grid;
pub mod kernel;
pub mod math;
pub mod models;

pub use error::{Error, Result};
