//! Sampling grids, volumes and masks.

pub mod sampling;
pub mod volume;

pub use sampling::*;
pub use volume::*;
