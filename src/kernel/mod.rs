//! Kernel weighting: spatial kernels, neighborhood patterns and adaptive factors.

pub mod pattern;
pub mod weighting;

pub use pattern::*;
pub use weighting::*;
