//! Randomized clustering with best-of-m restarts.

pub mod axial;
pub mod kmeans;
pub mod landmarks;
pub mod restart;

pub use axial::AxialKMeans;
pub use kmeans::KMeans;
pub use landmarks::{LandmarkOptions, landmarks};
pub use restart::{Clusterer, par_restarts, restarts};
