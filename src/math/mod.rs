//! Mathematical utilities: least squares, SPD matrix functions and spherical
//! harmonics.

pub mod ols;
pub mod spd;
pub mod sphere;

pub use ols::*;
pub use spd::*;
pub use sphere::*;
