//! Model encodings and the per-model helpers used by weighting and estimation.
//!
//! Models are implemented as small, pure functions so that the engine can stay
//! generic over encodings.

pub mod fibers;
pub mod model;

pub use fibers::*;
pub use model::*;
