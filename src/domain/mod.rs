//! Domain types used throughout the crate.
//!
//! This module defines:
//!
//! - model identities and encodings (`ModelKind`, `ModelVector`)
//! - kernel / selection enums
//! - the run configuration (`EstimationConfig` and its sections)

pub mod types;

pub use types::*;
