//! Top-level orchestration.
//!
//! The library exposes its components directly; this module adds the
//! configuration-driven workflows that combine them (see [`pipeline`]).

pub mod pipeline;

pub use pipeline::*;
