//! Crate-wide error type.
//!
//! Only configuration problems are errors. Per-voxel failures (zero weight,
//! singular combinations, non-convergent fits) never surface here: they are
//! reported as "no estimate" and leave the output voxel at zero.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised before any voxel is processed.
#[derive(Error, Debug)]
pub enum Error {
    /// Grid construction or a derived-grid operation received invalid geometry.
    #[error("invalid grid geometry: {message}")]
    InvalidGeometry { message: String },

    /// Two inputs that must share geometry do not.
    #[error("geometry mismatch: {message}")]
    GeometryMismatch { message: String },

    /// A volume's channel count does not match the model encoding.
    #[error("model '{model}' cannot use {dim} channels: {message}")]
    Dimension {
        model: String,
        dim: usize,
        message: String,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Model name not recognized.
    #[error("unknown model '{name}'")]
    UnknownModel { name: String },

    /// Configuration text could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    pub fn geometry(message: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            message: message.into(),
        }
    }

    pub fn mismatch(message: impl Into<String>) -> Self {
        Self::GeometryMismatch {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn dimension(model: impl Into<String>, dim: usize, message: impl Into<String>) -> Self {
        Self::Dimension {
            model: model.into(),
            dim,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let err = Error::geometry("spacing must be > 0");
        assert_eq!(err.to_string(), "invalid grid geometry: spacing must be > 0");

        let err = Error::dimension("tensor", 5, "expected 7");
        assert!(err.to_string().contains("tensor"));
        assert!(err.to_string().contains('5'));
    }

    #[test]
    fn json_errors_convert() {
        let parsed: std::result::Result<u32, serde_json::Error> = serde_json::from_str("nope");
        let err: Error = parsed.unwrap_err().into();
        assert!(matches!(err, Error::ConfigParse(_)));
    }
}
