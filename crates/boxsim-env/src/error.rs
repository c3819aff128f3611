//! Error types for environment construction.

use nalgebra::Vector3;

/// Errors that can occur while building a static environment.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum EnvError {
    /// A plane normal must be non-zero.
    #[error("plane normal must be non-zero and finite, got {0:?}")]
    InvalidNormal(Vector3<f64>),

    /// Box half-extents must be positive and finite.
    #[error("box half-extents must be positive and finite, got {0:?}")]
    InvalidHalfExtents(Vector3<f64>),

    /// A surface placement contained `NaN` or `Inf`.
    #[error("surface placement must be finite")]
    NonFinitePlacement,
}
