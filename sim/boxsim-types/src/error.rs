//! Error types for simulation operations.

use thiserror::Error;

use crate::EntityId;

/// Errors that can occur while configuring or stepping a simulation.
///
/// Numerical degeneracies inside collision handling are never reported here;
/// they are absorbed locally. Only configuration problems and divergence of
/// the simulated state surface as errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// Invalid timestep.
    #[error("invalid timestep: {0} (must be positive and finite)")]
    InvalidTimestep(f64),

    /// Invalid sub-step count.
    #[error("invalid iteration count: {0} (must be at least 1)")]
    InvalidIterations(u32),

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Invalid mass properties.
    #[error("invalid mass properties: {reason}")]
    InvalidMassProperties {
        /// Description of what's wrong.
        reason: String,
    },

    /// Friction or elasticity outside its valid range.
    #[error("invalid material: {reason}")]
    InvalidMaterial {
        /// Description of what's wrong.
        reason: String,
    },

    /// Malformed box geometry (non-positive or non-finite size).
    #[error("invalid geometry: {reason}")]
    InvalidGeometry {
        /// Description of what's wrong.
        reason: String,
    },

    /// The entity layer does not know this entity.
    #[error("unknown entity: {0}")]
    UnknownEntity(EntityId),

    /// Body handle does not refer to a body in this world.
    #[error("invalid body handle: {0}")]
    InvalidBodyHandle(usize),

    /// Simulation diverged (`NaN` or `Inf` detected).
    #[error("simulation diverged: {reason}")]
    Diverged {
        /// Description of what went wrong.
        reason: String,
    },
}

impl SimError {
    /// Create a diverged error.
    #[must_use]
    pub fn diverged(reason: impl Into<String>) -> Self {
        Self::Diverged {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid mass properties error.
    #[must_use]
    pub fn invalid_mass(reason: impl Into<String>) -> Self {
        Self::InvalidMassProperties {
            reason: reason.into(),
        }
    }

    /// Create an invalid material error.
    #[must_use]
    pub fn invalid_material(reason: impl Into<String>) -> Self {
        Self::InvalidMaterial {
            reason: reason.into(),
        }
    }

    /// Create an invalid geometry error.
    #[must_use]
    pub fn invalid_geometry(reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            reason: reason.into(),
        }
    }

    /// Check if this is a divergence error.
    #[must_use]
    pub fn is_diverged(&self) -> bool {
        matches!(self, Self::Diverged { .. })
    }

    /// Check if this error rejects a configuration (world, step or body).
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidTimestep(_)
                | Self::InvalidIterations(_)
                | Self::InvalidConfig { .. }
                | Self::InvalidMassProperties { .. }
                | Self::InvalidMaterial { .. }
                | Self::InvalidGeometry { .. }
                | Self::UnknownEntity(_)
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SimError::UnknownEntity(EntityId::new(42));
        assert!(err.to_string().contains("42"));

        let err = SimError::InvalidIterations(0);
        assert!(err.to_string().contains("iteration"));

        let err = SimError::diverged("NaN in velocity");
        assert!(err.to_string().contains("NaN"));
    }

    #[test]
    fn test_error_predicates() {
        let err = SimError::diverged("test");
        assert!(err.is_diverged());
        assert!(!err.is_config_error());

        let err = SimError::invalid_mass("zero");
        assert!(err.is_config_error());
        assert!(!err.is_diverged());
    }
}
