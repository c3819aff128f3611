//! External velocity commands.
//!
//! Actions are the only way for a driver to change a body's motion between
//! steps. They are queued and applied at the start of the next step, before
//! integration, so they can wake sleeping bodies.

use crate::BodyHandle;
use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An action to be applied to one body on the next step.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Action {
    /// Target body.
    pub body: BodyHandle,
    /// What to do with it.
    pub action_type: ActionType,
}

impl Action {
    /// Create a new action.
    #[must_use]
    pub const fn new(body: BodyHandle, action_type: ActionType) -> Self {
        Self { body, action_type }
    }

    /// Replace the body's linear velocity.
    #[must_use]
    pub const fn set_velocity(body: BodyHandle, velocity: Vector3<f64>) -> Self {
        Self::new(body, ActionType::SetVelocity(velocity))
    }

    /// Add to the body's linear velocity.
    #[must_use]
    pub const fn add_velocity(body: BodyHandle, delta: Vector3<f64>) -> Self {
        Self::new(body, ActionType::AddVelocity(delta))
    }
}

/// Types of velocity command.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ActionType {
    /// Replace the linear velocity.
    SetVelocity(Vector3<f64>),
    /// Add to the linear velocity.
    AddVelocity(Vector3<f64>),
    /// Replace the angular velocity.
    SetAngularVelocity(Vector3<f64>),
    /// Add to the angular velocity.
    AddAngularVelocity(Vector3<f64>),
}

impl ActionType {
    /// Check that the carried vector is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        let v = match self {
            Self::SetVelocity(v)
            | Self::AddVelocity(v)
            | Self::SetAngularVelocity(v)
            | Self::AddAngularVelocity(v) => v,
        };
        v.iter().all(|x| x.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_constructors() {
        let action = Action::set_velocity(BodyHandle::new(3), Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(action.body, BodyHandle::new(3));
        assert!(matches!(action.action_type, ActionType::SetVelocity(_)));
        assert!(action.action_type.is_finite());

        let bad = ActionType::AddAngularVelocity(Vector3::new(f64::INFINITY, 0.0, 0.0));
        assert!(!bad.is_finite());
    }
}
