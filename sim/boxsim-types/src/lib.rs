//! Core data types for the boxsim rigid-box simulator.
//!
//! - [`Pose`], [`EntityTransform`] - world placement of an entity's box
//! - [`Twist`] - linear and angular velocity
//! - [`BodyDesc`] - static per-entity physical parameters
//! - [`Action`] - queued velocity commands from the driver
//! - [`SimulationConfig`] - gravity, contact, sleep and partition tuning
//! - [`SimError`] - configuration and divergence errors
//!
//! # Layer 0
//!
//! These types are pure data with no physics behavior. They are shared by
//! the environment crate, the simulation core and any driver or tooling.
//!
//! # Coordinate System
//!
//! - X: right
//! - Y: forward
//! - Z: up
//! - Right-handed
//!
//! # Example
//!
//! ```
//! use boxsim_types::{BodyDesc, EntityId, SimulationConfig};
//!
//! let config = SimulationConfig::default();
//! assert!(config.validate().is_ok());
//!
//! let desc = BodyDesc::new(EntityId::new(1), 1.0).with_elasticity(0.0);
//! assert!(desc.validate().is_ok());
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod body;
mod config;
mod dynamics;
mod error;

pub use body::{BodyDesc, BodyHandle, EntityId, EntityTransform, Pose, Twist};
pub use config::{
    ContactConfig, PartitionConfig, SimulationConfig, SleepConfig, DEFAULT_GROUND_TAG,
};
pub use dynamics::{Action, ActionType};
pub use error::SimError;

// Re-export math types for convenience
pub use nalgebra::{Point3, UnitQuaternion, Vector3};

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
