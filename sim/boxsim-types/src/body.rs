//! Body identity, pose and velocity types.
//!
//! Poses and scales belong to the external entity layer; the simulator only
//! reads and writes them through an accessor. Everything a body owns itself
//! (mass, material, velocity) is described by [`BodyDesc`] at creation time.

use nalgebra::{Point3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of an external entity whose pose the simulator drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntityId(pub u64);

impl EntityId {
    /// Create a new entity ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Index-based handle to a body owned by a simulation world.
///
/// Handles are dense indices in insertion order; they stay valid for the
/// lifetime of the world because bodies are never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyHandle(pub usize);

impl BodyHandle {
    /// Create a handle from a raw index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Get the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body#{}", self.0)
    }
}

/// Position and orientation of a body.
///
/// # Example
///
/// ```
/// use boxsim_types::Pose;
/// use nalgebra::Point3;
///
/// let pose = Pose::from_position(Point3::new(1.0, 2.0, 3.0));
/// let world = pose.transform_point(&Point3::new(1.0, 0.0, 0.0));
/// assert_eq!(world, Point3::new(2.0, 2.0, 3.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    /// Position in world coordinates.
    pub position: Point3<f64>,
    /// Orientation as a unit quaternion.
    pub rotation: UnitQuaternion<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// Create an identity pose (origin, no rotation).
    #[must_use]
    pub fn identity() -> Self {
        Self {
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Create a pose from position only (identity rotation).
    #[must_use]
    pub fn from_position(position: Point3<f64>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Create a pose from position and rotation.
    #[must_use]
    pub const fn from_position_rotation(
        position: Point3<f64>,
        rotation: UnitQuaternion<f64>,
    ) -> Self {
        Self { position, rotation }
    }

    /// Transform a point from local to world coordinates.
    #[must_use]
    pub fn transform_point(&self, local: &Point3<f64>) -> Point3<f64> {
        self.position + self.rotation * local.coords
    }

    /// Transform a vector from local to world coordinates (rotation only).
    #[must_use]
    pub fn transform_vector(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * local
    }

    /// Angle in radians between this orientation and `other`.
    #[must_use]
    pub fn angle_to(&self, other: &Self) -> f64 {
        self.rotation.angle_to(&other.rotation)
    }

    /// Check if the pose contains `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.coords.iter().all(|x| x.is_finite())
            && self.rotation.coords.iter().all(|x| x.is_finite())
    }
}

/// Full world transform of an entity as reported by the entity layer.
///
/// The box simulated for an entity has full size `scale` along its local
/// axes, so its half-extents are `scale / 2`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntityTransform {
    /// Position and orientation.
    pub pose: Pose,
    /// Full box size along the local X, Y and Z axes.
    pub scale: Vector3<f64>,
}

impl EntityTransform {
    /// Create a transform from pose and scale.
    #[must_use]
    pub const fn new(pose: Pose, scale: Vector3<f64>) -> Self {
        Self { pose, scale }
    }

    /// Unit cube at the given position.
    #[must_use]
    pub fn unit_cube(position: Point3<f64>) -> Self {
        Self {
            pose: Pose::from_position(position),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Half-extents of the entity's box.
    #[must_use]
    pub fn half_extents(&self) -> Vector3<f64> {
        self.scale * 0.5
    }
}

/// Linear and angular velocity of a body.
///
/// Both components are expressed in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Twist {
    /// Linear velocity (m/s).
    pub linear: Vector3<f64>,
    /// Angular velocity (rad/s).
    pub angular: Vector3<f64>,
}

impl Default for Twist {
    fn default() -> Self {
        Self::zero()
    }
}

impl Twist {
    /// Create a twist with specified linear and angular velocity.
    #[must_use]
    pub const fn new(linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        Self { linear, angular }
    }

    /// Create a zero twist (at rest).
    #[must_use]
    pub fn zero() -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: Vector3::zeros(),
        }
    }

    /// Create a twist with linear velocity only.
    #[must_use]
    pub fn linear(v: Vector3<f64>) -> Self {
        Self {
            linear: v,
            angular: Vector3::zeros(),
        }
    }

    /// Velocity of a point at `offset` from the body center.
    ///
    /// `v_point` = `v_linear` + omega × offset
    #[must_use]
    pub fn velocity_at_point(&self, offset: &Vector3<f64>) -> Vector3<f64> {
        self.linear + self.angular.cross(offset)
    }

    /// Check if the twist contains `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.linear.iter().all(|x| x.is_finite()) && self.angular.iter().all(|x| x.is_finite())
    }

    /// Linear speed.
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.linear.norm()
    }

    /// Angular speed.
    #[must_use]
    pub fn angular_speed(&self) -> f64 {
        self.angular.norm()
    }
}

/// Static per-entity physical parameters supplied when a body is created.
///
/// # Example
///
/// ```
/// use boxsim_types::{BodyDesc, EntityId};
/// use nalgebra::Vector3;
///
/// let desc = BodyDesc::new(EntityId::new(7), 2.0)
///     .with_friction(0.4)
///     .with_elasticity(0.1)
///     .with_velocity(Vector3::new(1.0, 0.0, 0.0));
///
/// assert!(desc.validate().is_ok());
/// assert!(desc.apply_gravity);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyDesc {
    /// Entity whose pose this body drives.
    pub entity: EntityId,
    /// Mass in kg. Must be positive and finite.
    pub mass: f64,
    /// Friction coefficient in `[0, 1]`.
    pub friction: f64,
    /// Elasticity (restitution) coefficient in `[0, 1]`.
    pub elasticity: f64,
    /// Initial velocity.
    pub twist: Twist,
    /// Whether world gravity acts on this body.
    pub apply_gravity: bool,
}

impl BodyDesc {
    /// Descriptor with default material (friction 0.5, elasticity 0.3).
    #[must_use]
    pub fn new(entity: EntityId, mass: f64) -> Self {
        Self {
            entity,
            mass,
            friction: 0.5,
            elasticity: 0.3,
            twist: Twist::zero(),
            apply_gravity: true,
        }
    }

    /// Set the friction coefficient.
    #[must_use]
    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    /// Set the elasticity coefficient.
    #[must_use]
    pub fn with_elasticity(mut self, elasticity: f64) -> Self {
        self.elasticity = elasticity;
        self
    }

    /// Set the initial linear velocity.
    #[must_use]
    pub fn with_velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.twist.linear = velocity;
        self
    }

    /// Set the initial angular velocity.
    #[must_use]
    pub fn with_angular_velocity(mut self, angular: Vector3<f64>) -> Self {
        self.twist.angular = angular;
        self
    }

    /// Exclude this body from world gravity.
    #[must_use]
    pub fn without_gravity(mut self) -> Self {
        self.apply_gravity = false;
        self
    }

    /// Validate the physical parameters.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.mass.is_finite() || self.mass <= 0.0 {
            return Err(crate::SimError::invalid_mass(format!(
                "mass must be positive and finite, got {}",
                self.mass
            )));
        }

        if !(0.0..=1.0).contains(&self.friction) {
            return Err(crate::SimError::invalid_material(format!(
                "friction must be in [0, 1], got {}",
                self.friction
            )));
        }

        if !(0.0..=1.0).contains(&self.elasticity) {
            return Err(crate::SimError::invalid_material(format!(
                "elasticity must be in [0, 1], got {}",
                self.elasticity
            )));
        }

        if !self.twist.is_finite() {
            return Err(crate::SimError::invalid_config(
                "initial velocity must be finite",
            ));
        }

        Ok(())
    }
}
