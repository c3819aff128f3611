//! Simulated bodies.
//!
//! A [`Body`] is a plain record composed of independent parts: box
//! [`BoxGeometry`], [`Dynamics`], its [`PartitionMembership`] for the current
//! sub-step, sleep bookkeeping and an [`Accumulator`] of pending corrections.

use boxsim_types::{
    ActionType, BodyDesc, BodyHandle, EntityId, EntityTransform, Pose, SleepConfig, Twist,
};
use nalgebra::{UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::accumulator::{Accumulator, DeltaKind};
use crate::geometry::{Aabb, Containment, Obb};
use crate::octree::PartitionMembership;

/// Size and rotational inertia of a solid box.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoxGeometry {
    /// Half-size along each local axis.
    pub half_extents: Vector3<f64>,
    /// Moments of inertia about the local principal axes.
    pub principal_moments: Vector3<f64>,
}

impl BoxGeometry {
    /// Geometry of a solid box with full size `scale` and the given mass.
    ///
    /// Each principal moment is `m/12` times the sum of the squared sizes
    /// along the other two axes.
    pub fn from_scale(scale: &Vector3<f64>, mass: f64) -> boxsim_types::Result<Self> {
        if !scale.iter().all(|s| s.is_finite() && *s > 0.0) {
            return Err(boxsim_types::SimError::invalid_geometry(format!(
                "box scale must be positive and finite, got [{}, {}, {}]",
                scale.x, scale.y, scale.z
            )));
        }
        let sq = scale.component_mul(scale);
        let k = mass / 12.0;
        Ok(Self {
            half_extents: scale * 0.5,
            principal_moments: Vector3::new(k * (sq.y + sq.z), k * (sq.x + sq.z), k * (sq.x + sq.y)),
        })
    }

    /// Rotational inertia the box offers along a world `direction`.
    ///
    /// The principal moments rotated into the world frame, projected on the
    /// direction, taken as a magnitude.
    #[must_use]
    pub fn relative_moment(
        &self,
        rotation: &UnitQuaternion<f64>,
        direction: &Vector3<f64>,
    ) -> f64 {
        (rotation * self.principal_moments).dot(direction).abs()
    }
}

/// Mass, material and velocity of a body.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Dynamics {
    /// Mass (kg).
    pub mass: f64,
    /// Friction coefficient.
    pub friction: f64,
    /// Elasticity coefficient.
    pub elasticity: f64,
    /// Linear and angular velocity in world coordinates.
    pub twist: Twist,
    /// Whether world gravity acts on the body.
    pub apply_gravity: bool,
}

/// Loose and precise bounds of a body at its current pose.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyBounds {
    /// Body the bounds belong to.
    pub handle: BodyHandle,
    /// Orientation-independent bounds used by the partition.
    pub aabb: Aabb,
    /// Oriented box used for precise contacts.
    pub obb: Obb,
}

/// A simulated box.
#[derive(Debug, Clone)]
pub struct Body {
    pub(crate) handle: BodyHandle,
    pub(crate) entity: EntityId,
    pub(crate) geometry: BoxGeometry,
    pub(crate) dynamics: Dynamics,
    pub(crate) membership: PartitionMembership,
    pub(crate) pose: Pose,
    pub(crate) last_pose: Pose,
    pub(crate) awake: bool,
    pub(crate) idle_time: f64,
    pub(crate) high_mass_collision: i32,
    pub(crate) accumulator: Accumulator,
}

impl Body {
    /// Create an awake body from its descriptor and the entity's transform.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor is invalid, the scale is not
    /// positive and finite, or the pose is not finite.
    pub fn new(
        handle: BodyHandle,
        desc: &BodyDesc,
        transform: &EntityTransform,
    ) -> boxsim_types::Result<Self> {
        desc.validate()?;
        let geometry = BoxGeometry::from_scale(&transform.scale, desc.mass)?;
        if !transform.pose.is_finite() {
            return Err(boxsim_types::SimError::invalid_geometry(
                "initial pose must be finite",
            ));
        }

        Ok(Self {
            handle,
            entity: desc.entity,
            geometry,
            dynamics: Dynamics {
                mass: desc.mass,
                friction: desc.friction,
                elasticity: desc.elasticity,
                twist: desc.twist,
                apply_gravity: desc.apply_gravity,
            },
            membership: PartitionMembership::default(),
            pose: transform.pose,
            last_pose: transform.pose,
            awake: true,
            idle_time: 0.0,
            high_mass_collision: 0,
            accumulator: Accumulator::new(),
        })
    }

    /// Handle of this body in its world.
    #[must_use]
    pub fn handle(&self) -> BodyHandle {
        self.handle
    }

    /// Entity whose pose this body drives.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Box geometry.
    #[must_use]
    pub fn geometry(&self) -> &BoxGeometry {
        &self.geometry
    }

    /// Mass, material and velocity.
    #[must_use]
    pub fn dynamics(&self) -> &Dynamics {
        &self.dynamics
    }

    /// Pose as of the end of the last sub-step.
    #[must_use]
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Current velocity.
    #[must_use]
    pub fn twist(&self) -> &Twist {
        &self.dynamics.twist
    }

    /// Mass (kg).
    #[must_use]
    pub fn mass(&self) -> f64 {
        self.dynamics.mass
    }

    /// Whether the body is simulated actively.
    #[must_use]
    pub fn is_awake(&self) -> bool {
        self.awake
    }

    /// Seconds the body has been nearly motionless.
    #[must_use]
    pub fn idle_time(&self) -> f64 {
        self.idle_time
    }

    /// Stacking priority counter.
    #[must_use]
    pub fn high_mass_collision(&self) -> i32 {
        self.high_mass_collision
    }

    /// Corrections queued during the current sub-step.
    #[must_use]
    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    /// Partition nodes recorded for the current sub-step.
    #[must_use]
    pub fn membership(&self) -> &PartitionMembership {
        &self.membership
    }

    /// Bounds at the current pose.
    #[must_use]
    pub fn bounds(&self) -> BodyBounds {
        BodyBounds {
            handle: self.handle,
            aabb: Aabb::from_box(&self.pose, &self.geometry.half_extents, Containment::Loose),
            obb: Obb::from_pose(&self.pose, self.geometry.half_extents),
        }
    }

    /// Rotational inertia along a world direction at the current pose.
    #[must_use]
    pub fn relative_moment(&self, direction: &Vector3<f64>) -> f64 {
        self.geometry
            .relative_moment(&self.pose.rotation, direction)
    }

    /// Linear plus rotational kinetic energy.
    #[must_use]
    pub fn kinetic_energy(&self) -> f64 {
        let twist = &self.dynamics.twist;
        let local_omega = self.pose.rotation.inverse() * twist.angular;
        let rotational = self
            .geometry
            .principal_moments
            .component_mul(&local_omega.component_mul(&local_omega))
            .sum();
        0.5 * self.dynamics.mass * twist.linear.norm_squared() + 0.5 * rotational
    }

    /// Linear momentum.
    #[must_use]
    pub fn linear_momentum(&self) -> Vector3<f64> {
        self.dynamics.twist.linear * self.dynamics.mass
    }

    pub(crate) fn queue(&mut self, kind: DeltaKind, value: Vector3<f64>) {
        self.accumulator.push(kind, value);
    }

    pub(crate) fn apply_action(&mut self, action: &ActionType) {
        let twist = &mut self.dynamics.twist;
        match *action {
            ActionType::SetVelocity(v) => twist.linear = v,
            ActionType::AddVelocity(v) => twist.linear += v,
            ActionType::SetAngularVelocity(w) => twist.angular = w,
            ActionType::AddAngularVelocity(w) => twist.angular += w,
        }
    }

    /// Halve the stacking priority, dropping values below one to zero.
    pub(crate) fn decay_priority(&mut self) {
        if self.high_mass_collision < 1 {
            self.high_mass_collision = 0;
        } else {
            self.high_mass_collision /= 2;
        }
    }

    pub(crate) fn apply_gravity(&mut self, gravity: &Vector3<f64>, dt: f64) {
        if self.awake && self.dynamics.apply_gravity {
            self.dynamics.twist.linear += gravity * dt;
        }
    }

    /// Advance the pose by the current velocity.
    ///
    /// A sleeping body first checks whether its speed exceeds `wake_speed`;
    /// if not it stays put. Returns true if the body woke up.
    pub(crate) fn integrate(&mut self, dt: f64, wake_speed: f64) -> bool {
        let mut woke = false;
        if !self.awake {
            if self.dynamics.twist.speed() <= wake_speed {
                return false;
            }
            self.wake();
            woke = true;
        }

        let twist = self.dynamics.twist;
        self.pose.position += twist.linear * dt;
        self.pose.rotation = UnitQuaternion::from_scaled_axis(twist.angular * dt) * self.pose.rotation;
        woke
    }

    /// Apply the averaged accumulator and clear it.
    pub(crate) fn apply_accumulator(&mut self) {
        let mean = self.accumulator.drain_average();
        self.pose.position += mean.position;
        self.dynamics.twist.linear += mean.velocity;
        self.dynamics.twist.angular += mean.angular_velocity;
    }

    /// Track idle time and fall asleep once it exceeds the idle duration.
    ///
    /// Returns true if the body fell asleep.
    pub(crate) fn update_sleep(&mut self, dt: f64, config: &SleepConfig) -> bool {
        let moved = (self.pose.position - self.last_pose.position).norm();
        let turned = self.pose.angle_to(&self.last_pose);
        if moved <= config.position_tolerance && turned <= config.rotation_tolerance {
            self.idle_time += dt;
        } else {
            self.idle_time = 0.0;
        }
        self.last_pose = self.pose;

        if config.enabled && self.idle_time > config.idle_duration {
            self.sleep();
            return true;
        }
        false
    }

    pub(crate) fn wake(&mut self) {
        self.awake = true;
        self.idle_time = 0.0;
        self.last_pose = self.pose;
    }

    pub(crate) fn sleep(&mut self) {
        self.awake = false;
        self.idle_time = 0.0;
        self.dynamics.twist = Twist::zero();
    }

    /// Check for `NaN` or `Inf` in pose and velocity.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.pose.is_finite() && self.dynamics.twist.is_finite()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use boxsim_types::SimError;
    use nalgebra::Point3;
    use std::f64::consts::FRAC_PI_2;

    fn cube_body(mass: f64) -> Body {
        Body::new(
            BodyHandle::new(0),
            &BodyDesc::new(EntityId::new(1), mass),
            &EntityTransform::unit_cube(Point3::origin()),
        )
        .unwrap()
    }

    #[test]
    fn test_cube_moments() {
        let geometry = BoxGeometry::from_scale(&Vector3::new(1.0, 1.0, 1.0), 6.0).unwrap();
        assert_relative_eq!(geometry.principal_moments, Vector3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(geometry.half_extents, Vector3::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn test_box_moments() {
        let geometry = BoxGeometry::from_scale(&Vector3::new(1.0, 2.0, 3.0), 12.0).unwrap();
        assert_relative_eq!(geometry.principal_moments, Vector3::new(13.0, 10.0, 5.0));
    }

    #[test]
    fn test_relative_moment_rotated() {
        let geometry = BoxGeometry::from_scale(&Vector3::new(1.0, 2.0, 3.0), 12.0).unwrap();
        let quarter = UnitQuaternion::from_euler_angles(0.0, 0.0, FRAC_PI_2);
        assert_relative_eq!(
            geometry.relative_moment(&UnitQuaternion::identity(), &Vector3::x()),
            13.0
        );
        assert_relative_eq!(
            geometry.relative_moment(&quarter, &Vector3::y()),
            13.0,
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_rejects_bad_scale_and_mass() {
        let transform = EntityTransform::new(Pose::identity(), Vector3::new(1.0, 0.0, 1.0));
        let err = Body::new(
            BodyHandle::new(0),
            &BodyDesc::new(EntityId::new(1), 1.0),
            &transform,
        )
        .unwrap_err();
        assert!(matches!(err, SimError::InvalidGeometry { .. }));

        let err = Body::new(
            BodyHandle::new(0),
            &BodyDesc::new(EntityId::new(1), 0.0),
            &EntityTransform::unit_cube(Point3::origin()),
        )
        .unwrap_err();
        assert!(matches!(err, SimError::InvalidMassProperties { .. }));
    }

    #[test]
    fn test_priority_decay() {
        let mut body = cube_body(1.0);
        body.high_mass_collision = 1000;
        body.decay_priority();
        assert_eq!(body.high_mass_collision, 500);
        body.high_mass_collision = 1;
        body.decay_priority();
        assert_eq!(body.high_mass_collision, 0);
        body.high_mass_collision = -4;
        body.decay_priority();
        assert_eq!(body.high_mass_collision, 0);
    }

    #[test]
    fn test_integrate_moves_and_rotates() {
        let mut body = cube_body(1.0);
        body.dynamics.twist = Twist::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(!body.integrate(0.5, 1.0));
        assert_relative_eq!(body.pose.position, Point3::new(0.5, 0.0, 0.0));
        assert_relative_eq!(body.pose.rotation.angle(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_sleeping_body_stays_until_fast_enough() {
        let mut body = cube_body(1.0);
        body.sleep();
        body.dynamics.twist.linear = Vector3::new(0.5, 0.0, 0.0);
        assert!(!body.integrate(1.0, 1.0));
        assert!(!body.is_awake());
        assert_eq!(body.pose.position, Point3::origin());

        body.dynamics.twist.linear = Vector3::new(2.0, 0.0, 0.0);
        assert!(body.integrate(1.0, 1.0));
        assert!(body.is_awake());
        assert_relative_eq!(body.pose.position, Point3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_gravity_skips_sleeping_and_opted_out_bodies() {
        let g = Vector3::new(0.0, 0.0, -10.0);
        let mut body = cube_body(1.0);
        body.apply_gravity(&g, 0.1);
        assert_relative_eq!(body.twist().linear.z, -1.0);

        body.sleep();
        body.apply_gravity(&g, 0.1);
        assert_eq!(body.twist().linear.z, 0.0);

        let mut floating = Body::new(
            BodyHandle::new(1),
            &BodyDesc::new(EntityId::new(2), 1.0).without_gravity(),
            &EntityTransform::unit_cube(Point3::origin()),
        )
        .unwrap();
        floating.apply_gravity(&g, 0.1);
        assert_eq!(floating.twist().linear, Vector3::zeros());
    }

    #[test]
    fn test_accumulator_applied_as_mean() {
        let mut body = cube_body(1.0);
        body.queue(DeltaKind::Position, Vector3::new(0.2, 0.0, 0.0));
        body.queue(DeltaKind::Position, Vector3::new(0.4, 0.0, 0.0));
        body.queue(DeltaKind::Velocity, Vector3::new(0.0, 1.0, 0.0));
        body.apply_accumulator();
        assert_relative_eq!(body.pose.position.x, 0.3, epsilon = 1e-12);
        assert_relative_eq!(body.twist().linear.y, 1.0);
        assert!(body.accumulator().is_empty());
    }

    #[test]
    fn test_falls_asleep_after_idle_duration() {
        let mut body = cube_body(1.0);
        let config = SleepConfig::default().with_idle_duration(0.25);
        body.dynamics.twist.linear = Vector3::new(0.001, 0.0, 0.0);
        assert!(!body.update_sleep(0.1, &config));
        assert!(!body.update_sleep(0.1, &config));
        assert!(body.update_sleep(0.1, &config));
        assert!(!body.is_awake());
        assert_eq!(body.twist().linear, Vector3::zeros());
    }

    #[test]
    fn test_movement_resets_idle_time() {
        let mut body = cube_body(1.0);
        let config = SleepConfig::default();
        body.update_sleep(0.1, &config);
        assert_relative_eq!(body.idle_time(), 0.1);
        body.pose.position.x += 1.0;
        body.update_sleep(0.1, &config);
        assert_eq!(body.idle_time(), 0.0);
    }

    #[test]
    fn test_disabled_sleep_never_sleeps() {
        let mut body = cube_body(1.0);
        let config = SleepConfig::disabled().with_idle_duration(0.0);
        assert!(!body.update_sleep(1.0, &config));
        assert!(body.is_awake());
    }

    #[test]
    fn test_actions() {
        let mut body = cube_body(1.0);
        body.apply_action(&ActionType::SetVelocity(Vector3::new(1.0, 0.0, 0.0)));
        body.apply_action(&ActionType::AddVelocity(Vector3::new(1.0, 1.0, 0.0)));
        body.apply_action(&ActionType::SetAngularVelocity(Vector3::new(0.0, 0.0, 2.0)));
        body.apply_action(&ActionType::AddAngularVelocity(Vector3::new(0.0, 0.0, 1.0)));
        assert_eq!(body.twist().linear, Vector3::new(2.0, 1.0, 0.0));
        assert_eq!(body.twist().angular, Vector3::new(0.0, 0.0, 3.0));
    }

    #[test]
    fn test_kinetic_energy() {
        let mut body = cube_body(6.0);
        body.dynamics.twist = Twist::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 2.0));
        // 0.5 * 6 * 1 + 0.5 * 1 * 4
        assert_relative_eq!(body.kinetic_energy(), 5.0, epsilon = 1e-12);
        assert_relative_eq!(body.linear_momentum(), Vector3::new(6.0, 0.0, 0.0));
    }
}
