//! Impulse-based contact response.
//!
//! Resolution never touches a pose or velocity directly. Every correction is
//! queued in the bodies' accumulators and applied, averaged, at the end of
//! the sub-step. The only state written immediately is the stacking
//! priority counter.

use boxsim_types::ContactConfig;
use nalgebra::{Point3, Vector3};

use crate::accumulator::DeltaKind;
use crate::body::Body;
use crate::detection::Contact;

/// Offsets shorter than this are treated as a contact at the center.
const LEVER_EPSILON: f64 = 1e-9;

/// Inertial denominators smaller than this disable the restitution term.
const INERTIA_EPSILON: f64 = 1e-12;

/// How one body meets the contact point.
#[derive(Debug, Clone, Copy)]
struct Lever {
    /// Unit direction from the contact point to the center, with the inverse
    /// distance. `None` when the contact is at the center.
    arm: Option<(Vector3<f64>, f64)>,
    /// Share of the response taken linearly.
    linear: f64,
    /// Share of the response taken angularly.
    angular: f64,
    /// Velocity of the body's material at the contact point.
    velocity: Vector3<f64>,
    /// Component of `velocity` along the contact normal.
    acting: f64,
}

impl Lever {
    fn new(body: &Body, point: &Point3<f64>, normal: &Vector3<f64>) -> Self {
        let offset = body.pose.position - point;
        let velocity = body.dynamics.twist.velocity_at_point(&-offset);
        let acting = velocity.dot(normal);

        let distance = offset.norm();
        if distance < LEVER_EPSILON {
            return Self {
                arm: None,
                linear: 1.0,
                angular: 0.0,
                velocity,
                acting,
            };
        }

        let direction = offset / distance;
        let linear = direction.dot(normal).abs().min(1.0);
        Self {
            arm: Some((direction, distance.recip())),
            linear,
            angular: 1.0 - linear,
            velocity,
            acting,
        }
    }

    /// Linear plus angular inertia offered along the normal.
    fn inertial_mass(&self, body: &Body, normal: &Vector3<f64>) -> f64 {
        self.linear * body.dynamics.mass + self.angular * body.relative_moment(normal)
    }
}

/// Resolve a contact between `body` and the static environment.
///
/// The environment has infinite mass, so restitution reduces to `-e * v`.
/// The rebound is this infinite-mass limit and is not divided by the body's
/// inertial mass along the normal. The body takes the whole position
/// correction and is flagged with the ground stacking priority.
///
/// A box lying within `rest_alignment` of one of its faces has its rotation
/// damped on every non-bouncing contact, so a tilted drop stops spinning
/// once it lands face down.
pub fn resolve_ground(body: &mut Body, contact: &Contact, config: &ContactConfig) {
    let normal = contact.normal;
    let lever = Lever::new(body, &contact.point, &normal);
    let relative = lever.acting;

    if relative < 0.0 {
        let reactive = if relative <= -config.restitution_threshold {
            -body.dynamics.elasticity * relative
        } else {
            0.0
        };
        let friction = body.dynamics.friction;
        let settle =
            settles(body, &lever, relative, config) || rests_on_face(body, &normal, relative, config);
        queue_velocity(body, &lever, reactive, friction, &normal, config, settle);
    }

    body.queue(
        DeltaKind::Position,
        normal * (config.position_bias * contact.depth),
    );
    body.high_mass_collision = config.ground_priority;
}

/// Resolve a contact between two bodies.
///
/// `contact.normal` points from `b` toward `a`. Friction and elasticity are
/// the averages of both bodies' coefficients.
pub fn resolve_pair(a: &mut Body, b: &mut Body, contact: &Contact, config: &ContactConfig) {
    let normal = contact.normal;
    let friction = 0.5 * (a.dynamics.friction + b.dynamics.friction);
    let elasticity = 0.5 * (a.dynamics.elasticity + b.dynamics.elasticity);

    let lever_a = Lever::new(a, &contact.point, &normal);
    let lever_b = Lever::new(b, &contact.point, &normal);
    let relative = lever_a.acting - lever_b.acting;

    if relative < 0.0 {
        let (mut reactive_a, mut reactive_b) = (0.0, 0.0);

        if relative <= -config.restitution_threshold {
            let (mass_a, mass_b) = (a.dynamics.mass, b.dynamics.mass);
            let (moment_a, moment_b) = (a.relative_moment(&normal), b.relative_moment(&normal));

            let momentum = 0.5
                * (lever_a.linear + lever_b.linear)
                * (mass_a * lever_a.acting + mass_b * lever_b.acting)
                + 0.5
                    * (lever_a.angular + lever_b.angular)
                    * (moment_a * lever_a.acting + moment_b * lever_b.acting);
            let inertia_a = lever_a.inertial_mass(a, &normal);
            let inertia_b = lever_b.inertial_mass(b, &normal);
            let total = inertia_a + inertia_b;

            if total > INERTIA_EPSILON {
                reactive_a = (-elasticity * relative * inertia_b + momentum) / total;
                reactive_b = (elasticity * relative * inertia_a + momentum) / total;
            }
        }

        let settle_a = settles(a, &lever_a, relative, config);
        let settle_b = settles(b, &lever_b, relative, config);
        queue_velocity(a, &lever_a, reactive_a, friction, &normal, config, settle_a);
        queue_velocity(b, &lever_b, reactive_b, friction, &normal, config, settle_b);
    }

    let correction = normal * (config.position_bias * contact.depth);
    if b.awake {
        let total = a.dynamics.mass + b.dynamics.mass;
        let (share_a, share_b) = if a.high_mass_collision > b.high_mass_collision {
            (0.0, -1.0)
        } else if b.high_mass_collision > a.high_mass_collision {
            (1.0, 0.0)
        } else {
            (b.dynamics.mass / total, -a.dynamics.mass / total)
        };
        a.queue(DeltaKind::Position, correction * share_a);
        b.queue(DeltaKind::Position, correction * share_b);
    } else {
        a.queue(DeltaKind::Position, correction);
        if a.high_mass_collision < 1 {
            a.high_mass_collision = config.sleeping_contact_priority;
        }
    }

    if a.high_mass_collision > b.high_mass_collision {
        b.high_mass_collision = a.high_mass_collision - 1;
    } else if b.high_mass_collision > a.high_mass_collision {
        a.high_mass_collision = b.high_mass_collision - 1;
    }
}

/// Queue the velocity response of one body.
///
/// The tangential velocity at the contact is damped by `friction`, and the
/// normal component is replaced by `reactive` (with `reaction_bias` of the
/// approach removed). The combined change is split between linear and
/// angular velocity by the lever's shares. When `settle` is set, half of
/// the body's current rotation is removed as well.
fn queue_velocity(
    body: &mut Body,
    lever: &Lever,
    reactive: f64,
    friction: f64,
    normal: &Vector3<f64>,
    config: &ContactConfig,
    settle: bool,
) {
    let tangential = lever.velocity - normal * lever.acting;
    let delta = -tangential * friction + normal * (reactive - config.reaction_bias * lever.acting);

    let linear = delta * lever.linear;
    let mut angular = lever
        .arm
        .map_or_else(Vector3::zeros, |(direction, inv_distance)| {
            (delta * inv_distance).cross(&direction)
        });

    if settle {
        angular = angular * 0.5 - body.dynamics.twist.angular * 0.5;
    }

    body.queue(DeltaKind::Velocity, linear);
    body.queue(DeltaKind::AngularVelocity, angular);
}

/// A slow, centered, non-bouncing contact.
fn settles(body: &Body, lever: &Lever, relative: f64, config: &ContactConfig) -> bool {
    body.dynamics.twist.angular.norm() < config.settle_angular_speed
        && lever.linear > config.settle_alignment
        && relative > -config.restitution_threshold
}

/// A non-bouncing contact with one of the box's faces nearly flat against
/// the surface.
fn rests_on_face(body: &Body, normal: &Vector3<f64>, relative: f64, config: &ContactConfig) -> bool {
    if relative <= -config.restitution_threshold {
        return false;
    }
    let rotation = body.pose.rotation;
    [Vector3::x(), Vector3::y(), Vector3::z()]
        .into_iter()
        .any(|axis| (rotation * axis).dot(normal).abs() > config.rest_alignment)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use boxsim_types::{BodyDesc, BodyHandle, EntityId, EntityTransform};
    use nalgebra::UnitQuaternion;

    fn cube(i: usize, x: f64, z: f64, vx: f64, elasticity: f64) -> Body {
        Body::new(
            BodyHandle::new(i),
            &BodyDesc::new(EntityId::new(i as u64), 1.0)
                .with_elasticity(elasticity)
                .with_velocity(Vector3::new(vx, 0.0, 0.0)),
            &EntityTransform::unit_cube(Point3::new(x, 0.0, z)),
        )
        .unwrap()
    }

    fn head_on(a: &Body, b: &Body) -> Contact {
        Contact {
            body_a: a.handle(),
            body_b: Some(b.handle()),
            point: Point3::origin(),
            normal: -Vector3::x(),
            depth: 0.0,
            face_normal: None,
        }
    }

    fn exact() -> ContactConfig {
        ContactConfig::exact().with_restitution_threshold(1.0)
    }

    fn settle(body: &mut Body) {
        body.apply_accumulator();
    }

    #[test]
    fn test_elastic_exchange() {
        let mut a = cube(0, -0.5, 0.0, 2.0, 1.0);
        let mut b = cube(1, 0.5, 0.0, 0.0, 1.0);
        let contact = head_on(&a, &b);
        resolve_pair(&mut a, &mut b, &contact, &exact());
        settle(&mut a);
        settle(&mut b);
        assert_relative_eq!(a.twist().linear, Vector3::zeros(), epsilon = 1e-12);
        assert_relative_eq!(b.twist().linear, Vector3::new(2.0, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(a.twist().angular, Vector3::zeros(), epsilon = 1e-12);
    }

    #[test]
    fn test_inelastic_shares_velocity() {
        let mut a = cube(0, -0.5, 0.0, 2.0, 0.0);
        let mut b = cube(1, 0.5, 0.0, 0.0, 0.0);
        let contact = head_on(&a, &b);
        resolve_pair(&mut a, &mut b, &contact, &exact());
        settle(&mut a);
        settle(&mut b);
        assert_relative_eq!(a.twist().linear.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(b.twist().linear.x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_momentum_conserved_head_on() {
        let mut a = cube(0, -0.5, 0.0, 3.0, 0.5);
        let mut b = cube(1, 0.5, 0.0, -1.0, 0.5);
        let before = a.linear_momentum() + b.linear_momentum();
        let contact = head_on(&a, &b);
        resolve_pair(&mut a, &mut b, &contact, &exact());
        settle(&mut a);
        settle(&mut b);
        let after = a.linear_momentum() + b.linear_momentum();
        assert_relative_eq!(before, after, epsilon = 1e-12);
    }

    #[test]
    fn test_separating_bodies_only_get_position_correction() {
        let mut a = cube(0, -0.5, 0.0, -1.0, 1.0);
        let mut b = cube(1, 0.5, 0.0, 1.0, 1.0);
        let mut contact = head_on(&a, &b);
        contact.depth = 0.1;
        resolve_pair(&mut a, &mut b, &contact, &exact());
        assert_eq!(a.accumulator().len(), 1);
        settle(&mut a);
        settle(&mut b);
        assert_relative_eq!(a.twist().linear.x, -1.0);
        assert_relative_eq!(a.pose().position.x, -0.55, epsilon = 1e-12);
        assert_relative_eq!(b.pose().position.x, 0.55, epsilon = 1e-12);
    }

    #[test]
    fn test_priority_decides_who_moves() {
        let mut a = cube(0, -0.5, 0.0, 0.0, 0.0);
        let mut b = cube(1, 0.5, 0.0, 0.0, 0.0);
        a.high_mass_collision = 1000;
        let mut contact = head_on(&a, &b);
        contact.depth = 0.2;
        resolve_pair(&mut a, &mut b, &contact, &exact());
        assert_eq!(b.high_mass_collision(), 999);
        settle(&mut a);
        settle(&mut b);
        assert_relative_eq!(a.pose().position.x, -0.5);
        assert_relative_eq!(b.pose().position.x, 0.7, epsilon = 1e-12);
    }

    #[test]
    fn test_sleeping_partner_is_not_pushed() {
        let mut a = cube(0, -0.5, 0.0, 0.0, 0.0);
        let mut b = cube(1, 0.5, 0.0, 0.0, 0.0);
        b.sleep();
        let mut contact = head_on(&a, &b);
        contact.depth = 0.2;
        let config = exact();
        resolve_pair(&mut a, &mut b, &contact, &config);
        assert!(b.accumulator().is_empty());
        assert_eq!(a.high_mass_collision(), config.sleeping_contact_priority);
        assert_eq!(b.high_mass_collision(), config.sleeping_contact_priority - 1);
        settle(&mut a);
        assert_relative_eq!(a.pose().position.x, -0.7, epsilon = 1e-12);
    }

    #[test]
    fn test_ground_contact_stops_fall() {
        let mut body = cube(0, 0.0, 0.45, 0.0, 0.0);
        body.dynamics.twist.linear = Vector3::new(0.0, 0.0, -1.0);
        let contact = Contact {
            body_a: body.handle(),
            body_b: None,
            point: Point3::new(0.0, 0.0, 0.0),
            normal: Vector3::z(),
            depth: 0.05,
            face_normal: None,
        };
        let config = ContactConfig::default();
        resolve_ground(&mut body, &contact, &config);
        assert_eq!(body.high_mass_collision(), config.ground_priority);
        settle(&mut body);
        // reaction_bias removes slightly more than the approach speed.
        assert_relative_eq!(body.twist().linear.z, 0.02, epsilon = 1e-12);
        assert_relative_eq!(body.pose().position.z, 0.45 + 1.01 * 0.05, epsilon = 1e-12);
        assert_relative_eq!(body.twist().angular, Vector3::zeros(), epsilon = 1e-12);
    }

    #[test]
    fn test_ground_restitution_bounces() {
        let mut body = cube(0, 0.0, 0.45, 0.0, 0.5);
        body.dynamics.twist.linear = Vector3::new(0.0, 0.0, -4.0);
        let contact = Contact {
            body_a: body.handle(),
            body_b: None,
            point: Point3::origin(),
            normal: Vector3::z(),
            depth: 0.0,
            face_normal: None,
        };
        resolve_ground(&mut body, &contact, &ContactConfig::exact());
        settle(&mut body);
        assert_relative_eq!(body.twist().linear.z, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_friction_damps_sliding() {
        let mut body = cube(0, 0.0, 0.45, 2.0, 0.0);
        body.dynamics.twist.linear.z = -0.5;
        let contact = Contact {
            body_a: body.handle(),
            body_b: None,
            point: Point3::new(0.0, 0.0, -0.05),
            normal: Vector3::z(),
            depth: 0.05,
            face_normal: None,
        };
        resolve_ground(&mut body, &contact, &ContactConfig::exact());
        settle(&mut body);
        // Straight below the center: the whole response is linear.
        assert_relative_eq!(body.twist().linear.x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_off_center_contact_spins() {
        let mut body = cube(0, 0.0, 0.5, 0.0, 0.0);
        body.dynamics.twist.linear = Vector3::new(0.0, 0.0, -1.0);
        let contact = Contact {
            body_a: body.handle(),
            body_b: None,
            point: Point3::new(0.5, 0.0, 0.0),
            normal: Vector3::z(),
            depth: 0.0,
            face_normal: None,
        };
        resolve_ground(&mut body, &contact, &ContactConfig::exact());
        settle(&mut body);
        assert!(body.twist().angular.norm() > 0.1);
        // An edge hit on the +x side spins the box about y only.
        assert_relative_eq!(body.twist().angular.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(body.twist().angular.z, 0.0, epsilon = 1e-12);
    }

    fn resting_contact(body: &Body) -> Contact {
        Contact {
            body_a: body.handle(),
            body_b: None,
            point: Point3::new(0.0, 0.0, 0.0),
            normal: Vector3::z(),
            depth: 0.01,
            face_normal: None,
        }
    }

    #[test]
    fn test_face_down_spin_is_damped() {
        let mut body = cube(0, 0.0, 0.5, 0.0, 0.0);
        body.dynamics.twist.linear = Vector3::new(0.0, 0.0, -0.1);
        body.dynamics.twist.angular = Vector3::new(0.0, 0.0, 1.0);
        let contact = resting_contact(&body);
        resolve_ground(&mut body, &contact, &ContactConfig::default());
        settle(&mut body);
        assert_relative_eq!(body.twist().angular.z, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_tilted_spin_is_not_damped() {
        let mut body = cube(0, 0.0, 0.5, 0.0, 0.0);
        body.pose.rotation = UnitQuaternion::from_euler_angles(0.5, 0.0, 0.0);
        body.dynamics.twist.linear = Vector3::new(0.0, 0.0, -0.1);
        body.dynamics.twist.angular = Vector3::new(0.0, 0.0, 1.0);
        let contact = resting_contact(&body);
        resolve_ground(&mut body, &contact, &ContactConfig::default());
        settle(&mut body);
        assert_relative_eq!(body.twist().angular.z, 1.0, epsilon = 1e-12);
    }
}
