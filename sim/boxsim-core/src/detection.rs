//! Contact detection.
//!
//! Everything here is read-only with respect to simulation state: it looks
//! at bounds built from current poses and returns contact records.

use boxsim_env::{Environment, Ray};
use boxsim_types::{BodyHandle, ContactConfig};
use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::body::BodyBounds;
use crate::geometry::Obb;

/// A contact between a body and either another body or the environment.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Contact {
    /// The body whose query found the contact.
    pub body_a: BodyHandle,
    /// The other body, or `None` for the static environment.
    pub body_b: Option<BodyHandle>,
    /// Representative contact point.
    pub point: Point3<f64>,
    /// Unit normal pointing from B toward A.
    pub normal: Vector3<f64>,
    /// Penetration depth, never negative.
    pub depth: f64,
    /// Mean normal of A's faces crossed by B's edges, oriented like
    /// `normal`. `None` for ground contacts and nested boxes.
    pub face_normal: Option<Vector3<f64>>,
}

impl Contact {
    /// Whether this is a contact with the static environment.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        self.body_b.is_none()
    }
}

/// Probe the environment below the lower half of `obb` for ground.
///
/// Each vertex at or below the box center casts a ray straight down from
/// `ground_probe_lift` above itself over `ground_probe_distance`. Hits on
/// surfaces tagged `ground_tag` are averaged into a single contact; the
/// depth is the mean height of the hit above its vertex.
pub fn ground_contact<E: Environment + ?Sized>(
    body: BodyHandle,
    obb: &Obb,
    env: &E,
    ground_tag: &str,
    config: &ContactConfig,
) -> Option<Contact> {
    let mut count = 0_u32;
    let mut point = Vector3::zeros();
    let mut normal = Vector3::zeros();
    let mut depth = 0.0;

    for vertex in obb.vertices() {
        if obb.center.z - vertex.z < 0.0 {
            continue;
        }
        let origin = vertex + Vector3::z() * config.ground_probe_lift;
        let Some(hit) = env.raycast(&Ray::down(origin), config.ground_probe_distance) else {
            continue;
        };
        if hit.tag != ground_tag {
            continue;
        }
        count += 1;
        point += hit.point.coords;
        normal += hit.normal;
        depth += hit.point.z - vertex.z;
    }

    if count == 0 {
        return None;
    }

    let n = f64::from(count);
    let normal = (normal / n).try_normalize(f64::EPSILON)?;
    Some(Contact {
        body_a: body,
        body_b: None,
        point: Point3::from(point / n),
        normal,
        depth: (depth / n).max(0.0),
        face_normal: None,
    })
}

/// Precise contacts between `body` and each of `neighbors`.
///
/// Pairs whose loose bounds do not overlap are rejected before the
/// separating-axis test runs.
pub fn neighbor_contacts<'a>(
    body: &BodyBounds,
    neighbors: impl IntoIterator<Item = &'a BodyBounds>,
) -> Vec<Contact> {
    neighbors
        .into_iter()
        .filter(|other| other.handle != body.handle && body.aabb.overlaps(&other.aabb))
        .filter_map(|other| {
            body.obb.overlaps(&other.obb).map(|c| Contact {
                body_a: body.handle,
                body_b: Some(other.handle),
                point: c.point,
                normal: c.normal,
                depth: c.depth,
                face_normal: c.face_normal,
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::geometry::{Aabb, Containment};
    use approx::assert_relative_eq;
    use boxsim_env::StaticScene;
    use boxsim_types::Pose;
    use nalgebra::UnitQuaternion;

    fn bounds(i: usize, pose: Pose) -> BodyBounds {
        let half = Vector3::new(0.5, 0.5, 0.5);
        BodyBounds {
            handle: BodyHandle::new(i),
            aabb: Aabb::from_box(&pose, &half, Containment::Loose),
            obb: Obb::from_pose(&pose, half),
        }
    }

    fn at(x: f64, y: f64, z: f64) -> Pose {
        Pose::from_position(Point3::new(x, y, z))
    }

    #[test]
    fn test_ground_contact_resting_cube() {
        let scene = StaticScene::ground_plane(0.0, "ground");
        let b = bounds(0, at(1.0, 2.0, 0.45));
        let contact =
            ground_contact(b.handle, &b.obb, &scene, "ground", &ContactConfig::default()).unwrap();
        assert!(contact.is_ground());
        assert_relative_eq!(contact.depth, 0.05, epsilon = 1e-12);
        assert_relative_eq!(contact.normal, Vector3::z(), epsilon = 1e-12);
        assert_relative_eq!(contact.point, Point3::new(1.0, 2.0, 0.0), epsilon = 1e-12);
        assert!(contact.face_normal.is_none());
    }

    #[test]
    fn test_no_ground_contact_above_surface() {
        let scene = StaticScene::ground_plane(0.0, "ground");
        let b = bounds(0, at(0.0, 0.0, 0.6));
        assert!(
            ground_contact(b.handle, &b.obb, &scene, "ground", &ContactConfig::default()).is_none()
        );
    }

    #[test]
    fn test_ground_contact_requires_tag() {
        let scene = StaticScene::ground_plane(0.0, "water");
        let b = bounds(0, at(0.0, 0.0, 0.45));
        assert!(
            ground_contact(b.handle, &b.obb, &scene, "ground", &ContactConfig::default()).is_none()
        );
        assert!(ground_contact(b.handle, &b.obb, &(), "ground", &ContactConfig::default()).is_none());
    }

    #[test]
    fn test_tilted_cube_uses_lowest_corners() {
        let scene = StaticScene::ground_plane(0.0, "ground");
        let pose = Pose::from_position_rotation(
            Point3::new(0.0, 0.0, 0.6),
            UnitQuaternion::from_euler_angles(0.3, 0.0, 0.0),
        );
        let b = bounds(0, pose);
        let contact =
            ground_contact(b.handle, &b.obb, &scene, "ground", &ContactConfig::default()).unwrap();
        let lowest = b
            .obb
            .vertices()
            .iter()
            .map(|v| v.z)
            .fold(f64::INFINITY, f64::min);
        assert!(lowest < 0.0);
        assert!(contact.depth > 0.0 && contact.depth <= -lowest + 1e-12);
        // Contact sits on the side of the lower corners.
        assert!(contact.point.y.abs() > 1e-6);
    }

    #[test]
    fn test_neighbor_contacts() {
        let a = bounds(0, at(0.0, 0.0, 0.0));
        let near = bounds(1, at(0.8, 0.0, 0.0));
        let far = bounds(2, at(5.0, 0.0, 0.0));
        let contacts = neighbor_contacts(&a, [&near, &far, &a]);
        assert_eq!(contacts.len(), 1);
        let c = contacts[0];
        assert_eq!(c.body_a, BodyHandle::new(0));
        assert_eq!(c.body_b, Some(BodyHandle::new(1)));
        assert_relative_eq!(c.depth, 0.2, epsilon = 1e-12);
        assert_relative_eq!(c.normal, -Vector3::x(), epsilon = 1e-12);
        let face_normal = c.face_normal.unwrap();
        assert!(face_normal.dot(&c.normal) > 0.9);
    }

    #[test]
    fn test_loose_overlap_without_contact() {
        let a = bounds(0, at(0.0, 0.0, 0.0));
        // Diagonal neighbor: loose cubes overlap, boxes do not.
        let diagonal = bounds(1, at(1.2, 1.2, 0.0));
        assert!(a.aabb.overlaps(&diagonal.aabb));
        assert!(neighbor_contacts(&a, [&diagonal]).is_empty());
    }
}
