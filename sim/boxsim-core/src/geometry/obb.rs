//! Oriented bounding boxes and the separating-axis overlap test.

use std::f64::consts::TAU;

use boxsim_types::Pose;
use nalgebra::{Point3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cross products shorter than this come from near-parallel faces and are
/// not tested as separating axes.
const AXIS_EPSILON: f64 = 1e-6;

/// Edges shorter than this, or this close to parallel with a face, are
/// skipped when locating the contact point.
const PARALLEL_EPSILON: f64 = 1e-12;

/// How far past either end of an edge an intersection is still accepted.
const EDGE_EXTENSION: f64 = 0.1;

/// Tolerance (radians) on the angle sum of the point-in-quad test.
const QUAD_EXTENSION: f64 = 0.1;

/// Vertex index pairs for the 12 box edges.
const EDGES: [[usize; 2]; 12] = [
    [0, 1],
    [1, 3],
    [3, 2],
    [2, 0],
    [4, 5],
    [5, 7],
    [7, 6],
    [6, 4],
    [0, 4],
    [1, 5],
    [2, 6],
    [3, 7],
];

/// Vertex indices of the 6 box faces, each wound around its quad.
const FACES: [[usize; 4]; 6] = [
    [0, 1, 3, 2],
    [4, 5, 7, 6],
    [0, 1, 5, 4],
    [0, 4, 6, 2],
    [6, 7, 3, 2],
    [5, 1, 3, 7],
];

/// Result of a successful [`Obb::overlaps`] test.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObbContact {
    /// Representative contact point.
    pub point: Point3<f64>,
    /// Unit normal of the least-overlapping axis, pointing toward the first
    /// box.
    pub normal: Vector3<f64>,
    /// Penetration along `normal`. Zero for touching boxes.
    pub depth: f64,
    /// Mean outward normal of the first box's faces crossed by the second
    /// box's edges, negated so it points the same way as `normal`.
    ///
    /// `None` when no such crossing was found.
    pub face_normal: Option<Vector3<f64>>,
}

/// An oriented box with precomputed corner vertices.
///
/// Vertex `i` sits on the negative local x side when bit 0 of `i` is set,
/// negative y for bit 1 and negative z for bit 2.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Obb {
    /// Center of the box.
    pub center: Point3<f64>,
    /// Orientation of the box.
    pub rotation: UnitQuaternion<f64>,
    /// Half-size along each local axis.
    pub half_extents: Vector3<f64>,
    vertices: [Point3<f64>; 8],
}

impl Obb {
    /// Create an oriented box.
    #[must_use]
    pub fn new(
        center: Point3<f64>,
        rotation: UnitQuaternion<f64>,
        half_extents: Vector3<f64>,
    ) -> Self {
        let vertices = std::array::from_fn(|i| {
            let local = super::aabb::octant_sign(i).component_mul(&half_extents);
            center + rotation * local
        });
        Self {
            center,
            rotation,
            half_extents,
            vertices,
        }
    }

    /// Oriented box for a pose.
    #[must_use]
    pub fn from_pose(pose: &Pose, half_extents: Vector3<f64>) -> Self {
        Self::new(pose.position, pose.rotation, half_extents)
    }

    /// World-space corner vertices.
    #[must_use]
    pub fn vertices(&self) -> &[Point3<f64>; 8] {
        &self.vertices
    }

    /// World-space local axes (x, y, z).
    #[must_use]
    pub fn axes(&self) -> [Vector3<f64>; 3] {
        [
            self.rotation * Vector3::x(),
            self.rotation * Vector3::y(),
            self.rotation * Vector3::z(),
        ]
    }

    /// Separating-axis test against `other`.
    ///
    /// Tests the 3 face axes of each box and the 9 cross products between
    /// them. Returns `None` as soon as an axis separates the boxes.
    /// Otherwise the least-overlapping axis gives the normal (oriented toward
    /// `self`) and the depth, and the contact point comes from edge/face
    /// crossings between the two boxes.
    ///
    /// # Example
    ///
    /// ```
    /// use boxsim_core::Obb;
    /// use nalgebra::{Point3, UnitQuaternion, Vector3};
    ///
    /// let half = Vector3::new(0.5, 0.5, 0.5);
    /// let a = Obb::new(Point3::origin(), UnitQuaternion::identity(), half);
    /// let b = Obb::new(Point3::new(0.5, 0.0, 0.0), UnitQuaternion::identity(), half);
    ///
    /// let contact = a.overlaps(&b).unwrap();
    /// assert!((contact.depth - 0.5).abs() < 1e-9);
    /// assert!((contact.normal.x + 1.0).abs() < 1e-9);
    /// ```
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> Option<ObbContact> {
        let a = self.axes();
        let b = other.axes();

        let mut candidates = [Vector3::zeros(); 15];
        candidates[..3].copy_from_slice(&a);
        candidates[3..6].copy_from_slice(&b);
        for (i, axis_a) in a.iter().enumerate() {
            for (j, axis_b) in b.iter().enumerate() {
                candidates[6 + 3 * i + j] = axis_a.cross(axis_b);
            }
        }

        let mut best: Option<(f64, Vector3<f64>)> = None;
        for candidate in &candidates {
            let norm = candidate.norm();
            if norm < AXIS_EPSILON {
                continue;
            }
            let axis = candidate / norm;
            let (separation, sign) = self.separation_along(other, &axis);
            if separation > 0.0 {
                return None;
            }
            if best.map_or(true, |(value, _)| separation > value) {
                best = Some((separation, axis * sign));
            }
        }

        // Face axes are unit length, so at least one candidate was tested.
        let (separation, normal) = best?;
        let (point, face_normal) = self.contact_region(other);

        Some(ObbContact {
            point,
            normal,
            depth: (-separation).max(0.0),
            face_normal,
        })
    }

    /// Interval gap of both boxes projected on `axis`, and the side of
    /// `other` that `self` lies on.
    ///
    /// The gap is `coverage - (extent_a + extent_b)`: positive when the
    /// projections are disjoint, the negated overlap otherwise.
    fn separation_along(&self, other: &Self, axis: &Vector3<f64>) -> (f64, f64) {
        let (min_a, max_a) = project(&self.vertices, axis);
        let (min_b, max_b) = project(&other.vertices, axis);

        let coverage = max_a.max(max_b) - min_a.min(min_b);
        let gap = coverage - ((max_a - min_a) + (max_b - min_b));

        let center_a = 0.5 * (min_a + max_a);
        let center_b = 0.5 * (min_b + max_b);
        let sign = if center_a < center_b { -1.0 } else { 1.0 };

        (gap, sign)
    }

    /// Average of all edge/face crossings between the two boxes.
    ///
    /// Falls back to the midpoint of the centers when nothing crosses, which
    /// happens when one box is nested in the other.
    fn contact_region(&self, other: &Self) -> (Point3<f64>, Option<Vector3<f64>>) {
        let mut sum = Vector3::zeros();
        let mut count = 0_usize;
        let mut normals = Vector3::zeros();
        let mut normal_count = 0_usize;

        for face in self.face_quads() {
            let outward = self.outward_normal(&face);
            for (start, end) in other.edge_segments() {
                if let Some(p) = edge_quad_intersection(&start, &end, &face) {
                    sum += p.coords;
                    count += 1;
                    normals -= outward;
                    normal_count += 1;
                }
            }
        }
        for face in other.face_quads() {
            for (start, end) in self.edge_segments() {
                if let Some(p) = edge_quad_intersection(&start, &end, &face) {
                    sum += p.coords;
                    count += 1;
                }
            }
        }

        if count == 0 {
            return (nalgebra::center(&self.center, &other.center), None);
        }

        let point = Point3::from(sum / count as f64);
        let face_normal = (normal_count > 0)
            .then(|| normals.try_normalize(PARALLEL_EPSILON))
            .flatten();
        (point, face_normal)
    }

    fn edge_segments(&self) -> impl Iterator<Item = (Point3<f64>, Point3<f64>)> + '_ {
        EDGES
            .iter()
            .map(|[a, b]| (self.vertices[*a], self.vertices[*b]))
    }

    fn face_quads(&self) -> impl Iterator<Item = [Point3<f64>; 4]> + '_ {
        FACES.iter().map(|f| f.map(|i| self.vertices[i]))
    }

    fn outward_normal(&self, quad: &[Point3<f64>; 4]) -> Vector3<f64> {
        let n = quad_normal(quad).unwrap_or_else(Vector3::zeros);
        if n.dot(&(quad[0] - self.center)) < 0.0 {
            -n
        } else {
            n
        }
    }
}

fn project(vertices: &[Point3<f64>; 8], axis: &Vector3<f64>) -> (f64, f64) {
    vertices
        .iter()
        .map(|v| v.coords.dot(axis))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), d| {
            (lo.min(d), hi.max(d))
        })
}

fn quad_normal(quad: &[Point3<f64>; 4]) -> Option<Vector3<f64>> {
    (quad[1] - quad[0])
        .cross(&(quad[2] - quad[0]))
        .try_normalize(PARALLEL_EPSILON)
}

/// Where the segment `start..end` crosses the plane of `quad`, if the crossing
/// lies within the (slightly extended) segment and quad.
///
/// The in-quad test sums the angles subtended by consecutive quad corners;
/// a point inside a convex quad sees exactly a full turn.
fn edge_quad_intersection(
    start: &Point3<f64>,
    end: &Point3<f64>,
    quad: &[Point3<f64>; 4],
) -> Option<Point3<f64>> {
    let edge = end - start;
    let length = edge.norm();
    if length < PARALLEL_EPSILON {
        return None;
    }
    let direction = edge / length;
    let normal = quad_normal(quad)?;

    let facing = direction.dot(&normal);
    if facing.abs() < PARALLEL_EPSILON {
        return None;
    }

    let distance = (quad[0] - start).dot(&normal) / facing;
    if distance < -EDGE_EXTENSION || distance > length + EDGE_EXTENSION {
        return None;
    }

    let location = start + direction * distance;

    let mut theta = 0.0;
    for k in 0..4 {
        let from = quad[k] - location;
        let to = quad[(k + 1) % 4] - location;
        let (Some(from), Some(to)) = (
            from.try_normalize(PARALLEL_EPSILON),
            to.try_normalize(PARALLEL_EPSILON),
        ) else {
            // Sitting on a corner.
            return Some(location);
        };
        theta += from.dot(&to).clamp(-1.0, 1.0).acos();
    }

    ((TAU - QUAD_EXTENSION..=TAU + QUAD_EXTENSION).contains(&theta)).then_some(location)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_4;

    fn cube(x: f64, y: f64, z: f64) -> Obb {
        Obb::new(
            Point3::new(x, y, z),
            UnitQuaternion::identity(),
            Vector3::new(0.5, 0.5, 0.5),
        )
    }

    #[test]
    fn test_vertices_layout() {
        let obb = Obb::new(
            Point3::new(1.0, 0.0, 0.0),
            UnitQuaternion::identity(),
            Vector3::new(1.0, 2.0, 3.0),
        );
        let v = obb.vertices();
        assert_eq!(v[0], Point3::new(2.0, 2.0, 3.0));
        assert_eq!(v[1], Point3::new(0.0, 2.0, 3.0));
        assert_eq!(v[3], Point3::new(0.0, -2.0, 3.0));
        assert_eq!(v[4], Point3::new(2.0, 2.0, -3.0));
        assert_eq!(v[7], Point3::new(0.0, -2.0, -3.0));
    }

    #[test]
    fn test_far_apart_boxes_do_not_overlap() {
        assert!(cube(0.0, 0.0, 0.0).overlaps(&cube(100.0, 0.0, 0.0)).is_none());
        assert!(cube(0.0, 0.0, 0.0).overlaps(&cube(0.0, -3.0, 7.0)).is_none());
    }

    #[test]
    fn test_touching_cubes() {
        let contact = cube(0.0, 0.0, 0.0).overlaps(&cube(1.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(contact.depth, 0.0, epsilon = 1e-12);
        assert_relative_eq!(contact.normal, Vector3::new(-1.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_half_overlap_depth() {
        let contact = cube(0.0, 0.0, 0.0).overlaps(&cube(0.5, 0.0, 0.0)).unwrap();
        assert_relative_eq!(contact.depth, 0.5, epsilon = 1e-12);
        assert_relative_eq!(contact.normal.x.abs(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_normal_points_toward_first_box() {
        let contact = cube(0.0, 0.0, 1.0).overlaps(&cube(0.0, 0.0, 0.2)).unwrap();
        assert_relative_eq!(contact.normal, Vector3::z(), epsilon = 1e-12);
        assert_relative_eq!(contact.depth, 0.2, epsilon = 1e-12);

        let swapped = cube(0.0, 0.0, 0.2).overlaps(&cube(0.0, 0.0, 1.0)).unwrap();
        assert_relative_eq!(swapped.normal, -Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn test_contact_point_between_faces() {
        let contact = cube(0.0, 0.0, 0.0).overlaps(&cube(0.9, 0.0, 0.0)).unwrap();
        assert_relative_eq!(contact.point.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(contact.point.z, 0.0, epsilon = 1e-12);
        assert!(contact.point.x > 0.3 && contact.point.x < 0.6);
        let face_normal = contact.face_normal.unwrap();
        assert!(face_normal.dot(&contact.normal) > 0.0);
    }

    #[test]
    fn test_nested_box_falls_back_to_midpoint() {
        let outer = Obb::new(
            Point3::origin(),
            UnitQuaternion::identity(),
            Vector3::new(5.0, 5.0, 5.0),
        );
        let inner = Obb::new(
            Point3::new(1.0, 0.0, 0.0),
            UnitQuaternion::identity(),
            Vector3::new(0.5, 0.5, 0.5),
        );
        let contact = outer.overlaps(&inner).unwrap();
        assert_relative_eq!(contact.point, Point3::new(0.5, 0.0, 0.0), epsilon = 1e-12);
        assert!(contact.face_normal.is_none());
    }

    #[test]
    fn test_rotated_box_separated_on_cross_axis() {
        // A 45° turned cube whose corner points at a neighbor that is close
        // on the face axes but not actually touched.
        let rotated = Obb::new(
            Point3::origin(),
            UnitQuaternion::from_euler_angles(0.0, 0.0, FRAC_PI_4),
            Vector3::new(0.5, 0.5, 0.5),
        );
        assert!(rotated.overlaps(&cube(1.3, 0.0, 0.0)).is_none());
        assert!(rotated.overlaps(&cube(1.1, 0.0, 0.0)).is_some());
    }

    #[test]
    fn test_edge_quad_corner_hit() {
        let quad = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let hit = edge_quad_intersection(
            &Point3::new(0.0, 0.0, 1.0),
            &Point3::new(0.0, 0.0, -1.0),
            &quad,
        );
        assert_eq!(hit, Some(Point3::origin()));

        let miss = edge_quad_intersection(
            &Point3::new(2.0, 2.0, 1.0),
            &Point3::new(2.0, 2.0, -1.0),
            &quad,
        );
        assert!(miss.is_none());
    }

    #[test]
    fn test_edge_quad_respects_segment_length() {
        let quad = [
            Point3::new(-1.0, -1.0, 0.0),
            Point3::new(1.0, -1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(-1.0, 1.0, 0.0),
        ];
        let short = edge_quad_intersection(
            &Point3::new(0.0, 0.0, 2.0),
            &Point3::new(0.0, 0.0, 1.0),
            &quad,
        );
        assert!(short.is_none());

        let within_extension = edge_quad_intersection(
            &Point3::new(0.0, 0.0, 1.05),
            &Point3::new(0.0, 0.0, 0.05),
            &quad,
        );
        assert!(within_extension.is_some());
    }
}
