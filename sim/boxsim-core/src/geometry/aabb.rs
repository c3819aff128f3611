//! Axis-aligned bounding boxes.

use boxsim_types::Pose;
use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How an [`Aabb`] encloses a rotated box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Containment {
    /// Smallest axis-aligned box around the rotated corners.
    Tight,
    /// Cube whose half-size is the box's half-diagonal.
    ///
    /// Independent of orientation, so it never needs the rotation and always
    /// encloses the box however it turns.
    #[default]
    Loose,
}

/// An axis-aligned bounding box stored as center and half-extents.
///
/// # Example
///
/// ```
/// use boxsim_core::Aabb;
/// use nalgebra::{Point3, Vector3};
///
/// let a = Aabb::new(Point3::origin(), Vector3::new(1.0, 1.0, 1.0));
/// let b = Aabb::new(Point3::new(1.5, 0.0, 0.0), Vector3::new(0.5, 0.5, 0.5));
/// assert!(a.overlaps(&b));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aabb {
    /// Center of the box.
    pub center: Point3<f64>,
    /// Half-size along each world axis. Components are non-negative.
    pub half_extents: Vector3<f64>,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::new(Point3::origin(), Vector3::zeros())
    }
}

impl Aabb {
    /// Create an AABB from center and half-extents.
    ///
    /// Negative half-extents are folded to their absolute value.
    #[must_use]
    pub fn new(center: Point3<f64>, half_extents: Vector3<f64>) -> Self {
        Self {
            center,
            half_extents: half_extents.abs(),
        }
    }

    /// Create an AABB spanning two corners.
    #[must_use]
    pub fn from_min_max(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self::new(nalgebra::center(&min, &max), (max - min) * 0.5)
    }

    /// Bounds of a box with the given pose and half-extents.
    #[must_use]
    pub fn from_box(pose: &Pose, half_extents: &Vector3<f64>, containment: Containment) -> Self {
        let half = match containment {
            Containment::Loose => {
                let r = half_extents.norm();
                Vector3::new(r, r, r)
            }
            Containment::Tight => {
                let m = pose.rotation.to_rotation_matrix();
                m.matrix().abs() * half_extents.abs()
            }
        };
        Self::new(pose.position, half)
    }

    /// Minimum corner.
    #[must_use]
    pub fn min(&self) -> Point3<f64> {
        self.center - self.half_extents
    }

    /// Maximum corner.
    #[must_use]
    pub fn max(&self) -> Point3<f64> {
        self.center + self.half_extents
    }

    /// Conservative overlap test.
    ///
    /// True iff on every axis the distance between centers is at most the
    /// sum of the half-extents. Touching boxes overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let distance = (self.center - other.center).abs();
        let reach = self.half_extents + other.half_extents;
        distance.x <= reach.x && distance.y <= reach.y && distance.z <= reach.z
    }

    /// Check whether a point lies inside or on the box.
    #[must_use]
    pub fn contains_point(&self, point: &Point3<f64>) -> bool {
        let d = (point - self.center).abs();
        d.x <= self.half_extents.x && d.y <= self.half_extents.y && d.z <= self.half_extents.z
    }

    /// Smallest AABB enclosing both boxes.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::from_min_max(self.min().inf(&other.min()), self.max().sup(&other.max()))
    }

    /// The 8 corners.
    ///
    /// Corner `i` takes the negative x side when bit 0 of `i` is set, the
    /// negative y side for bit 1 and the negative z side for bit 2; the
    /// same numbering the octree uses for its octants.
    #[must_use]
    pub fn corners(&self) -> [Point3<f64>; 8] {
        std::array::from_fn(|i| self.center + octant_sign(i).component_mul(&self.half_extents))
    }
}

/// Sign pattern of octant `i`: bit 0 → -x, bit 1 → -y, bit 2 → -z.
pub(crate) fn octant_sign(i: usize) -> Vector3<f64> {
    let s = |bit: usize| if i & bit == 0 { 1.0 } else { -1.0 };
    Vector3::new(s(1), s(2), s(4))
}
