//! Rays and ray hits.

use nalgebra::{Point3, Vector3};

/// A ray defined by an origin point and a direction vector.
///
/// The direction does not need to be normalized, but must be non-zero for
/// queries to hit anything.
///
/// # Example
///
/// ```
/// use boxsim_env::Ray;
/// use nalgebra::{Point3, Vector3};
///
/// let ray = Ray::new(Point3::origin(), Vector3::new(2.0, 0.0, 0.0));
/// let p = ray.point_at(3.0);
/// assert!((p.x - 6.0).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// The origin of the ray.
    pub origin: Point3<f64>,
    /// The direction of the ray (not necessarily normalized).
    pub direction: Vector3<f64>,
}

impl Ray {
    /// Creates a new ray with the given origin and direction.
    #[must_use]
    pub const fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Self {
        Self { origin, direction }
    }

    /// Ray pointing straight down (`-Z`) from `origin`.
    #[must_use]
    pub fn down(origin: Point3<f64>) -> Self {
        Self::new(origin, -Vector3::z())
    }

    /// Returns the point along the ray at parameter `t`.
    #[must_use]
    pub fn point_at(&self, t: f64) -> Point3<f64> {
        self.origin + self.direction * t
    }

    /// Returns a normalized version of this ray.
    ///
    /// If the direction is zero, returns `None`.
    #[must_use]
    pub fn normalized(&self) -> Option<Self> {
        let norm = self.direction.norm();
        if !norm.is_finite() || norm < f64::EPSILON {
            return None;
        }
        Some(Self {
            origin: self.origin,
            direction: self.direction / norm,
        })
    }
}

/// The nearest surface a ray struck.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit<'a> {
    /// World point of impact.
    pub point: Point3<f64>,
    /// Outward surface normal at the impact point (unit length).
    pub normal: Vector3<f64>,
    /// Distance from the ray origin along the normalized direction.
    pub distance: f64,
    /// Tag of the surface that was hit.
    pub tag: &'a str,
}
