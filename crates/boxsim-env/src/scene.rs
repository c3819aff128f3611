//! Static tagged surfaces and the [`Environment`] query trait.

use nalgebra::{Point3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{EnvError, Ray, RaycastHit};

const PARALLEL_EPSILON: f64 = 1e-12;

/// Anything a body can probe with a downward ray.
///
/// Implementations return the nearest surface hit within `max_distance`
/// along the normalized ray direction, or `None`.
pub trait Environment {
    /// Cast `ray` against the environment.
    fn raycast(&self, ray: &Ray, max_distance: f64) -> Option<RaycastHit<'_>>;
}

/// The empty environment. Nothing is ever hit.
impl Environment for () {
    fn raycast(&self, _ray: &Ray, _max_distance: f64) -> Option<RaycastHit<'_>> {
        None
    }
}

impl<E: Environment + ?Sized> Environment for &E {
    fn raycast(&self, ray: &Ray, max_distance: f64) -> Option<RaycastHit<'_>> {
        (**self).raycast(ray, max_distance)
    }
}

/// Geometry of a static surface.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SurfaceShape {
    /// Infinite plane `normal · x = offset`; only its front face is solid.
    Plane {
        /// Unit outward normal.
        normal: Vector3<f64>,
        /// Signed distance of the plane from the origin along `normal`.
        offset: f64,
    },
    /// Static oriented box.
    Box {
        /// Box center.
        center: Point3<f64>,
        /// Box orientation.
        rotation: UnitQuaternion<f64>,
        /// Half-size along each local axis.
        half_extents: Vector3<f64>,
    },
}

/// A tagged static surface.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Surface {
    /// Surface geometry.
    pub shape: SurfaceShape,
    /// Tag reported with every hit on this surface.
    pub tag: String,
}

impl Surface {
    /// Distance and normal of the first entry of a normalized ray.
    ///
    /// Rays starting inside or behind the surface report no hit.
    fn intersect(&self, ray: &Ray) -> Option<(f64, Vector3<f64>)> {
        match self.shape {
            SurfaceShape::Plane { normal, offset } => {
                let denom = normal.dot(&ray.direction);
                if denom > -PARALLEL_EPSILON {
                    return None;
                }
                let t = (offset - normal.dot(&ray.origin.coords)) / denom;
                (t >= 0.0).then_some((t, normal))
            }
            SurfaceShape::Box {
                center,
                rotation,
                half_extents,
            } => {
                let inv = rotation.inverse();
                let origin = inv * (ray.origin - center);
                let direction = inv * ray.direction;

                let mut t_enter = f64::NEG_INFINITY;
                let mut t_exit = f64::INFINITY;
                let mut enter_axis = 0;
                let mut enter_sign = 0.0;

                for axis in 0..3 {
                    let o = origin[axis];
                    let d = direction[axis];
                    let h = half_extents[axis];
                    if d.abs() < PARALLEL_EPSILON {
                        if o.abs() > h {
                            return None;
                        }
                        continue;
                    }
                    let (t0, t1) = {
                        let a = (-h - o) / d;
                        let b = (h - o) / d;
                        if a <= b { (a, b) } else { (b, a) }
                    };
                    if t0 > t_enter {
                        t_enter = t0;
                        enter_axis = axis;
                        enter_sign = -d.signum();
                    }
                    t_exit = t_exit.min(t1);
                }

                if t_enter > t_exit || t_enter < 0.0 || !t_enter.is_finite() {
                    return None;
                }

                let mut local_normal = Vector3::zeros();
                local_normal[enter_axis] = enter_sign;
                Some((t_enter, rotation * local_normal))
            }
        }
    }
}

/// A collection of static tagged surfaces.
///
/// # Example
///
/// ```
/// use boxsim_env::{Environment, Ray, StaticScene};
/// use nalgebra::Point3;
///
/// let scene = StaticScene::ground_plane(0.0, "ground");
/// let hit = scene.raycast(&Ray::down(Point3::new(0.0, 0.0, 0.5)), 1.0).unwrap();
/// assert_eq!(hit.tag, "ground");
/// assert!((hit.distance - 0.5).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StaticScene {
    surfaces: Vec<Surface>,
}

impl StaticScene {
    /// Create an empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scene holding one horizontal plane at `height`, facing `+Z`.
    #[must_use]
    pub fn ground_plane(height: f64, tag: impl Into<String>) -> Self {
        Self {
            surfaces: vec![Surface {
                shape: SurfaceShape::Plane {
                    normal: Vector3::z(),
                    offset: height,
                },
                tag: tag.into(),
            }],
        }
    }

    /// Add an infinite plane through `point` with outward `normal`.
    ///
    /// Returns the index of the new surface.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::InvalidNormal`] for a zero or non-finite normal and
    /// [`EnvError::NonFinitePlacement`] for a non-finite point.
    pub fn add_plane(
        &mut self,
        point: Point3<f64>,
        normal: Vector3<f64>,
        tag: impl Into<String>,
    ) -> Result<usize, EnvError> {
        let norm = normal.norm();
        if !norm.is_finite() || norm < PARALLEL_EPSILON {
            return Err(EnvError::InvalidNormal(normal));
        }
        if !point.iter().all(|c| c.is_finite()) {
            return Err(EnvError::NonFinitePlacement);
        }
        let normal = normal / norm;
        self.surfaces.push(Surface {
            shape: SurfaceShape::Plane {
                normal,
                offset: normal.dot(&point.coords),
            },
            tag: tag.into(),
        });
        Ok(self.surfaces.len() - 1)
    }

    /// Add a static oriented box.
    ///
    /// Returns the index of the new surface.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::InvalidHalfExtents`] unless every half-extent is
    /// positive and finite, and [`EnvError::NonFinitePlacement`] for a
    /// non-finite center or rotation.
    pub fn add_box(
        &mut self,
        center: Point3<f64>,
        rotation: UnitQuaternion<f64>,
        half_extents: Vector3<f64>,
        tag: impl Into<String>,
    ) -> Result<usize, EnvError> {
        if !half_extents.iter().all(|h| h.is_finite() && *h > 0.0) {
            return Err(EnvError::InvalidHalfExtents(half_extents));
        }
        if !center.iter().all(|c| c.is_finite())
            || !rotation.coords.iter().all(|c| c.is_finite())
        {
            return Err(EnvError::NonFinitePlacement);
        }
        self.surfaces.push(Surface {
            shape: SurfaceShape::Box {
                center,
                rotation,
                half_extents,
            },
            tag: tag.into(),
        });
        Ok(self.surfaces.len() - 1)
    }

    /// All surfaces in insertion order.
    #[must_use]
    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    /// Number of surfaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    /// Whether the scene has no surfaces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

impl Environment for StaticScene {
    fn raycast(&self, ray: &Ray, max_distance: f64) -> Option<RaycastHit<'_>> {
        let ray = ray.normalized()?;
        if !max_distance.is_finite() || max_distance < 0.0 {
            return None;
        }

        self.surfaces
            .iter()
            .filter_map(|surface| {
                surface
                    .intersect(&ray)
                    .filter(|(t, _)| *t <= max_distance)
                    .map(|(t, normal)| RaycastHit {
                        point: ray.point_at(t),
                        normal,
                        distance: t,
                        tag: surface.tag.as_str(),
                    })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}
