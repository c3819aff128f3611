//! Box geometry: axis-aligned and oriented bounding boxes.
//!
//! Both shapes are rebuilt from a body's current pose every time they are
//! needed; nothing here is cached across sub-steps.

mod aabb;
mod obb;

pub(crate) use aabb::octant_sign;
pub use aabb::{Aabb, Containment};
pub use obb::{Obb, ObbContact};
