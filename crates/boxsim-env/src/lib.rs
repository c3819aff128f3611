//! Static environment queries for box simulations.
//!
//! Bodies find the ground by casting short rays downward from their lowest
//! corners. This crate supplies the other side of that query: a ray type, a
//! hit record carrying the struck surface's tag, and the [`Environment`]
//! trait the simulator is generic over.
//!
//! [`StaticScene`] is the provided implementation: a list of tagged infinite
//! planes and tagged static oriented boxes. The unit type `()` is the empty
//! environment.

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]

mod error;
mod ray;
mod scene;

pub use error::EnvError;
pub use ray::{Ray, RaycastHit};
pub use scene::{Environment, StaticScene, Surface, SurfaceShape};
