//! Oriented-box rigid-body simulation.
//!
//! Boxes mirror entities held by an [`EntityStore`]. Each step they fall,
//! collide with each other through an octree broad phase and a
//! separating-axis narrow phase, find the ground by probing an
//! [`Environment`](boxsim_env::Environment), and settle through averaged
//! impulse corrections until they fall asleep.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         World                                │
//! │  Owns: bodies, entity store, environment, pending actions   │
//! │  Drives: step(delta_time, iterations)                       │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │ per sub-step
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │   integrate → Octree → detection → response → Accumulator   │
//! │   (gravity,    (loose    (SAT pairs,  (impulses,  (averaged  │
//! │    velocity)    AABBs)    ground rays) friction)   apply)    │
//! │                                          → EntityStore       │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │ once per step
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        sleep check                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Layer 0 Crate
//!
//! No engine or GUI dependencies. The entity layer and the static scenery
//! are traits, so the simulator runs headless against [`SceneStore`] and
//! [`StaticScene`](boxsim_env::StaticScene) or inside a host engine.
//!
//! # Quick Start
//!
//! ```
//! use boxsim_core::{SceneStore, World};
//! use boxsim_env::StaticScene;
//! use boxsim_types::{BodyDesc, EntityTransform, SimulationConfig};
//! use nalgebra::Point3;
//!
//! let mut store = SceneStore::new();
//! let crate_box = store.spawn(EntityTransform::unit_cube(Point3::new(0.0, 0.0, 2.0)));
//! let ground = StaticScene::ground_plane(0.0, "ground");
//!
//! let mut world = World::new(SimulationConfig::default(), store, ground).unwrap();
//! let handle = world.add_body(BodyDesc::new(crate_box, 1.0)).unwrap();
//!
//! // One second at 60 Hz with four sub-steps per frame
//! for _ in 0..60 {
//!     world.step(1.0 / 60.0, 4).unwrap();
//! }
//!
//! let body = world.body(handle).unwrap();
//! println!("box at z = {:.3}", body.pose().position.z);
//! println!("contacts last frame: {}", world.last_contacts().len());
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
)]

mod accumulator;
mod body;
pub mod detection;
mod entity;
pub mod geometry;
pub mod octree;
pub mod response;
mod stepper;
mod world;

pub use accumulator::{Accumulator, AveragedDeltas, Delta, DeltaKind};
pub use body::{Body, BodyBounds, BoxGeometry, Dynamics};
pub use detection::{ground_contact, neighbor_contacts, Contact};
pub use entity::{EntityStore, SceneStore};
pub use geometry::{Aabb, Containment, Obb, ObbContact};
pub use octree::{NodeId, Octree, OctreeNode, PartitionMembership};
pub use response::{resolve_ground, resolve_pair};
pub use world::{StepReport, World};

// Re-export key types from boxsim-types for convenience
pub use boxsim_types::{
    Action, ActionType, BodyDesc, BodyHandle, ContactConfig, EntityId, EntityTransform,
    PartitionConfig, Pose, SimError, SimulationConfig, SleepConfig, Twist,
};
