//! Access to the external entity layer.
//!
//! Entity poses are owned outside the simulator. A world reads each body's
//! pose and scale at the start of a sub-step and writes the new pose back at
//! the end of it.

use boxsim_types::{EntityId, EntityTransform, Pose};
use hashbrown::HashMap;

/// Read/write access to entity transforms.
pub trait EntityStore {
    /// Current transform of `entity`, or `None` if it no longer exists.
    fn transform(&self, entity: EntityId) -> Option<EntityTransform>;

    /// Overwrite the pose of `entity`, leaving its scale untouched.
    ///
    /// Unknown entities are ignored.
    fn set_pose(&mut self, entity: EntityId, pose: Pose);
}

impl<S: EntityStore + ?Sized> EntityStore for &mut S {
    fn transform(&self, entity: EntityId) -> Option<EntityTransform> {
        (**self).transform(entity)
    }

    fn set_pose(&mut self, entity: EntityId, pose: Pose) {
        (**self).set_pose(entity, pose);
    }
}

/// In-memory entity store.
///
/// # Example
///
/// ```
/// use boxsim_core::{EntityStore, SceneStore};
/// use boxsim_types::EntityTransform;
/// use nalgebra::Point3;
///
/// let mut scene = SceneStore::new();
/// let id = scene.spawn(EntityTransform::unit_cube(Point3::new(0.0, 0.0, 2.0)));
/// assert_eq!(scene.transform(id).unwrap().pose.position.z, 2.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SceneStore {
    entities: HashMap<EntityId, EntityTransform>,
    next_id: u64,
}

impl SceneStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity under a fresh ID.
    pub fn spawn(&mut self, transform: EntityTransform) -> EntityId {
        loop {
            let id = EntityId::new(self.next_id);
            self.next_id += 1;
            if !self.entities.contains_key(&id) {
                self.entities.insert(id, transform);
                return id;
            }
        }
    }

    /// Insert or replace an entity under a caller-chosen ID.
    ///
    /// Returns the previous transform, if any.
    pub fn insert(&mut self, id: EntityId, transform: EntityTransform) -> Option<EntityTransform> {
        self.entities.insert(id, transform)
    }

    /// Remove an entity.
    pub fn remove(&mut self, id: EntityId) -> Option<EntityTransform> {
        self.entities.remove(&id)
    }

    /// Borrow an entity's transform.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&EntityTransform> {
        self.entities.get(&id)
    }

    /// Mutably borrow an entity's transform.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut EntityTransform> {
        self.entities.get_mut(&id)
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterate over all entities in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &EntityTransform)> {
        self.entities.iter().map(|(id, t)| (*id, t))
    }
}

impl EntityStore for SceneStore {
    fn transform(&self, entity: EntityId) -> Option<EntityTransform> {
        self.entities.get(&entity).copied()
    }

    fn set_pose(&mut self, entity: EntityId, pose: Pose) {
        if let Some(transform) = self.entities.get_mut(&entity) {
            transform.pose = pose;
        }
    }
}
