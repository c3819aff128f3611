//! The sub-step pipeline.
//!
//! ```text
//! sync poses → integrate → partition → detect + resolve → apply → write poses
//! ```
//!
//! The sleep check is not part of a sub-step. [`check_sleep`] runs once per
//! outer step so the idle tolerances are measured over the full step no
//! matter how many sub-steps it was split into.
//!
//! Detection reads a snapshot of every body's bounds taken after
//! integration, and resolution only queues deltas, so no body's pose or
//! velocity changes between the first contact query and the apply phase.

use boxsim_env::Environment;
use boxsim_types::{BodyHandle, SimulationConfig, SleepConfig};
use hashbrown::HashSet;
use tracing::{debug, trace, warn};

use crate::body::{Body, BodyBounds};
use crate::detection::{self, Contact};
use crate::entity::EntityStore;
use crate::octree::Octree;
use crate::response;

/// What a sub-step leaves behind.
pub(crate) struct SubStepOutcome {
    /// Partition built over the present bodies.
    pub octree: Octree,
    /// Whether each body's entity was found in the store.
    pub present: Vec<bool>,
}

/// Everything one sub-step needs.
pub(crate) struct SubStep<'a, S: ?Sized, E: ?Sized> {
    pub config: &'a SimulationConfig,
    pub bodies: &'a mut [Body],
    pub store: &'a mut S,
    pub env: &'a E,
    pub contacts: &'a mut Vec<Contact>,
}

impl<S: EntityStore + ?Sized, E: Environment + ?Sized> SubStep<'_, S, E> {
    /// Run one sub-step of length `dt`.
    pub fn run(self, dt: f64) -> SubStepOutcome {
        let present = sync_poses(self.bodies, &*self.store);
        integrate(self.bodies, &present, self.config, dt);
        let mut octree = partition(self.bodies, &present, self.config);
        detect_and_resolve(
            self.bodies,
            &present,
            &mut octree,
            self.env,
            self.config,
            self.contacts,
        );
        apply_and_write(self.bodies, &present, self.store);
        SubStepOutcome { octree, present }
    }
}

/// Pull every body's pose from the store.
///
/// Bodies whose entity is gone are flagged absent and skipped for the rest
/// of the sub-step.
fn sync_poses<S: EntityStore + ?Sized>(bodies: &mut [Body], store: &S) -> Vec<bool> {
    bodies
        .iter_mut()
        .map(|body| match store.transform(body.entity) {
            Some(transform) if transform.pose.is_finite() => {
                body.pose = transform.pose;
                true
            }
            _ => {
                warn!(
                    entity = %body.entity,
                    body = %body.handle,
                    "entity missing from store, skipping body"
                );
                false
            }
        })
        .collect()
}

fn integrate(bodies: &mut [Body], present: &[bool], config: &SimulationConfig, dt: f64) {
    for (body, _) in bodies.iter_mut().zip(present).filter(|(_, p)| **p) {
        body.decay_priority();
        body.apply_gravity(&config.gravity, dt);
        if body.integrate(dt, config.sleep.wake_speed) {
            debug!(entity = %body.entity, "body woke up");
        }
    }
}

/// Rebuild the octree and hand each body its membership.
fn partition(bodies: &mut [Body], present: &[bool], config: &SimulationConfig) -> Octree {
    let items: Vec<_> = bodies
        .iter()
        .zip(present)
        .filter(|(_, p)| **p)
        .map(|(body, _)| (body.handle, body.bounds().aabb))
        .collect();

    let mut octree = Octree::build(&items, &config.partition);
    let mut memberships = octree.take_memberships().into_iter();
    for body in bodies.iter_mut() {
        body.membership = memberships.next().unwrap_or_default();
    }
    octree
}

fn detect_and_resolve<E: Environment + ?Sized>(
    bodies: &mut [Body],
    present: &[bool],
    octree: &mut Octree,
    env: &E,
    config: &SimulationConfig,
    contacts: &mut Vec<Contact>,
) {
    let bounds: Vec<Option<BodyBounds>> = bodies
        .iter()
        .zip(present)
        .map(|(body, p)| p.then(|| body.bounds()))
        .collect();
    let mut visited: HashSet<(usize, usize)> = HashSet::new();

    for index in 0..bodies.len() {
        let membership = std::mem::take(&mut bodies[index].membership);
        if !bodies[index].awake {
            continue;
        }
        let Some(own) = bounds[index].as_ref() else {
            continue;
        };

        let handle = BodyHandle::new(index);
        let neighbors = octree.take_neighbors(handle, &membership);
        let candidates = neighbors
            .iter()
            .filter(|other| visited.insert(pair_key(index, other.index())))
            .filter_map(|other| bounds.get(other.index()).and_then(Option::as_ref));

        let mut found = detection::neighbor_contacts(own, candidates);
        found.extend(detection::ground_contact(
            handle,
            &own.obb,
            env,
            &config.ground_tag,
            &config.contact,
        ));

        for contact in found {
            trace!(
                a = %contact.body_a,
                b = ?contact.body_b.map(BodyHandle::index),
                depth = contact.depth,
                normal = ?contact.normal,
                "resolving contact"
            );
            match contact.body_b {
                None => response::resolve_ground(&mut bodies[index], &contact, &config.contact),
                Some(other) => {
                    if let Some((a, b)) = pair_mut(bodies, index, other.index()) {
                        response::resolve_pair(a, b, &contact, &config.contact);
                    }
                }
            }
            contacts.push(contact);
        }
    }
}

fn apply_and_write<S: EntityStore + ?Sized>(bodies: &mut [Body], present: &[bool], store: &mut S) {
    for (body, _) in bodies.iter_mut().zip(present).filter(|(_, p)| **p) {
        body.apply_accumulator();
        store.set_pose(body.entity, body.pose);
    }
}

/// Idle tracking over one outer step of length `dt`.
///
/// Bodies missing from the store during the last sub-step are left alone.
pub(crate) fn check_sleep(bodies: &mut [Body], present: &[bool], config: &SleepConfig, dt: f64) {
    for (body, _) in bodies.iter_mut().zip(present).filter(|(_, p)| **p) {
        if body.awake && body.update_sleep(dt, config) {
            debug!(entity = %body.entity, "body fell asleep");
        }
    }
}

fn pair_key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Two distinct mutable bodies.
fn pair_mut(bodies: &mut [Body], a: usize, b: usize) -> Option<(&mut Body, &mut Body)> {
    if a == b || a >= bodies.len() || b >= bodies.len() {
        return None;
    }
    if a < b {
        let (low, high) = bodies.split_at_mut(b);
        Some((&mut low[a], &mut high[0]))
    } else {
        let (low, high) = bodies.split_at_mut(a);
        Some((&mut high[0], &mut low[b]))
    }
}
