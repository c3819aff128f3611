//! The simulation world and its step driver.
//!
//! [`World`] owns every [`Body`], the entity store the bodies mirror, and
//! the environment ground probes query. [`World::step`] is the only entry
//! point that mutates simulation state.

use boxsim_env::Environment;
use boxsim_types::{Action, BodyDesc, BodyHandle, SimError, SimulationConfig};
use nalgebra::Vector3;
use tracing::debug;

use crate::body::{Body, BodyBounds};
use crate::detection::Contact;
use crate::entity::{EntityStore, SceneStore};
use crate::octree::Octree;
use crate::stepper::{check_sleep, SubStep};

/// Summary of one [`World::step`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// Sub-steps that ran.
    pub sub_steps: u32,
    /// Simulated seconds per sub-step, after time scaling.
    pub sub_step_dt: f64,
    /// Contacts resolved across all sub-steps.
    pub contacts: usize,
    /// Bodies awake after the step.
    pub awake: usize,
    /// Bodies asleep after the step.
    pub asleep: usize,
}

/// A set of boxes driven by discrete steps.
///
/// `S` is where entity poses live; `E` answers ground probes. Use
/// `()` as the environment when there is no static scenery.
#[derive(Debug)]
pub struct World<S: EntityStore = SceneStore, E: Environment = ()> {
    config: SimulationConfig,
    store: S,
    env: E,
    bodies: Vec<Body>,
    pending: Vec<Action>,
    octree: Option<Octree>,
    last_contacts: Vec<Contact>,
    time: f64,
    step_count: u64,
}

impl<S: EntityStore, E: Environment> World<S, E> {
    /// Create an empty world.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn new(config: SimulationConfig, store: S, env: E) -> boxsim_types::Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            env,
            bodies: Vec::new(),
            pending: Vec::new(),
            octree: None,
            last_contacts: Vec::new(),
            time: 0.0,
            step_count: 0,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Get the entity store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access to the entity store.
    ///
    /// Poses written here are picked up at the start of the next sub-step.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Get the environment.
    #[must_use]
    pub fn environment(&self) -> &E {
        &self.env
    }

    /// Simulated time in seconds.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of completed steps.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// All bodies in handle order.
    #[must_use]
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    /// Look up a body.
    #[must_use]
    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle.index())
    }

    /// Number of bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of awake bodies.
    #[must_use]
    pub fn awake_count(&self) -> usize {
        self.bodies.iter().filter(|b| b.is_awake()).count()
    }

    // =========================================================================
    // Body Management
    // =========================================================================

    /// Register a body for an entity already present in the store.
    ///
    /// The box size is taken from the entity's scale at this moment.
    ///
    /// # Errors
    ///
    /// Returns an error if the store does not know the entity, or if the
    /// descriptor or the entity's scale and pose are invalid.
    pub fn add_body(&mut self, desc: BodyDesc) -> boxsim_types::Result<BodyHandle> {
        let transform = self
            .store
            .transform(desc.entity)
            .ok_or(SimError::UnknownEntity(desc.entity))?;
        let handle = BodyHandle::new(self.bodies.len());
        self.bodies.push(Body::new(handle, &desc, &transform)?);
        Ok(handle)
    }

    /// Queue a velocity command for the start of the next step.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is unknown or the vector is not finite.
    pub fn submit(&mut self, action: Action) -> boxsim_types::Result<()> {
        if action.body.index() >= self.bodies.len() {
            return Err(SimError::InvalidBodyHandle(action.body.index()));
        }
        if !action.action_type.is_finite() {
            return Err(SimError::invalid_config("action vector must be finite"));
        }
        self.pending.push(action);
        Ok(())
    }

    // =========================================================================
    // Stepping
    // =========================================================================

    /// Advance the simulation by `delta_time` split into `iterations`
    /// equal sub-steps.
    ///
    /// `delta_time` is multiplied by the configured time scale first.
    /// Bodies are checked for sleep once, after the last sub-step.
    ///
    /// # Errors
    ///
    /// Returns an error if `delta_time` is not positive and finite, if
    /// `iterations` is zero, or if the state diverged during the step.
    pub fn step(&mut self, delta_time: f64, iterations: u32) -> boxsim_types::Result<StepReport> {
        if !delta_time.is_finite() || delta_time <= 0.0 {
            return Err(SimError::InvalidTimestep(delta_time));
        }
        if iterations == 0 {
            return Err(SimError::InvalidIterations(iterations));
        }

        let scaled = delta_time * self.config.time_scale;
        let sub_dt = scaled / f64::from(iterations);

        for action in std::mem::take(&mut self.pending) {
            if let Some(body) = self.bodies.get_mut(action.body.index()) {
                body.apply_action(&action.action_type);
            }
        }

        self.last_contacts.clear();
        let mut present = Vec::new();
        for _ in 0..iterations {
            let outcome = SubStep {
                config: &self.config,
                bodies: &mut self.bodies,
                store: &mut self.store,
                env: &self.env,
                contacts: &mut self.last_contacts,
            }
            .run(sub_dt);
            self.octree = Some(outcome.octree);
            present = outcome.present;
        }
        check_sleep(&mut self.bodies, &present, &self.config.sleep, scaled);

        self.time += scaled;
        self.step_count += 1;
        self.validate()?;

        let awake = self.awake_count();
        let report = StepReport {
            sub_steps: iterations,
            sub_step_dt: sub_dt,
            contacts: self.last_contacts.len(),
            awake,
            asleep: self.bodies.len() - awake,
        };
        debug!(
            step = self.step_count,
            sub_steps = report.sub_steps,
            awake = report.awake,
            asleep = report.asleep,
            contacts = report.contacts,
            "world stepped"
        );
        Ok(report)
    }

    /// Validate the world state.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or any body's pose
    /// or velocity is not finite.
    pub fn validate(&self) -> boxsim_types::Result<()> {
        self.config.validate()?;

        for body in &self.bodies {
            if !body.is_finite() {
                return Err(SimError::diverged(format!(
                    "body {} ({}) has non-finite state",
                    body.handle(),
                    body.entity()
                )));
            }
        }

        Ok(())
    }

    // =========================================================================
    // Debug Introspection
    // =========================================================================

    /// The partition built by the most recent sub-step.
    #[must_use]
    pub fn octree(&self) -> Option<&Octree> {
        self.octree.as_ref()
    }

    /// Loose AABB and OBB of every body at its current pose.
    #[must_use]
    pub fn bounds(&self) -> Vec<BodyBounds> {
        self.bodies.iter().map(Body::bounds).collect()
    }

    /// Contacts resolved during the last [`World::step`], all sub-steps.
    #[must_use]
    pub fn last_contacts(&self) -> &[Contact] {
        &self.last_contacts
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Compute the total kinetic energy of the system.
    #[must_use]
    pub fn total_kinetic_energy(&self) -> f64 {
        self.bodies.iter().map(Body::kinetic_energy).sum()
    }

    /// Compute the total linear momentum of the system.
    #[must_use]
    pub fn total_linear_momentum(&self) -> Vector3<f64> {
        self.bodies
            .iter()
            .map(Body::linear_momentum)
            .fold(Vector3::zeros(), |acc, p| acc + p)
    }
}
