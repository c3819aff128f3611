//! Configuration types for simulation.
//!
//! Every threshold and bias used by contact resolution, sleep management and
//! spatial partitioning lives here. None of them are physical constants; they
//! are tuning knobs, and the defaults reproduce the behavior the resolver was
//! calibrated against.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default surface tag that ground probes accept.
pub const DEFAULT_GROUND_TAG: &str = "ground";

/// Main configuration for a simulation world.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationConfig {
    /// Gravity acceleration (m/s²). Z is up.
    pub gravity: Vector3<f64>,
    /// Multiplier applied to every `delta_time` passed to the driver.
    pub time_scale: f64,
    /// Environment surfaces carrying this tag count as ground.
    pub ground_tag: String,
    /// Contact resolution tuning.
    pub contact: ContactConfig,
    /// Sleep/wake tuning.
    pub sleep: SleepConfig,
    /// Spatial partition tuning.
    pub partition: PartitionConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            gravity: Vector3::new(0.0, 0.0, -9.81),
            time_scale: 1.0,
            ground_tag: DEFAULT_GROUND_TAG.to_owned(),
            contact: ContactConfig::default(),
            sleep: SleepConfig::default(),
            partition: PartitionConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Disable gravity (zero-G environment).
    #[must_use]
    pub fn zero_gravity(mut self) -> Self {
        self.gravity = Vector3::zeros();
        self
    }

    /// Set the gravity vector.
    #[must_use]
    pub fn with_gravity(mut self, gravity: Vector3<f64>) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the time scale.
    #[must_use]
    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale;
        self
    }

    /// Set the ground tag.
    #[must_use]
    pub fn with_ground_tag(mut self, tag: impl Into<String>) -> Self {
        self.ground_tag = tag.into();
        self
    }

    /// Set the contact configuration.
    #[must_use]
    pub fn with_contact(mut self, contact: ContactConfig) -> Self {
        self.contact = contact;
        self
    }

    /// Set the sleep configuration.
    #[must_use]
    pub fn with_sleep(mut self, sleep: SleepConfig) -> Self {
        self.sleep = sleep;
        self
    }

    /// Set the partition configuration.
    #[must_use]
    pub fn with_partition(mut self, partition: PartitionConfig) -> Self {
        self.partition = partition;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(crate::SimError::invalid_config("gravity must be finite"));
        }

        if !self.time_scale.is_finite() || self.time_scale <= 0.0 {
            return Err(crate::SimError::invalid_config(format!(
                "time scale must be positive and finite, got {}",
                self.time_scale
            )));
        }

        self.contact.validate()?;
        self.sleep.validate()?;
        self.partition.validate()?;

        Ok(())
    }
}

/// Tuning for the impulse-based contact resolver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactConfig {
    /// Multiplier on `depth * normal` for positional correction.
    pub position_bias: f64,
    /// Fraction of the normal approach velocity removed on impact.
    ///
    /// Slightly above 1 so resting contacts separate instead of sinking.
    pub reaction_bias: f64,
    /// Restitution only engages when the approach speed is at least this.
    pub restitution_threshold: f64,
    /// Angular speed below which a centered contact settles rotation.
    pub settle_angular_speed: f64,
    /// Minimum |offset · normal| for a contact to count as centered.
    pub settle_alignment: f64,
    /// Minimum |face axis · normal| for a box to count as lying on a face
    /// against the ground. Its rotation is damped while it rests there.
    pub rest_alignment: f64,
    /// Stacking priority given to a body resting on the ground.
    pub ground_priority: i32,
    /// Stacking priority given to a body pushed against a sleeping body.
    pub sleeping_contact_priority: i32,
    /// How far above a box corner a ground probe starts.
    pub ground_probe_lift: f64,
    /// How far a ground probe travels downward.
    pub ground_probe_distance: f64,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            position_bias: 1.01,
            reaction_bias: 1.02,
            restitution_threshold: 2.0,
            settle_angular_speed: 0.1,
            settle_alignment: 0.9999,
            rest_alignment: 10.0_f64.to_radians().cos(),
            ground_priority: 1000,
            sleeping_contact_priority: 10,
            ground_probe_lift: 1.0,
            ground_probe_distance: 1.0,
        }
    }
}

impl ContactConfig {
    /// Exact velocity exchange: no reaction or position overshoot.
    ///
    /// Useful for analytic checks; the default biases are what keeps stacks
    /// from sinking into each other.
    #[must_use]
    pub fn exact() -> Self {
        Self {
            position_bias: 1.0,
            reaction_bias: 1.0,
            ..Default::default()
        }
    }

    /// Set the restitution threshold.
    #[must_use]
    pub fn with_restitution_threshold(mut self, threshold: f64) -> Self {
        self.restitution_threshold = threshold;
        self
    }

    /// Set the position and reaction biases.
    #[must_use]
    pub fn with_biases(mut self, position_bias: f64, reaction_bias: f64) -> Self {
        self.position_bias = position_bias;
        self.reaction_bias = reaction_bias;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        let positive = [
            ("position_bias", self.position_bias),
            ("reaction_bias", self.reaction_bias),
            ("ground_probe_lift", self.ground_probe_lift),
            ("ground_probe_distance", self.ground_probe_distance),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(crate::SimError::invalid_config(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }

        let non_negative = [
            ("restitution_threshold", self.restitution_threshold),
            ("settle_angular_speed", self.settle_angular_speed),
            ("settle_alignment", self.settle_alignment),
            ("rest_alignment", self.rest_alignment),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(crate::SimError::invalid_config(format!(
                    "{name} must be non-negative and finite, got {value}"
                )));
            }
        }

        if self.ground_priority < 0 || self.sleeping_contact_priority < 0 {
            return Err(crate::SimError::invalid_config(
                "stacking priorities must be non-negative",
            ));
        }

        Ok(())
    }
}

/// Tuning for sleep/wake transitions.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SleepConfig {
    /// Whether bodies may fall asleep at all.
    pub enabled: bool,
    /// Per-sub-step position change (m) still counted as idle.
    pub position_tolerance: f64,
    /// Per-sub-step rotation change (rad) still counted as idle.
    pub rotation_tolerance: f64,
    /// Idle time (s) after which a body falls asleep.
    pub idle_duration: f64,
    /// Linear speed above which a sleeping body wakes.
    pub wake_speed: f64,
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            position_tolerance: 0.01,
            rotation_tolerance: 0.1_f64.to_radians(),
            idle_duration: 5.0,
            wake_speed: 1.0,
        }
    }
}

impl SleepConfig {
    /// Never put bodies to sleep.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Set the idle duration.
    #[must_use]
    pub fn with_idle_duration(mut self, seconds: f64) -> Self {
        self.idle_duration = seconds;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        let values = [
            ("position_tolerance", self.position_tolerance),
            ("rotation_tolerance", self.rotation_tolerance),
            ("idle_duration", self.idle_duration),
            ("wake_speed", self.wake_speed),
        ];
        for (name, value) in values {
            if !value.is_finite() || value < 0.0 {
                return Err(crate::SimError::invalid_config(format!(
                    "sleep {name} must be non-negative and finite, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Tuning for the per-step octree.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PartitionConfig {
    /// Nodes holding this many items or fewer are not subdivided.
    pub max_leaf_items: usize,
    /// Nodes with any half-extent below this are not subdivided.
    pub min_half_extent: f64,
    /// Hard cap on recursion depth.
    pub max_depth: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            max_leaf_items: 3,
            min_half_extent: 2.5,
            max_depth: 16,
        }
    }
}

impl PartitionConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.min_half_extent.is_finite() || self.min_half_extent <= 0.0 {
            return Err(crate::SimError::invalid_config(format!(
                "partition min_half_extent must be positive, got {}",
                self.min_half_extent
            )));
        }
        Ok(())
    }
}
