//! Per-body buffer of pending contact corrections.
//!
//! Contact resolution never writes a body's pose or velocity directly. It
//! pushes deltas here, and at the end of the sub-step each kind is averaged
//! and applied once. A body touched by N contacts therefore moves by the
//! mean of the N proposals, and the order contacts were found in does not
//! matter.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What a queued delta modifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DeltaKind {
    /// Position offset (m).
    Position,
    /// Linear velocity change (m/s).
    Velocity,
    /// Angular velocity change (rad/s).
    AngularVelocity,
}

/// One queued correction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Delta {
    /// What the delta modifies.
    pub kind: DeltaKind,
    /// The correction itself.
    pub value: Vector3<f64>,
}

/// Per-kind mean of the queued deltas. Kinds with no entries are zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AveragedDeltas {
    /// Mean position offset.
    pub position: Vector3<f64>,
    /// Mean linear velocity change.
    pub velocity: Vector3<f64>,
    /// Mean angular velocity change.
    pub angular_velocity: Vector3<f64>,
}

/// Ordered list of pending deltas.
///
/// # Example
///
/// ```
/// use boxsim_core::{Accumulator, DeltaKind};
/// use nalgebra::Vector3;
///
/// let mut acc = Accumulator::new();
/// acc.push(DeltaKind::Position, Vector3::new(2.0, 0.0, 0.0));
/// acc.push(DeltaKind::Position, Vector3::new(0.0, 4.0, 0.0));
///
/// let mean = acc.drain_average();
/// assert_eq!(mean.position, Vector3::new(1.0, 2.0, 0.0));
/// assert!(acc.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Accumulator {
    entries: Vec<Delta>,
}

impl Accumulator {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a delta.
    pub fn push(&mut self, kind: DeltaKind, value: Vector3<f64>) {
        self.entries.push(Delta { kind, value });
    }

    /// Queued deltas in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[Delta] {
        &self.entries
    }

    /// Number of queued deltas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Per-kind mean of the queued deltas.
    #[must_use]
    pub fn average(&self) -> AveragedDeltas {
        let mut sums = [Vector3::zeros(); 3];
        let mut counts = [0_u32; 3];
        for delta in &self.entries {
            let slot = match delta.kind {
                DeltaKind::Position => 0,
                DeltaKind::Velocity => 1,
                DeltaKind::AngularVelocity => 2,
            };
            sums[slot] += delta.value;
            counts[slot] += 1;
        }

        let mean = |slot: usize| {
            if counts[slot] == 0 {
                Vector3::zeros()
            } else {
                sums[slot] / f64::from(counts[slot])
            }
        };

        AveragedDeltas {
            position: mean(0),
            velocity: mean(1),
            angular_velocity: mean(2),
        }
    }

    /// Average and clear.
    pub fn drain_average(&mut self) -> AveragedDeltas {
        let averaged = self.average();
        self.clear();
        averaged
    }

    /// Drop every queued delta.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
