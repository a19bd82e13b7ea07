//! Turning raw contact records into gameplay facts.
//!
//! Normals here are always expressed from one party's point of view: a normal
//! "from me" points from my fixture toward the other party.

use glam::Vec2;

use crate::object::ObjectId;
use crate::physics::{ContactRecord, FixtureTag};

/// Normals shorter than this on both axes carry no usable direction.
pub const AMBIGUOUS_EPSILON: f32 = 1e-4;
/// Largest horizontal normal component still counted as a straight vertical hit.
pub const VERTICAL_TOLERANCE: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Touch {
    /// The other party is on top of me.
    Stomped,
    /// I am on top of the other party.
    Landed,
    /// Horizontal contact. `sign` points from me toward the other party, so
    /// the push-back direction for me is `-sign`.
    SideTouch { sign: i8 },
}

/// Classify a contact normal expressed from my side.
///
/// Vertical only when `|y|` strictly dominates; the 45° tie is a side touch.
pub fn classify(normal_from_me: Vec2) -> Option<Touch> {
    let n = normal_from_me;
    if !n.is_finite() || (n.x.abs() < AMBIGUOUS_EPSILON && n.y.abs() < AMBIGUOUS_EPSILON) {
        return None;
    }
    if n.y.abs() > n.x.abs() {
        if n.y > 0.0 {
            Some(Touch::Stomped)
        } else {
            Some(Touch::Landed)
        }
    } else if n.x > 0.0 {
        Some(Touch::SideTouch { sign: 1 })
    } else {
        Some(Touch::SideTouch { sign: -1 })
    }
}

/// True when a block was struck squarely from underneath.
pub fn hit_from_below(normal_from_block: Vec2) -> bool {
    normal_from_block.x.abs() <= VERTICAL_TOLERANCE && normal_from_block.y < -AMBIGUOUS_EPSILON
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactPhase {
    Begin,
    End,
    PreSolve,
}

/// One contact as seen by one of its parties.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub phase: ContactPhase,
    pub mine: FixtureTag,
    pub other: FixtureTag,
    /// From my fixture toward the other party. Only present on pre-solve.
    pub normal: Option<Vec2>,
    pub sensor: bool,
    /// Whether the gate let the physical response happen this step.
    pub enabled: bool,
    /// Physics step that produced the contact.
    pub step: u64,
}

impl Contact {
    pub fn other_owner(&self) -> ObjectId {
        self.other.owner
    }

    pub fn touch(&self) -> Option<Touch> {
        self.normal.and_then(classify)
    }

    pub fn is_begin(&self) -> bool {
        self.phase == ContactPhase::Begin
    }

    pub fn is_end(&self) -> bool {
        self.phase == ContactPhase::End
    }

    pub fn is_presolve(&self) -> bool {
        self.phase == ContactPhase::PreSolve
    }

    pub fn at_step(mut self, step: u64) -> Self {
        self.step = step;
        self
    }
}

/// Split a record into the view of `a` and the view of `b`.
pub fn perspectives(record: &ContactRecord, step: u64) -> [Contact; 2] {
    let (phase, a, b, normal, sensor, enabled) = match *record {
        ContactRecord::Begin { a, b, sensor } => (ContactPhase::Begin, a, b, None, sensor, true),
        ContactRecord::End { a, b, sensor } => (ContactPhase::End, a, b, None, sensor, true),
        ContactRecord::PreSolve {
            a,
            b,
            normal,
            enabled,
        } => (ContactPhase::PreSolve, a, b, Some(normal), false, enabled),
    };
    [
        Contact {
            phase,
            mine: a,
            other: b,
            normal,
            sensor,
            enabled,
            step,
        },
        Contact {
            phase,
            mine: b,
            other: a,
            normal: normal.map(|n| -n),
            sensor,
            enabled,
            step,
        },
    ]
}

/// Single-slot outbox written during contact dispatch and drained in `update`.
///
/// `set` overwrites, `offer` only fills an empty slot, so writers can express
/// priority by choosing which to call.
#[derive(Debug, Clone, PartialEq)]
pub struct OneShot<T> {
    slot: Option<T>,
}

impl<T> Default for OneShot<T> {
    fn default() -> Self {
        Self { slot: None }
    }
}

impl<T> OneShot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, value: T) {
        self.slot = Some(value);
    }

    /// Returns false when the slot already held something.
    pub fn offer(&mut self, value: T) -> bool {
        if self.slot.is_some() {
            return false;
        }
        self.slot = Some(value);
        true
    }

    pub fn take(&mut self) -> Option<T> {
        self.slot.take()
    }

    pub fn peek(&self) -> Option<&T> {
        self.slot.as_ref()
    }

    pub fn is_set(&self) -> bool {
        self.slot.is_some()
    }
}

/// Remembers which parties already produced an event during their current
/// contact, so a pair re-solved every step still fires once.
///
/// A contact counts as new when the party was not seen on the previous step
/// or its end event was observed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactLatch {
    seen: Vec<(ObjectId, u64)>,
}

impl ContactLatch {
    /// Record that `other` is touching at `step`; true when this starts a new contact.
    pub fn engage(&mut self, other: ObjectId, step: u64) -> bool {
        self.seen.retain(|(_, last)| last + 1 >= step);
        match self.seen.iter_mut().find(|(id, _)| *id == other) {
            Some(entry) => {
                entry.1 = step;
                false
            },
            None => {
                self.seen.push((other, step));
                true
            },
        }
    }

    /// Keep `other` latched without firing (contact seen but not acted on).
    pub fn touch(&mut self, other: ObjectId, step: u64) {
        self.engage(other, step);
    }

    pub fn release(&mut self, other: ObjectId) {
        self.seen.retain(|(id, _)| *id != other);
    }

    pub fn is_engaged(&self, other: ObjectId) -> bool {
        self.seen.iter().any(|(id, _)| *id == other)
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

/// Multiset of ground objects a probe sensor currently overlaps.
///
/// A probe can start "seeded" with a placeholder so that an entity spawned
/// resting on the ground does not react before the first begin event arrives;
/// the placeholder is dropped as soon as a real contact begins, or by the
/// owner through [`ContactProbe::drop_placeholder`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactProbe {
    placeholder: bool,
    touching: Vec<ObjectId>,
}

impl ContactProbe {
    pub fn seeded() -> Self {
        Self {
            placeholder: true,
            touching: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, other: ObjectId) {
        self.placeholder = false;
        self.touching.push(other);
    }

    pub fn end(&mut self, other: ObjectId) {
        if let Some(pos) = self.touching.iter().position(|id| *id == other) {
            self.touching.swap_remove(pos);
        }
    }

    /// Forget a party entirely (e.g. it was removed from the world).
    pub fn forget(&mut self, other: ObjectId) {
        self.touching.retain(|id| *id != other);
    }

    pub fn is_touching(&self) -> bool {
        self.placeholder || !self.touching.is_empty()
    }

    pub fn count(&self) -> usize {
        self.touching.len() + usize::from(self.placeholder)
    }

    pub fn has_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Stop assuming ground that was never reported.
    pub fn drop_placeholder(&mut self) {
        self.placeholder = false;
    }

    pub fn clear(&mut self) {
        self.placeholder = false;
        self.touching.clear();
    }
}

/// New facing for a ledge-aware walker. Turns only when the probe in front has
/// lost the ground while the probe behind still has it.
pub fn patrol_direction(facing: f32, left: &ContactProbe, right: &ContactProbe) -> f32 {
    let (ahead, behind) = if facing >= 0.0 {
        (right, left)
    } else {
        (left, right)
    };
    if !ahead.is_touching() && behind.is_touching() {
        -facing
    } else {
        facing
    }
}
