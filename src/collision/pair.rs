//! Persistent pair of colliding parts with warm-started contacts.

use arrayvec::ArrayVec;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::{
    body::{Body, BodyKey},
    collision::{Collision, PartId, SupportVertex},
};

/// Stable identity of a contact: the owning part and the vertex ring index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContactId {
    /// Part the contact vertex belongs to.
    pub part: PartId,
    /// Vertex index in the ring.
    pub vertex: u32,
}

/// Order-independent key of a pair of parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey {
    /// Lower part id.
    pub a: PartId,
    /// Higher part id.
    pub b: PartId,
}

impl PairKey {
    /// Canonical key for two parts, independent of argument order.
    pub fn new(a: PartId, b: PartId) -> Self {
        if a <= b {
            Self { a, b }
        } else {
            Self { a: b, b: a }
        }
    }
}

/// Contact point carrying impulses accumulated across steps.
#[derive(Debug, Clone, Copy)]
pub struct Contact {
    /// Stable identity used to match the contact across steps.
    pub id: ContactId,
    /// Live reference to the contact vertex.
    pub support: SupportVertex,
    /// Accumulated impulse along the collision normal.
    pub normal_impulse: f64,
    /// Accumulated impulse along the tangent.
    pub tangent_impulse: f64,
}

/// Persistent record of two parts in (potential) contact.
///
/// Survives across steps so contact impulses can warm start the solver.
#[derive(Debug, Clone)]
pub struct Pair {
    pub(crate) key: PairKey,
    pub(crate) collision: Collision,
    /// Every contact ever seen on this pair, append-only.
    pub(crate) contacts: SmallVec<[Contact; 4]>,
    /// Indices into `contacts` for this step's supports.
    pub(crate) active_contacts: ArrayVec<usize, 2>,
    pub(crate) separation: f64,
    pub(crate) inverse_mass: f64,
    pub(crate) friction: f64,
    pub(crate) friction_static: f64,
    pub(crate) restitution: f64,
    pub(crate) slop: f64,
    pub(crate) is_active: bool,
    pub(crate) confirmed_active: bool,
    pub(crate) is_sensor: bool,
    pub(crate) time_created: f64,
    pub(crate) time_updated: f64,
}

impl Pair {
    /// Create a pair from its first collision.
    pub(crate) fn new(
        collision: Collision,
        bodies: &SlotMap<BodyKey, Body>,
        timestamp: f64,
    ) -> Self {
        let parent_a = &bodies[collision.parent_a];
        let parent_b = &bodies[collision.parent_b];
        let key = PairKey::new(
            PartId::new(parent_a, collision.part_a.part),
            PartId::new(parent_b, collision.part_b.part),
        );

        let mut pair = Self {
            key,
            collision: collision.clone(),
            contacts: SmallVec::new(),
            active_contacts: ArrayVec::new(),
            separation: 0.0,
            inverse_mass: 0.0,
            friction: 0.0,
            friction_static: 0.0,
            restitution: 0.0,
            slop: 0.0,
            is_active: false,
            confirmed_active: false,
            is_sensor: parent_a.is_sensor() || parent_b.is_sensor(),
            time_created: timestamp,
            time_updated: timestamp,
        };
        pair.update(collision, bodies, timestamp);

        pair
    }

    /// Refresh the pair from this step's collision.
    ///
    /// Supports are matched to existing contacts by id so their accumulated
    /// impulses carry over.
    pub(crate) fn update(
        &mut self,
        collision: Collision,
        bodies: &SlotMap<BodyKey, Body>,
        timestamp: f64,
    ) {
        let parent_a = &bodies[collision.parent_a];
        let parent_b = &bodies[collision.parent_b];

        self.inverse_mass = parent_a.inverse_mass() + parent_b.inverse_mass();
        self.friction = parent_a.friction.min(parent_b.friction);
        self.friction_static = parent_a.friction_static.max(parent_b.friction_static);
        self.restitution = parent_a.restitution.max(parent_b.restitution);
        self.slop = parent_a.slop.max(parent_b.slop);

        self.active_contacts.clear();
        for support in collision.supports.iter() {
            let owner = &bodies[support.part.body];
            let id = ContactId {
                part: PartId::new(owner, support.part.part),
                vertex: support.vertex,
            };

            let index = match self.contacts.iter().position(|contact| contact.id == id) {
                Some(index) => index,
                None => {
                    self.contacts.push(Contact {
                        id,
                        support: *support,
                        normal_impulse: 0.0,
                        tangent_impulse: 0.0,
                    });
                    self.contacts.len() - 1
                }
            };
            self.active_contacts.push(index);
        }

        self.separation = collision.depth;
        self.collision = collision;
        self.set_active(true, timestamp);
    }

    /// Activate or deactivate the pair, timestamping the change.
    pub(crate) fn set_active(&mut self, is_active: bool, timestamp: f64) {
        self.is_active = is_active;
        self.time_updated = timestamp;

        if !is_active {
            self.active_contacts.clear();
        }
    }

    /// Canonical key of the pair.
    pub fn key(&self) -> PairKey {
        self.key
    }

    /// The collision recorded at the last update.
    pub fn collision(&self) -> &Collision {
        &self.collision
    }

    /// Combined inverse mass of the parent bodies.
    pub fn inverse_mass(&self) -> f64 {
        self.inverse_mass
    }

    /// Combined material properties used for resolution.
    pub fn friction(&self) -> f64 {
        self.friction
    }

    /// Restitution used for resolution, the higher of the two bodies.
    pub fn restitution(&self) -> f64 {
        self.restitution
    }

    /// Whether the parts were overlapping at the last update.
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Whether either body is a sensor.
    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    /// Contacts active in the current step.
    pub fn active_contacts(&self) -> impl Iterator<Item = &Contact> {
        self.active_contacts
            .iter()
            .map(|&index| &self.contacts[index])
    }

    /// Simulation time of creation in milliseconds.
    pub fn time_created(&self) -> f64 {
        self.time_created
    }

    /// Simulation time of the last update in milliseconds.
    pub fn time_updated(&self) -> f64 {
        self.time_updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that pair keys ignore the argument order.
    #[test]
    fn test_pair_key_order_independent() {
        let first = PartId { body: 3, part: 0 };
        let second = PartId { body: 7, part: 1 };

        assert_eq!(PairKey::new(first, second), PairKey::new(second, first));
        assert_eq!(PairKey::new(first, second).a, first);
    }
}
