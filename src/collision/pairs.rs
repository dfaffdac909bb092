//! Pair cache: persistent collision pairs with start/active/end bookkeeping.

use hashbrown::HashMap;
use slotmap::SlotMap;

use crate::{
    body::{Body, BodyKey},
    collision::{
        pair::{Pair, PairKey},
        Collision, PartId,
    },
};

/// Simulation milliseconds an untouched pair survives before eviction.
const PAIR_MAX_IDLE_LIFE: f64 = 1000.0;

/// Cache of collision pairs persisted across steps.
///
/// The table owns the pairs; the list fixes a deterministic iteration order
/// (insertion order) for the solvers.
pub struct Pairs {
    pub(crate) table: HashMap<PairKey, Pair>,
    pub(crate) list: Vec<PairKey>,
    collision_start: Vec<PairKey>,
    collision_active: Vec<PairKey>,
    collision_end: Vec<PairKey>,
}

impl Pairs {
    /// Construct an empty cache.
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
            list: Vec::new(),
            collision_start: Vec::new(),
            collision_active: Vec::new(),
            collision_end: Vec::new(),
        }
    }

    /// Pairs that started colliding this step.
    pub fn collision_start(&self) -> &[PairKey] {
        &self.collision_start
    }

    /// Pairs still colliding this step.
    pub fn collision_active(&self) -> &[PairKey] {
        &self.collision_active
    }

    /// Pairs that stopped colliding this step.
    pub fn collision_end(&self) -> &[PairKey] {
        &self.collision_end
    }

    /// Look up a pair by key.
    pub fn get(&self, key: PairKey) -> Option<&Pair> {
        self.table.get(&key)
    }

    /// All pairs currently cached, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Pair> {
        self.list.iter().filter_map(|key| self.table.get(key))
    }

    /// Number of cached pairs.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Drop every pair and event set.
    pub fn clear(&mut self) {
        self.table.clear();
        self.list.clear();
        self.collision_start.clear();
        self.collision_active.clear();
        self.collision_end.clear();
    }

    /// Fold this step's collisions into the cache.
    ///
    /// Existing pairs are refreshed (promoting inactive ones back to start),
    /// unknown collisions create pairs, and pairs that were not confirmed
    /// this step are deactivated into the end set.
    pub(crate) fn update(
        &mut self,
        collisions: impl Iterator<Item = Collision>,
        bodies: &SlotMap<BodyKey, Body>,
        timestamp: f64,
    ) {
        puffin::profile_function!();

        self.collision_start.clear();
        self.collision_active.clear();
        self.collision_end.clear();

        for key in self.list.iter() {
            if let Some(pair) = self.table.get_mut(key) {
                pair.confirmed_active = false;
            }
        }

        for collision in collisions {
            let parent_a = &bodies[collision.parent_a];
            let parent_b = &bodies[collision.parent_b];
            let key = PairKey::new(
                PartId::new(parent_a, collision.part_a.part),
                PartId::new(parent_b, collision.part_b.part),
            );

            match self.table.get_mut(&key) {
                Some(pair) => {
                    if pair.is_active {
                        self.collision_active.push(key);
                    } else {
                        self.collision_start.push(key);
                    }

                    pair.update(collision, bodies, timestamp);
                    pair.confirmed_active = true;
                }
                None => {
                    let mut pair = Pair::new(collision, bodies, timestamp);
                    pair.confirmed_active = true;
                    self.table.insert(key, pair);
                    self.list.push(key);
                    self.collision_start.push(key);
                }
            }
        }

        // Anything active that was not confirmed this step has separated
        for key in self.list.iter() {
            let Some(pair) = self.table.get_mut(key) else {
                continue;
            };
            if pair.is_active && !pair.confirmed_active {
                pair.set_active(false, timestamp);
                self.collision_end.push(*key);
            }
        }
    }

    /// Evict pairs that have been idle for too long.
    ///
    /// Pairs involving a sleeping body are refreshed instead so they keep
    /// their warm-start impulses through the sleep.
    pub(crate) fn remove_old(&mut self, bodies: &SlotMap<BodyKey, Body>, timestamp: f64) {
        let table = &mut self.table;
        let mut removed = 0_usize;

        self.list.retain(|key| {
            let Some(pair) = table.get_mut(key) else {
                return false;
            };

            let parents = (
                bodies.get(pair.collision.parent_a),
                bodies.get(pair.collision.parent_b),
            );
            let keep = match parents {
                // A removed body invalidates the pair immediately
                (None, _) | (_, None) => false,
                (Some(parent_a), Some(parent_b)) => {
                    if parent_a.is_sleeping() || parent_b.is_sleeping() {
                        pair.time_updated = timestamp;
                        true
                    } else {
                        timestamp - pair.time_updated <= PAIR_MAX_IDLE_LIFE
                    }
                }
            };

            if !keep {
                table.remove(key);
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            log::trace!("evicted {removed} idle collision pairs");
        }
    }
}

impl Default for Pairs {
    fn default() -> Self {
        Self::new()
    }
}
