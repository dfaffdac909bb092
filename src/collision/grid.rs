//! Uniform spatial hash grid broadphase.
//!
//! Bodies occupy a rectangular region of cells derived from their bounds.
//! Each cell keeps the bodies inside it; a ledger counts for every body pair
//! how many cells they share so multi-cell pairs are emitted exactly once.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;
use vek::Aabr;

use crate::body::{Body, BodyKey};

/// Column/row span of grid cells covered by a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// First covered column.
    pub start_col: i32,
    /// Last covered column.
    pub end_col: i32,
    /// First covered row.
    pub start_row: i32,
    /// Last covered row.
    pub end_row: i32,
}

impl Region {
    /// Smallest region covering both regions.
    fn union(&self, other: &Region) -> Region {
        Region {
            start_col: self.start_col.min(other.start_col),
            end_col: self.end_col.max(other.end_col),
            start_row: self.start_row.min(other.start_row),
            end_row: self.end_row.max(other.end_row),
        }
    }

    /// Whether a cell lies inside the region.
    fn contains(&self, col: i32, row: i32) -> bool {
        col >= self.start_col && col <= self.end_col && row >= self.start_row && row <= self.end_row
    }
}

/// Candidate pair ledger entry: the two bodies and their shared cell count.
#[derive(Debug, Clone, Copy)]
struct PairEntry {
    a: BodyKey,
    b: BodyKey,
    overlap_count: u32,
}

/// Uniform grid of buckets emitting broadphase candidate pairs.
pub struct Grid {
    /// Cell width in world units.
    bucket_width: f64,
    /// Cell height in world units.
    bucket_height: f64,
    /// Bodies per occupied cell, created lazily.
    buckets: HashMap<(i32, i32), SmallVec<[BodyKey; 8]>>,
    /// Shared-cell counts per body pair, keyed by ordered body ids.
    ///
    /// Ordered so the candidate list rebuild is deterministic.
    pairs: BTreeMap<(u64, u64), PairEntry>,
    /// Current candidate pair list.
    pairs_list: Vec<(BodyKey, BodyKey)>,
}

impl Grid {
    /// Construct an empty grid with the given cell size.
    pub fn new(bucket_width: f64, bucket_height: f64) -> Self {
        Self {
            bucket_width,
            bucket_height,
            buckets: HashMap::new(),
            pairs: BTreeMap::new(),
            pairs_list: Vec::new(),
        }
    }

    /// Current broadphase candidate pairs.
    pub fn pairs_list(&self) -> &[(BodyKey, BodyKey)] {
        &self.pairs_list
    }

    /// Drop all buckets, pair counts and candidates.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.pairs.clear();
        self.pairs_list.clear();
    }

    /// Update bucket membership for every body that changed grid region.
    ///
    /// A forced update re-inserts everything, used after structural world
    /// changes cleared the grid.
    pub(crate) fn update(
        &mut self,
        bodies: &mut SlotMap<BodyKey, Body>,
        keys: &[BodyKey],
        world_bounds: &Aabr<f64>,
        forced: bool,
    ) {
        puffin::profile_function!();

        let mut grid_changed = false;

        for &key in keys {
            let Some(body) = bodies.get(key) else {
                continue;
            };

            if body.is_sleeping() && !forced {
                continue;
            }

            // Ignore bodies outside the world bounds
            let bounds = body.bounds();
            if bounds.max.x < world_bounds.min.x
                || bounds.min.x > world_bounds.max.x
                || bounds.max.y < world_bounds.min.y
                || bounds.min.y > world_bounds.max.y
            {
                continue;
            }

            let new_region = self.region_for(&bounds);
            let force_inserted = body.region.is_none() || forced;

            if !force_inserted && body.region == Some(new_region) {
                continue;
            }

            let old_region = if force_inserted {
                new_region
            } else {
                // Checked above
                body.region.unwrap_or(new_region)
            };
            let union = new_region.union(&old_region);

            // Walk the union of both regions and move the body between the
            // buckets that changed
            for col in union.start_col..=union.end_col {
                for row in union.start_row..=union.end_row {
                    let inside_new = new_region.contains(col, row);
                    let inside_old = old_region.contains(col, row);

                    if !inside_new && inside_old {
                        self.bucket_remove((col, row), key, bodies);
                    }
                    if force_inserted || (inside_new && !inside_old) {
                        self.bucket_add((col, row), key, bodies);
                    }
                }
            }

            if let Some(body) = bodies.get_mut(key) {
                body.region = Some(new_region);
            }
            grid_changed = true;
        }

        if grid_changed {
            self.rebuild_pairs_list();
        }
    }

    /// Region of cells covered by a bounds rectangle.
    fn region_for(&self, bounds: &Aabr<f64>) -> Region {
        Region {
            start_col: (bounds.min.x / self.bucket_width).floor() as i32,
            end_col: (bounds.max.x / self.bucket_width).floor() as i32,
            start_row: (bounds.min.y / self.bucket_height).floor() as i32,
            end_row: (bounds.max.y / self.bucket_height).floor() as i32,
        }
    }

    /// Add a body to a cell, counting new shared cells with its occupants.
    fn bucket_add(&mut self, cell: (i32, i32), key: BodyKey, bodies: &SlotMap<BodyKey, Body>) {
        let body = &bodies[key];
        let Self { buckets, pairs, .. } = self;
        let bucket = buckets.entry(cell).or_default();

        for &other_key in bucket.iter() {
            let Some(other) = bodies.get(other_key) else {
                continue;
            };
            if other.id() == body.id() || (other.is_static() && body.is_static()) {
                continue;
            }

            let pair_key = ordered_ids(body.id(), other.id());
            pairs
                .entry(pair_key)
                .and_modify(|entry| entry.overlap_count += 1)
                .or_insert(PairEntry {
                    a: key,
                    b: other_key,
                    overlap_count: 1,
                });
        }

        bucket.push(key);
    }

    /// Remove a body from a cell, releasing shared cells with its occupants.
    fn bucket_remove(&mut self, cell: (i32, i32), key: BodyKey, bodies: &SlotMap<BodyKey, Body>) {
        let Self { buckets, pairs, .. } = self;
        let Some(bucket) = buckets.get_mut(&cell) else {
            return;
        };
        let Some(position) = bucket.iter().position(|&other| other == key) else {
            return;
        };
        bucket.remove(position);

        let body_id = bodies[key].id();
        for &other_key in bucket.iter() {
            let Some(other) = bodies.get(other_key) else {
                continue;
            };
            if let Some(entry) = pairs.get_mut(&ordered_ids(body_id, other.id())) {
                entry.overlap_count = entry.overlap_count.saturating_sub(1);
            }
        }
    }

    /// Rebuild the candidate list, dropping pairs that share no cell anymore.
    fn rebuild_pairs_list(&mut self) {
        puffin::profile_scope!("Rebuild broadphase pairs");

        self.pairs_list.clear();
        let pairs_list = &mut self.pairs_list;
        self.pairs.retain(|_, entry| {
            if entry.overlap_count > 0 {
                pairs_list.push((entry.a, entry.b));
                true
            } else {
                false
            }
        });
    }
}

/// Order-independent pair key from two body ids.
fn ordered_ids(a: u64, b: u64) -> (u64, u64) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;
    use vek::Vec2;

    use crate::{
        body::{Body, BodyOptions},
        geometry::bounds,
    };

    use super::*;

    fn box_body(x: f64, y: f64, size: f64) -> Body {
        let half = size / 2.0;
        Body::from_vertices(
            Vec2::new(x, y),
            &[
                Vec2::new(-half, -half),
                Vec2::new(half, -half),
                Vec2::new(half, half),
                Vec2::new(-half, half),
            ],
            BodyOptions::default(),
        )
        .unwrap()
    }

    /// Test that neighbouring bodies become a candidate pair exactly once.
    #[test]
    fn test_multi_cell_pair_emitted_once() {
        let mut bodies: SlotMap<BodyKey, Body> = SlotMap::with_key();
        // Both bodies span several 48x48 cells and share most of them
        let a = bodies.insert(box_body(50.0, 50.0, 100.0));
        let b = bodies.insert(box_body(80.0, 50.0, 100.0));
        let keys = [a, b];

        let mut grid = Grid::new(48.0, 48.0);
        grid.update(&mut bodies, &keys, &bounds::infinite(), false);

        assert_eq!(grid.pairs_list().len(), 1);
    }

    /// Test that distant bodies produce no candidates.
    #[test]
    fn test_distant_bodies_no_pair() {
        let mut bodies: SlotMap<BodyKey, Body> = SlotMap::with_key();
        let a = bodies.insert(box_body(0.0, 0.0, 10.0));
        let b = bodies.insert(box_body(1000.0, 1000.0, 10.0));
        let keys = [a, b];

        let mut grid = Grid::new(48.0, 48.0);
        grid.update(&mut bodies, &keys, &bounds::infinite(), false);

        assert!(grid.pairs_list().is_empty());
    }

    /// Test that static pairs are never candidates.
    #[test]
    fn test_static_static_skipped() {
        let mut bodies: SlotMap<BodyKey, Body> = SlotMap::with_key();
        let mut body_a = box_body(0.0, 0.0, 10.0);
        body_a.set_static(true);
        let mut body_b = box_body(5.0, 0.0, 10.0);
        body_b.set_static(true);
        let a = bodies.insert(body_a);
        let b = bodies.insert(body_b);
        let keys = [a, b];

        let mut grid = Grid::new(48.0, 48.0);
        grid.update(&mut bodies, &keys, &bounds::infinite(), false);

        assert!(grid.pairs_list().is_empty());
    }

    /// Test that a body moving away dissolves the pair.
    #[test]
    fn test_pair_dissolves_after_move() {
        let mut bodies: SlotMap<BodyKey, Body> = SlotMap::with_key();
        let a = bodies.insert(box_body(0.0, 0.0, 10.0));
        let b = bodies.insert(box_body(12.0, 0.0, 10.0));
        let keys = [a, b];

        let mut grid = Grid::new(48.0, 48.0);
        grid.update(&mut bodies, &keys, &bounds::infinite(), false);
        assert_eq!(grid.pairs_list().len(), 1);

        bodies[b].set_position(Vec2::new(500.0, 500.0));
        grid.update(&mut bodies, &keys, &bounds::infinite(), false);
        assert!(grid.pairs_list().is_empty());
    }

    /// Test that bodies outside the world bounds are ignored.
    #[test]
    fn test_out_of_world_ignored() {
        let mut bodies: SlotMap<BodyKey, Body> = SlotMap::with_key();
        let a = bodies.insert(box_body(0.0, 0.0, 10.0));
        let b = bodies.insert(box_body(5.0, 0.0, 10.0));
        let keys = [a, b];

        let world = Aabr {
            min: Vec2::new(100.0, 100.0),
            max: Vec2::new(200.0, 200.0),
        };
        let mut grid = Grid::new(48.0, 48.0);
        grid.update(&mut bodies, &keys, &world, false);

        assert!(grid.pairs_list().is_empty());
    }
}
