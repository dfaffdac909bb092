//! Narrowphase driver: expands broadphase candidates into part collisions.

use slotmap::SlotMap;

use crate::{
    body::{Body, BodyKey, CollisionFilter},
    collision::{
        pair::PairKey,
        pairs::Pairs,
        sat, Collision, PartHandle, PartId,
    },
    geometry::bounds,
};

/// Whether two filters allow a collision.
///
/// A shared non-zero group decides alone: positive always collides, negative
/// never. Otherwise both category/mask tests must pass.
pub fn can_collide(a: &CollisionFilter, b: &CollisionFilter) -> bool {
    if a.group == b.group && a.group != 0 {
        return a.group > 0;
    }

    (a.mask & b.category) != 0 && (b.mask & a.category) != 0
}

/// Run SAT on every broadphase candidate, collecting collisions into `out`.
///
/// The pair cache supplies previous results so barely moving pairs can reuse
/// their separating axis.
pub(crate) fn collisions(
    out: &mut Vec<Collision>,
    broadphase_pairs: &[(BodyKey, BodyKey)],
    bodies: &SlotMap<BodyKey, Body>,
    pairs: &Pairs,
) {
    puffin::profile_function!();

    out.clear();

    for &(key_a, key_b) in broadphase_pairs {
        let (Some(body_a), Some(body_b)) = (bodies.get(key_a), bodies.get(key_b)) else {
            continue;
        };

        if (body_a.is_static() || body_a.is_sleeping())
            && (body_b.is_static() || body_b.is_sleeping())
        {
            continue;
        }
        if !can_collide(&body_a.collision_filter, &body_b.collision_filter) {
            continue;
        }

        // Mid phase on the whole-body bounds
        if !bounds::overlaps(&body_a.bounds(), &body_b.bounds()) {
            continue;
        }

        // Compound bodies collide per part, skipping their identity hull
        let start_a = if body_a.parts().len() > 1 { 1 } else { 0 };
        let start_b = if body_b.parts().len() > 1 { 1 } else { 0 };

        for index_a in start_a..body_a.parts().len() {
            let part_a = &body_a.parts()[index_a];

            for index_b in start_b..body_b.parts().len() {
                let part_b = &body_b.parts()[index_b];

                let whole_bodies = index_a == 0 && index_b == 0;
                if !whole_bodies && !bounds::overlaps(&part_a.bounds, &part_b.bounds) {
                    continue;
                }

                let handle_a = PartHandle {
                    body: key_a,
                    part: index_a,
                };
                let handle_b = PartHandle {
                    body: key_b,
                    part: index_b,
                };

                // Reuse the previous step's result when the pair is known
                let pair_key = PairKey::new(
                    PartId::new(body_a, index_a),
                    PartId::new(body_b, index_b),
                );
                let previous = pairs
                    .get(pair_key)
                    .filter(|pair| pair.is_active())
                    .map(|pair| pair.collision());

                if let Some(collision) = sat::collides(body_a, handle_a, body_b, handle_b, previous)
                {
                    out.push(collision);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test group overrides and category masking.
    #[test]
    fn test_can_collide() {
        let default = CollisionFilter::default();
        assert!(can_collide(&default, &default));

        let positive_group = CollisionFilter {
            group: 2,
            ..Default::default()
        };
        assert!(can_collide(&positive_group, &positive_group));

        let negative_group = CollisionFilter {
            group: -1,
            ..Default::default()
        };
        assert!(!can_collide(&negative_group, &negative_group));

        let category_a = CollisionFilter {
            category: 0b01,
            mask: 0b10,
            group: 0,
        };
        let category_b = CollisionFilter {
            category: 0b10,
            mask: 0b01,
            group: 0,
        };
        let category_c = CollisionFilter {
            category: 0b10,
            mask: 0b10,
            group: 0,
        };
        assert!(can_collide(&category_a, &category_b));
        assert!(!can_collide(&category_a, &category_c));
    }
}
