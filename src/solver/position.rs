//! Positional sequential impulses: push overlapping pairs apart.

use slotmap::SlotMap;

use crate::{
    body::{Body, BodyKey},
    collision::pairs::Pairs,
    geometry::{bounds, vertices},
};

/// Share of the remaining penetration corrected per iteration.
const POSITION_DAMPEN: f64 = 0.9;

/// Fraction of the positional impulse carried into the next step.
const POSITION_WARMING: f64 = 0.8;

/// Count this step's contacts per body.
///
/// The per-body contact totals spread the correction of bodies resting on
/// several contacts.
pub(crate) fn pre_solve(pairs: &Pairs, bodies: &mut SlotMap<BodyKey, Body>) {
    for key in pairs.list.iter() {
        let Some(pair) = pairs.table.get(key) else {
            continue;
        };
        if !pair.is_active {
            continue;
        }

        let active = pair.active_contacts.len() as u32;
        if let Some(body) = bodies.get_mut(pair.collision.parent_a) {
            body.total_contacts += active;
        }
        if let Some(body) = bodies.get_mut(pair.collision.parent_b) {
            body.total_contacts += active;
        }
    }
}

/// One iteration of positional corrections over all active pairs.
pub(crate) fn solve(pairs: &mut Pairs, bodies: &mut SlotMap<BodyKey, Body>, time_scale: f64) {
    puffin::profile_function!();

    // Current separation of every pair, as left by the impulses so far
    for key in pairs.list.iter() {
        let Some(pair) = pairs.table.get_mut(key) else {
            continue;
        };
        if !pair.is_active || pair.is_sensor {
            continue;
        }

        let (Some(body_a), Some(body_b)) = (
            bodies.get(pair.collision.parent_a),
            bodies.get(pair.collision.parent_b),
        ) else {
            continue;
        };

        let body_b_to_a =
            body_b.position_impulse - body_a.position_impulse + pair.collision.penetration;
        pair.separation = pair.collision.normal.dot(body_b_to_a);
    }

    for key in pairs.list.iter() {
        let Some(pair) = pairs.table.get(key) else {
            continue;
        };
        if !pair.is_active || pair.is_sensor {
            continue;
        }

        let Some([body_a, body_b]) =
            bodies.get_disjoint_mut([pair.collision.parent_a, pair.collision.parent_b])
        else {
            continue;
        };

        let mut position_impulse = (pair.separation - pair.slop) * time_scale;

        // An immovable side doubles the correction of the other
        if body_a.is_static || body_b.is_static {
            position_impulse *= 2.0;
        }

        if !(body_a.is_static || body_a.is_sleeping) {
            let contact_share = POSITION_DAMPEN / body_a.total_contacts as f64;
            body_a.position_impulse += pair.collision.normal * position_impulse * contact_share;
        }

        if !(body_b.is_static || body_b.is_sleeping) {
            let contact_share = POSITION_DAMPEN / body_b.total_contacts as f64;
            body_b.position_impulse -= pair.collision.normal * position_impulse * contact_share;
        }
    }
}

/// Apply the accumulated positional impulses to the body geometry.
///
/// Moves `position_prev` along so the correction adds no velocity, then
/// either warms the impulse for the next step or snaps it to zero when it
/// opposes the body's motion.
pub(crate) fn post_solve(bodies: &mut SlotMap<BodyKey, Body>, keys: &[BodyKey]) {
    puffin::profile_function!();

    for &key in keys {
        let Some(body) = bodies.get_mut(key) else {
            continue;
        };

        body.total_contacts = 0;

        let impulse = body.position_impulse;
        if impulse.x == 0.0 && impulse.y == 0.0 {
            continue;
        }

        let velocity = body.velocity;
        for part in body.parts.iter_mut() {
            vertices::translate(&mut part.vertices, impulse);
            part.position += impulse;
            bounds::update(&mut part.bounds, &part.vertices, velocity);
        }
        body.position += impulse;
        body.position_prev += impulse;

        if impulse.dot(velocity) < 0.0 {
            // Fighting the velocity means the contact is resolving, rest it
            body.position_impulse = vek::Vec2::zero();
        } else {
            body.position_impulse *= POSITION_WARMING;
        }
    }
}
