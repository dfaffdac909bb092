//! Velocity sequential impulses: contact restitution and Coulomb friction.
//!
//! Impulses are applied by shifting `position_prev`/`angle_prev`, which
//! changes the implied velocity without moving the body this step.

use arrayvec::ArrayVec;
use slotmap::SlotMap;
use vek::Vec2;

use crate::{
    body::{Body, BodyKey},
    collision::{pairs::Pairs, SupportVertex},
    math,
};

/// Squared normal velocity above which a contact counts as a fresh impact.
const RESTING_THRESH: f64 = 4.0;

/// Squared tangent velocity above which friction stops accumulating.
const RESTING_THRESH_TANGENT: f64 = 6.0;

/// Scale from separation to the normal force used in the friction limit.
const FRICTION_NORMAL_MULTIPLIER: f64 = 5.0;

/// World position of a contact vertex, read live from its owning body.
fn support_point(
    body_a: &Body,
    body_b: &Body,
    parent_a: BodyKey,
    support: &SupportVertex,
) -> Vec2<f64> {
    let owner = if support.part.body == parent_a {
        body_a
    } else {
        body_b
    };

    owner.parts()[support.part.part].vertices[support.vertex as usize].point
}

/// Warm start: re-apply the impulses cached on every active contact.
pub(crate) fn pre_solve(pairs: &Pairs, bodies: &mut SlotMap<BodyKey, Body>) {
    puffin::profile_function!();

    for key in pairs.list.iter() {
        let Some(pair) = pairs.table.get(key) else {
            continue;
        };
        if !pair.is_active || pair.is_sensor {
            continue;
        }

        let normal = pair.collision.normal;
        let tangent = pair.collision.tangent;
        let parent_a = pair.collision.parent_a;

        let Some([body_a, body_b]) =
            bodies.get_disjoint_mut([pair.collision.parent_a, pair.collision.parent_b])
        else {
            continue;
        };

        for &index in pair.active_contacts.iter() {
            let contact = &pair.contacts[index];
            if contact.normal_impulse == 0.0 && contact.tangent_impulse == 0.0 {
                continue;
            }

            let impulse = normal * contact.normal_impulse + tangent * contact.tangent_impulse;
            let vertex = support_point(body_a, body_b, parent_a, &contact.support);

            if !(body_a.is_static || body_a.is_sleeping) {
                let offset = vertex - body_a.position;
                body_a.position_prev += impulse * body_a.inverse_mass;
                body_a.angle_prev += math::cross(offset, impulse) * body_a.inverse_inertia;
            }
            if !(body_b.is_static || body_b.is_sleeping) {
                let offset = vertex - body_b.position;
                body_b.position_prev -= impulse * body_b.inverse_mass;
                body_b.angle_prev -= math::cross(offset, impulse) * body_b.inverse_inertia;
            }
        }
    }
}

/// One iteration of normal and friction impulses over all active pairs.
pub(crate) fn solve(pairs: &mut Pairs, bodies: &mut SlotMap<BodyKey, Body>, time_scale: f64) {
    puffin::profile_function!();

    let time_scale_squared = time_scale * time_scale;

    for list_index in 0..pairs.list.len() {
        let key = pairs.list[list_index];
        let Some(pair) = pairs.table.get_mut(&key) else {
            continue;
        };
        if !pair.is_active || pair.is_sensor || pair.active_contacts.is_empty() {
            continue;
        }

        let normal = pair.collision.normal;
        let tangent = pair.collision.tangent;
        let restitution = pair.restitution;
        let friction = pair.friction;
        let friction_static = pair.friction_static;
        let separation = pair.separation;
        let parent_a = pair.collision.parent_a;
        let contact_share = 1.0 / pair.active_contacts.len() as f64;
        let active: ArrayVec<usize, 2> = pair.active_contacts.clone();

        let Some([body_a, body_b]) =
            bodies.get_disjoint_mut([pair.collision.parent_a, pair.collision.parent_b])
        else {
            continue;
        };

        // Refresh the implied velocities, the impulses below shift them
        body_a.velocity = body_a.position - body_a.position_prev;
        body_a.angular_velocity = body_a.angle - body_a.angle_prev;
        body_b.velocity = body_b.position - body_b.position_prev;
        body_b.angular_velocity = body_b.angle - body_b.angle_prev;

        for index in active {
            let vertex = support_point(body_a, body_b, parent_a, &pair.contacts[index].support);
            let contact = &mut pair.contacts[index];

            let offset_a = vertex - body_a.position;
            let offset_b = vertex - body_b.position;
            let velocity_point_a =
                body_a.velocity + math::perp(offset_a) * body_a.angular_velocity;
            let velocity_point_b =
                body_b.velocity + math::perp(offset_b) * body_b.angular_velocity;

            let relative_velocity = velocity_point_a - velocity_point_b;
            let normal_velocity = normal.dot(relative_velocity);
            let tangent_velocity = tangent.dot(relative_velocity);
            let tangent_speed = tangent_velocity.abs();
            let tangent_direction = if tangent_velocity < 0.0 { -1.0 } else { 1.0 };

            let mut normal_impulse = (1.0 + restitution) * normal_velocity;
            let normal_force =
                (separation + normal_velocity).clamp(0.0, 1.0) * FRICTION_NORMAL_MULTIPLIER;

            // Coulomb friction: clamp against the static cone, otherwise the
            // tangent impulse follows the tangent velocity
            let mut tangent_impulse = tangent_velocity;
            let mut max_friction = f64::INFINITY;
            if tangent_speed > friction * friction_static * normal_force * time_scale_squared {
                max_friction = tangent_speed;
                tangent_impulse = (friction * tangent_direction * time_scale_squared)
                    .clamp(-max_friction, max_friction);
            }

            // Scale by the effective mass seen at the contact offsets
            let cross_a = math::cross(offset_a, normal);
            let cross_b = math::cross(offset_b, normal);
            let effective_mass = body_a.inverse_mass
                + body_b.inverse_mass
                + body_a.inverse_inertia * cross_a * cross_a
                + body_b.inverse_inertia * cross_b * cross_b;

            // Nothing on either side can absorb the impulse
            if effective_mass <= 0.0 {
                continue;
            }

            let share = contact_share / effective_mass;
            normal_impulse *= share;
            tangent_impulse *= share;

            if normal_velocity < 0.0
                && normal_velocity * normal_velocity > RESTING_THRESH * time_scale_squared
            {
                // Fresh impact, drop the accumulated resting impulse
                contact.normal_impulse = 0.0;
            } else {
                // Catto: accumulate and clamp so the total never separates
                let existing = contact.normal_impulse;
                contact.normal_impulse = (existing + normal_impulse).min(0.0);
                normal_impulse = contact.normal_impulse - existing;
            }

            if tangent_velocity * tangent_velocity > RESTING_THRESH_TANGENT * time_scale_squared {
                contact.tangent_impulse = 0.0;
            } else {
                let existing = contact.tangent_impulse;
                contact.tangent_impulse =
                    (existing + tangent_impulse).clamp(-max_friction, max_friction);
                tangent_impulse = contact.tangent_impulse - existing;
            }

            let impulse = normal * normal_impulse + tangent * tangent_impulse;

            if !(body_a.is_static || body_a.is_sleeping) {
                body_a.position_prev += impulse * body_a.inverse_mass;
                body_a.angle_prev += math::cross(offset_a, impulse) * body_a.inverse_inertia;
            }
            if !(body_b.is_static || body_b.is_sleeping) {
                body_b.position_prev -= impulse * body_b.inverse_mass;
                body_b.angle_prev -= math::cross(offset_b, impulse) * body_b.inverse_inertia;
            }
        }
    }
}
