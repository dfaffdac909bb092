//! Sleeping controller: parks bodies whose filtered motion stays low.

use slotmap::SlotMap;

use crate::{
    body::{Body, BodyKey},
    collision::pairs::Pairs,
};

/// Filtered motion below which the sleep counter starts climbing.
const MOTION_SLEEP_THRESHOLD: f64 = 0.08;

/// Neighbour motion above which a sleeping body is woken on contact.
const MOTION_WAKE_THRESHOLD: f64 = 0.18;

/// Bias of the motion filter toward the lower of old and new motion.
const MIN_BIAS: f64 = 0.9;

/// Update the filtered motion of every body and toggle sleep states.
pub(crate) fn update(bodies: &mut SlotMap<BodyKey, Body>, keys: &[BodyKey], time_scale: f64) {
    let time_factor = time_scale * time_scale * time_scale;

    for &key in keys {
        let Some(body) = bodies.get_mut(key) else {
            continue;
        };
        if body.is_static() {
            continue;
        }

        // An applied force always wakes the body
        if body.force.x != 0.0 || body.force.y != 0.0 {
            body.set_sleeping(false);
            continue;
        }

        let motion = body.speed * body.speed + body.angular_speed * body.angular_speed;
        let min_motion = body.motion.min(motion);
        let max_motion = body.motion.max(motion);

        // Biased average, dips in motion register faster than spikes
        body.motion = MIN_BIAS * min_motion + (1.0 - MIN_BIAS) * max_motion;

        if body.sleep_threshold > 0 && body.motion < MOTION_SLEEP_THRESHOLD * time_factor {
            body.sleep_counter += 1;

            if body.sleep_counter >= body.sleep_threshold {
                log::trace!("body {} fell asleep", body.id());
                body.set_sleeping(true);
            }
        } else if body.sleep_counter > 0 {
            body.sleep_counter -= 1;
        }
    }
}

/// Wake sleeping bodies that an awake neighbour keeps colliding with.
pub(crate) fn after_collisions(
    pairs: &Pairs,
    bodies: &mut SlotMap<BodyKey, Body>,
    time_scale: f64,
) {
    let time_factor = time_scale * time_scale * time_scale;

    for key in pairs.list.iter() {
        let Some(pair) = pairs.table.get(key) else {
            continue;
        };
        // Separated pairs can't transfer motion
        if !pair.is_active {
            continue;
        }

        let Some([body_a, body_b]) =
            bodies.get_disjoint_mut([pair.collision.parent_a, pair.collision.parent_b])
        else {
            continue;
        };

        if (body_a.is_sleeping() && body_b.is_sleeping())
            || body_a.is_static()
            || body_b.is_static()
        {
            continue;
        }

        if body_a.is_sleeping() || body_b.is_sleeping() {
            let (sleeping, moving) = if body_a.is_sleeping() {
                (body_a, body_b)
            } else {
                (body_b, body_a)
            };

            if !sleeping.is_static() && moving.motion > MOTION_WAKE_THRESHOLD * time_factor {
                log::trace!("body {} woken by collision", sleeping.id());
                sleeping.set_sleeping(false);
            }
        }
    }
}
