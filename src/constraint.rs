//! Distance constraints: stiff pins and soft springs between bodies.

use slotmap::{new_key_type, SlotMap};
use vek::Vec2;

use crate::{
    body::{Body, BodyKey},
    geometry::{axes, bounds, vertices},
    math,
};

new_key_type! {
    /// Arena key of a constraint inside a [`World`](crate::world::World).
    pub struct ConstraintKey;
}

/// Shortest length a constraint can report, avoids dividing by zero for pins.
const MIN_LENGTH: f64 = 1e-6;

/// Global damping of the solved torque.
const TORQUE_DAMPEN: f64 = 1.0;

/// Fraction of the accumulated impulse carried into the next step.
const WARMING: f64 = 0.4;

/// Construction options for a constraint.
///
/// At least one body must be present; a missing body pins the matching point
/// to world space.
#[derive(Debug, Clone, Default)]
pub struct ConstraintOptions {
    /// First constrained body.
    pub body_a: Option<BodyKey>,
    /// Second constrained body.
    pub body_b: Option<BodyKey>,
    /// Anchor on body A, or a world point when the body is absent.
    pub point_a: Vec2<f64>,
    /// Anchor on body B, or a world point when the body is absent.
    pub point_b: Vec2<f64>,
    /// Rest length, defaults to the distance between the initial anchors.
    pub length: Option<f64>,
    /// Stiffness in 0..1, defaults to a rigid 1 (or 0.7 for zero length).
    pub stiffness: Option<f64>,
    /// Normal velocity damping factor.
    pub damping: f64,
    /// How much rotation is absorbed instead of applied as torque.
    pub angular_stiffness: f64,
}

/// Distance constraint between two anchors.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub(crate) body_a: Option<BodyKey>,
    pub(crate) body_b: Option<BodyKey>,
    /// Local anchor, kept rotated to the body's current angle.
    pub(crate) point_a: Vec2<f64>,
    pub(crate) point_b: Vec2<f64>,
    pub(crate) length: f64,
    pub(crate) stiffness: f64,
    pub(crate) damping: f64,
    pub(crate) angular_stiffness: f64,
    /// Body angle the local anchor was last rotated to.
    pub(crate) angle_a: f64,
    pub(crate) angle_b: f64,
}

impl Constraint {
    /// Resolve options against the bodies they reference.
    pub(crate) fn from_options(
        options: ConstraintOptions,
        bodies: &SlotMap<BodyKey, Body>,
    ) -> Self {
        let body_a = options.body_a.filter(|key| bodies.contains_key(*key));
        let body_b = options.body_b.filter(|key| bodies.contains_key(*key));

        let world_a = body_a
            .map(|key| bodies[key].position() + options.point_a)
            .unwrap_or(options.point_a);
        let world_b = body_b
            .map(|key| bodies[key].position() + options.point_b)
            .unwrap_or(options.point_b);

        let length = options
            .length
            .unwrap_or_else(|| (world_a - world_b).magnitude());
        let stiffness = options
            .stiffness
            .unwrap_or(if length > 0.0 { 1.0 } else { 0.7 });

        Self {
            body_a,
            body_b,
            point_a: options.point_a,
            point_b: options.point_b,
            length,
            stiffness,
            damping: options.damping,
            angular_stiffness: options.angular_stiffness,
            angle_a: body_a.map(|key| bodies[key].angle()).unwrap_or(0.0),
            angle_b: body_b.map(|key| bodies[key].angle()).unwrap_or(0.0),
        }
    }

    /// Rest length of the constraint.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Stiffness of the constraint.
    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }
}

/// Apply the warmed impulse from the previous step to every body.
pub(crate) fn pre_solve_all(bodies: &mut SlotMap<BodyKey, Body>, keys: &[BodyKey]) {
    for &key in keys {
        let Some(body) = bodies.get_mut(key) else {
            continue;
        };

        if body.is_static || body.constraint_impulse.is_zero() {
            continue;
        }

        body.position += body.constraint_impulse.linear;
        body.angle += body.constraint_impulse.angle;
    }
}

/// Solve every constraint once.
///
/// Constraints with an immovable endpoint are solved first; anchoring to
/// something fixed converges faster when it happens before the free ones.
pub(crate) fn solve_all(
    constraints: &mut SlotMap<ConstraintKey, Constraint>,
    keys: &[ConstraintKey],
    bodies: &mut SlotMap<BodyKey, Body>,
    time_scale: f64,
) {
    puffin::profile_function!();

    let is_fixed = |constraint: &Constraint, bodies: &SlotMap<BodyKey, Body>| {
        let fixed_a = constraint
            .body_a
            .and_then(|key| bodies.get(key))
            .map_or(true, |body| body.is_static);
        let fixed_b = constraint
            .body_b
            .and_then(|key| bodies.get(key))
            .map_or(true, |body| body.is_static);

        fixed_a || fixed_b
    };

    for &key in keys {
        let Some(constraint) = constraints.get_mut(key) else {
            continue;
        };
        if is_fixed(constraint, bodies) {
            solve(constraint, bodies, time_scale);
        }
    }

    for &key in keys {
        let Some(constraint) = constraints.get_mut(key) else {
            continue;
        };
        if !is_fixed(constraint, bodies) {
            solve(constraint, bodies, time_scale);
        }
    }
}

/// Solve a single constraint with one Gauss-Seidel relaxation.
fn solve(constraint: &mut Constraint, bodies: &mut SlotMap<BodyKey, Body>, time_scale: f64) {
    let (mut body_a, mut body_b): (Option<&mut Body>, Option<&mut Body>) =
        match (constraint.body_a, constraint.body_b) {
            (Some(a), Some(b)) => {
                let Some([a, b]) = bodies.get_disjoint_mut([a, b]) else {
                    return;
                };
                (Some(a), Some(b))
            }
            (Some(a), None) => (bodies.get_mut(a), None),
            (None, Some(b)) => (None, bodies.get_mut(b)),
            (None, None) => return,
        };
    if body_a.is_none() && body_b.is_none() {
        return;
    }

    // Keep the local anchors rotated along with their bodies
    if let Some(body) = body_a.as_deref() {
        if !body.is_static {
            let delta = body.angle - constraint.angle_a;
            constraint.point_a = math::rotate_about(constraint.point_a, delta, Vec2::zero());
            constraint.angle_a = body.angle;
        }
    }
    if let Some(body) = body_b.as_deref() {
        if !body.is_static {
            let delta = body.angle - constraint.angle_b;
            constraint.point_b = math::rotate_about(constraint.point_b, delta, Vec2::zero());
            constraint.angle_b = body.angle;
        }
    }

    let world_a = body_a
        .as_deref()
        .map(|body| body.position + constraint.point_a)
        .unwrap_or(constraint.point_a);
    let world_b = body_b
        .as_deref()
        .map(|body| body.position + constraint.point_b)
        .unwrap_or(constraint.point_b);

    let delta = world_a - world_b;
    let current_length = delta.magnitude().max(MIN_LENGTH);

    // Gauss-Seidel: move both anchors a stiffness-scaled share of the error
    let difference = (current_length - constraint.length) / current_length;
    let stiffness = if constraint.stiffness < 1.0 {
        constraint.stiffness * time_scale
    } else {
        constraint.stiffness
    };
    let force = delta * (difference * stiffness);

    let mass_total = body_a.as_deref().map_or(0.0, |body| body.inverse_mass)
        + body_b.as_deref().map_or(0.0, |body| body.inverse_mass);
    let inertia_total = body_a.as_deref().map_or(0.0, |body| body.inverse_inertia)
        + body_b.as_deref().map_or(0.0, |body| body.inverse_inertia);
    let resistance_total = mass_total + inertia_total;

    let (normal, normal_velocity) = if constraint.damping > 0.0 {
        let normal = delta / current_length;
        let relative_velocity = body_b
            .as_deref()
            .map_or(Vec2::zero(), |body| body.position - body.position_prev)
            - body_a
                .as_deref()
                .map_or(Vec2::zero(), |body| body.position - body.position_prev);

        (normal, normal.dot(relative_velocity))
    } else {
        (Vec2::zero(), 0.0)
    };

    if let Some(body) = body_a.as_deref_mut() {
        if !body.is_static {
            // A zero total mass means nothing can take the correction
            if mass_total > 0.0 {
                let share = body.inverse_mass / mass_total;

                body.constraint_impulse.linear -= force * share;
                body.position -= force * share;

                if constraint.damping > 0.0 {
                    body.position_prev -= normal * (constraint.damping * normal_velocity * share);
                }
            }

            if resistance_total > 0.0 {
                let torque = (math::cross(constraint.point_a, force) / resistance_total)
                    * TORQUE_DAMPEN
                    * body.inverse_inertia
                    * (1.0 - constraint.angular_stiffness);
                body.constraint_impulse.angle -= torque;
                body.angle -= torque;
            }
        }
    }

    if let Some(body) = body_b.as_deref_mut() {
        if !body.is_static {
            if mass_total > 0.0 {
                let share = body.inverse_mass / mass_total;

                body.constraint_impulse.linear += force * share;
                body.position += force * share;

                if constraint.damping > 0.0 {
                    body.position_prev += normal * (constraint.damping * normal_velocity * share);
                }
            }

            if resistance_total > 0.0 {
                let torque = (math::cross(constraint.point_b, force) / resistance_total)
                    * TORQUE_DAMPEN
                    * body.inverse_inertia
                    * (1.0 - constraint.angular_stiffness);
                body.constraint_impulse.angle += torque;
                body.angle += torque;
            }
        }
    }
}

/// Sync body geometry to the solved positions and dampen the warm impulses.
pub(crate) fn post_solve_all(bodies: &mut SlotMap<BodyKey, Body>, keys: &[BodyKey]) {
    for &key in keys {
        let Some(body) = bodies.get_mut(key) else {
            continue;
        };

        if body.is_static || body.constraint_impulse.is_zero() {
            continue;
        }

        body.set_sleeping(false);

        let impulse = body.constraint_impulse;
        let position = body.position;
        let velocity = body.velocity;
        for part in body.parts.iter_mut() {
            vertices::translate(&mut part.vertices, impulse.linear);
            part.position += impulse.linear;

            if impulse.angle != 0.0 {
                vertices::rotate(&mut part.vertices, impulse.angle, position);
                axes::rotate(&mut part.axes, impulse.angle);
                part.position = math::rotate_about(part.position, impulse.angle, position);
            }

            bounds::update(&mut part.bounds, &part.vertices, velocity);
        }

        // Carry a reduced impulse into the next step
        body.constraint_impulse.linear *= WARMING;
        body.constraint_impulse.angle *= WARMING;
    }
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;
    use vek::Vec2;

    use crate::body::BodyOptions;

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

    /// Test that the rest length defaults to the initial anchor distance.
    #[test]
    fn test_default_length() {
        let mut bodies: SlotMap<BodyKey, Body> = SlotMap::with_key();
        let a = bodies.insert(box_body(0.0, 0.0, 10.0));
        let b = bodies.insert(box_body(30.0, 40.0, 10.0));

        let constraint = Constraint::from_options(
            ConstraintOptions {
                body_a: Some(a),
                body_b: Some(b),
                ..Default::default()
            },
            &bodies,
        );

        assert!((constraint.length() - 50.0).abs() < 1e-9);
        assert_eq!(constraint.stiffness(), 1.0);
    }

    /// Test that a stretched constraint pulls a free body toward a world pin.
    #[test]
    fn test_pulls_toward_anchor() {
        let mut bodies: SlotMap<BodyKey, Body> = SlotMap::with_key();
        let key = bodies.insert(box_body(100.0, 0.0, 10.0));

        let mut constraints: SlotMap<ConstraintKey, Constraint> = SlotMap::with_key();
        let constraint = constraints.insert(Constraint::from_options(
            ConstraintOptions {
                body_b: Some(key),
                point_a: Vec2::zero(),
                length: Some(50.0),
                stiffness: Some(1.0),
                ..Default::default()
            },
            &bodies,
        ));

        let before = bodies[key].position().x;
        solve_all(&mut constraints, &[constraint], &mut bodies, 1.0);

        assert!(bodies[key].position().x < before);
    }

    /// Test that a zero length pin still solves without blowing up.
    #[test]
    fn test_zero_length_pin() {
        let mut bodies: SlotMap<BodyKey, Body> = SlotMap::with_key();
        let key = bodies.insert(box_body(0.0, 0.0, 10.0));

        let mut constraints: SlotMap<ConstraintKey, Constraint> = SlotMap::with_key();
        let constraint = constraints.insert(Constraint::from_options(
            ConstraintOptions {
                body_a: Some(key),
                point_b: Vec2::new(0.0, 0.0),
                length: Some(0.0),
                stiffness: Some(0.5),
                ..Default::default()
            },
            &bodies,
        ));

        for _ in 0..10 {
            solve_all(&mut constraints, &[constraint], &mut bodies, 1.0);
        }

        let position = bodies[key].position();
        assert!(position.x.is_finite() && position.y.is_finite());
        assert!(position.magnitude() < 1.0);
    }

    /// Test that a zero mass dynamic body on a constraint is clamped, not
    /// solved into NaN.
    #[test]
    fn test_zero_mass_body_stays_finite() {
        let mut bodies: SlotMap<BodyKey, Body> = SlotMap::with_key();
        let key = bodies.insert(box_body(100.0, 0.0, 10.0));
        bodies[key].set_mass(0.0);

        let mut constraints: SlotMap<ConstraintKey, Constraint> = SlotMap::with_key();
        let constraint = constraints.insert(Constraint::from_options(
            ConstraintOptions {
                body_b: Some(key),
                point_a: Vec2::zero(),
                length: Some(50.0),
                stiffness: Some(1.0),
                ..Default::default()
            },
            &bodies,
        ));

        for _ in 0..10 {
            solve_all(&mut constraints, &[constraint], &mut bodies, 1.0);
        }

        let position = bodies[key].position();
        assert!(position.x.is_finite() && position.y.is_finite());
        // Nothing can absorb the correction, so the body stays put
        assert_eq!(position, Vec2::new(100.0, 0.0));
    }

    /// Test that the post solve pass moves the vertices with the body.
    #[test]
    fn test_post_solve_syncs_geometry() {
        let mut bodies: SlotMap<BodyKey, Body> = SlotMap::with_key();
        let key = bodies.insert(box_body(100.0, 0.0, 10.0));

        let mut constraints: SlotMap<ConstraintKey, Constraint> = SlotMap::with_key();
        let constraint = constraints.insert(Constraint::from_options(
            ConstraintOptions {
                body_b: Some(key),
                point_a: Vec2::zero(),
                length: Some(50.0),
                stiffness: Some(1.0),
                ..Default::default()
            },
            &bodies,
        ));

        solve_all(&mut constraints, &[constraint], &mut bodies, 1.0);
        post_solve_all(&mut bodies, &[key]);

        let body = &bodies[key];
        let centre = crate::geometry::vertices::centre(body.vertices());
        assert!((centre - body.position()).magnitude() < 1e-9);
    }
}
