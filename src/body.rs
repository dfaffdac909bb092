//! Rigid bodies: convex polygon parts, mass properties and the integrator.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;
use slotmap::new_key_type;
use thiserror::Error;
use vek::{Aabr, Vec2};

use crate::{
    collision::grid::Region,
    geometry::{
        axes, bounds,
        vertices::{self, Vertex},
    },
    math,
};

new_key_type! {
    /// Arena key of a body inside a [`World`](crate::world::World).
    pub struct BodyKey;
}

/// Scale factor applied to the polygon moment of inertia.
const INERTIA_SCALE: f64 = 4.0;

/// Monotonic source of body identities, used to order pairs canonically.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Errors detected when constructing a body from raw geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidBody {
    /// Fewer than three vertices were supplied.
    #[error("a body needs at least three vertices")]
    TooFewVertices,
    /// A coordinate was NaN or infinite.
    #[error("body vertices must have finite coordinates")]
    NonFinite,
    /// The ring does not form a convex polygon.
    #[error("body vertices must form a convex polygon")]
    NotConvex,
}

/// Category/mask/group collision filter.
///
/// A shared non-zero group short-circuits the category test: positive groups
/// always collide, negative groups never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CollisionFilter {
    /// Category bit of this body.
    pub category: u32,
    /// Mask of categories this body collides with.
    pub mask: u32,
    /// Group override, zero for none.
    pub group: i32,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self {
            category: 1,
            mask: u32::MAX,
            group: 0,
        }
    }
}

/// Construction options for a body.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BodyOptions {
    /// Mass per square unit of area.
    pub density: f64,
    /// Kinetic friction coefficient.
    pub friction: f64,
    /// Static friction multiplier.
    pub friction_static: f64,
    /// Drag applied by the integrator every step.
    pub friction_air: f64,
    /// Bounciness in contact resolution.
    pub restitution: f64,
    /// Allowed penetration before position correction kicks in.
    pub slop: f64,
    /// Initial angle in radians.
    pub angle: f64,
    /// Immovable body with infinite mass.
    pub is_static: bool,
    /// Detects collisions without resolving them.
    pub is_sensor: bool,
    /// Steps of low motion before the body falls asleep, zero to disable.
    pub sleep_threshold: u32,
    /// Collision filter.
    pub collision_filter: CollisionFilter,
}

impl Default for BodyOptions {
    fn default() -> Self {
        Self {
            density: 0.001,
            friction: 0.1,
            friction_static: 0.5,
            friction_air: 0.01,
            restitution: 0.0,
            slop: 0.05,
            angle: 0.0,
            is_static: false,
            is_sensor: false,
            sleep_threshold: 60,
            collision_filter: CollisionFilter::default(),
        }
    }
}

/// Accumulated constraint correction, carried across steps for warm starting.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConstraintImpulse {
    /// Translation component.
    pub linear: Vec2<f64>,
    /// Rotation component.
    pub angle: f64,
}

impl ConstraintImpulse {
    /// Whether nothing is accumulated.
    pub fn is_zero(&self) -> bool {
        self.linear.x == 0.0 && self.linear.y == 0.0 && self.angle == 0.0
    }
}

/// Mass properties saved while a body is static so they can be restored.
#[derive(Debug, Clone, Copy)]
struct DynamicProps {
    restitution: f64,
    friction: f64,
    mass: f64,
    inertia: f64,
    density: f64,
    inverse_mass: f64,
    inverse_inertia: f64,
}

/// One convex piece of a body.
///
/// Part 0 is the identity part covering the whole body; compound bodies add
/// their convex pieces from index 1.
#[derive(Debug, Clone)]
pub struct Part {
    /// World centre of the part.
    pub position: Vec2<f64>,
    /// Clockwise vertex ring in world space.
    pub vertices: Vec<Vertex>,
    /// Unit edge normals.
    pub axes: Vec<Vec2<f64>>,
    /// World bounds of the ring.
    pub bounds: Aabr<f64>,
    /// Polygon area.
    pub area: f64,
    /// Part mass, used for compound totals.
    pub mass: f64,
    /// Part moment of inertia, used for compound totals.
    pub inertia: f64,
}

impl Part {
    /// Build a part from raw points, validating the geometry.
    fn from_points(points: &[Vec2<f64>]) -> Result<Self, InvalidBody> {
        if points.len() < 3 {
            return Err(InvalidBody::TooFewVertices);
        }
        if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(InvalidBody::NonFinite);
        }

        let mut ring = vertices::create(points);
        vertices::clockwise_sort(&mut ring);
        if vertices::is_convex(&ring) != Some(true) {
            return Err(InvalidBody::NotConvex);
        }

        let position = vertices::centre(&ring);
        let axes = axes::from_vertices(&ring);
        let bounds = bounds::from_vertices(&ring);
        let area = vertices::area(&ring, false);

        Ok(Self {
            position,
            vertices: ring,
            axes,
            bounds,
            area,
            mass: 0.0,
            inertia: 0.0,
        })
    }

    /// Derive mass and inertia from a density.
    fn set_mass_properties(&mut self, density: f64) {
        self.mass = density * self.area;

        // Inertia is measured about the centroid
        let mut local = self.vertices.clone();
        vertices::translate(&mut local, -self.position);
        self.inertia = INERTIA_SCALE * vertices::inertia(&local, self.mass);
    }
}

/// Convex rigid body made of one or more parts.
#[derive(Debug, Clone)]
pub struct Body {
    pub(crate) id: u64,
    pub(crate) parts: Vec<Part>,
    pub(crate) position: Vec2<f64>,
    pub(crate) position_prev: Vec2<f64>,
    pub(crate) angle: f64,
    pub(crate) angle_prev: f64,
    pub(crate) velocity: Vec2<f64>,
    pub(crate) angular_velocity: f64,
    pub(crate) speed: f64,
    pub(crate) angular_speed: f64,
    pub(crate) force: Vec2<f64>,
    pub(crate) torque: f64,
    pub(crate) position_impulse: Vec2<f64>,
    pub(crate) constraint_impulse: ConstraintImpulse,
    pub(crate) total_contacts: u32,
    pub(crate) mass: f64,
    pub(crate) inverse_mass: f64,
    pub(crate) inertia: f64,
    pub(crate) inverse_inertia: f64,
    pub(crate) density: f64,
    pub(crate) area: f64,
    pub(crate) friction: f64,
    pub(crate) friction_static: f64,
    pub(crate) friction_air: f64,
    pub(crate) restitution: f64,
    pub(crate) slop: f64,
    pub(crate) is_static: bool,
    pub(crate) is_sleeping: bool,
    pub(crate) is_sensor: bool,
    pub(crate) sleep_counter: u32,
    pub(crate) sleep_threshold: u32,
    pub(crate) motion: f64,
    pub(crate) collision_filter: CollisionFilter,
    pub(crate) region: Option<Region>,
    static_backup: Option<DynamicProps>,
}

impl Body {
    /// Construct a body from a convex vertex ring centred at a position.
    ///
    /// The ring is sorted clockwise and its centroid is moved onto
    /// `position`; only the shape of the input matters, not its placement.
    pub fn from_vertices(
        position: Vec2<f64>,
        points: &[Vec2<f64>],
        options: BodyOptions,
    ) -> Result<Self, InvalidBody> {
        let mut part = Part::from_points(points)?;

        // Recentre the ring onto the body position
        let offset = position - part.position;
        vertices::translate(&mut part.vertices, offset);
        part.position = position;
        bounds::update(&mut part.bounds, &part.vertices, Vec2::zero());
        part.set_mass_properties(options.density);

        let mass = part.mass;
        let inertia = part.inertia;
        let area = part.area;
        let mut body = Self::with_parts(position, vec![part], mass, inertia, area, &options);

        if options.angle != 0.0 {
            body.set_angle(options.angle);
        }
        if options.is_static {
            body.set_static(true);
        }

        Ok(body)
    }

    /// Construct a compound body from several convex rings in world space.
    ///
    /// The rings keep their placement; the body centre becomes the mass
    /// weighted centre of the parts and the identity part is the convex hull
    /// of all rings.
    pub fn compound(shapes: &[&[Vec2<f64>]], options: BodyOptions) -> Result<Self, InvalidBody> {
        if shapes.is_empty() {
            return Err(InvalidBody::TooFewVertices);
        }

        let mut parts = shapes
            .iter()
            .map(|points| Part::from_points(points))
            .collect::<Result<Vec<_>, _>>()?;
        for part in parts.iter_mut() {
            part.set_mass_properties(options.density);
        }

        let total_mass: f64 = parts.iter().map(|part| part.mass).sum();
        let total_area: f64 = parts.iter().map(|part| part.area).sum();
        let total_inertia: f64 = parts.iter().map(|part| part.inertia).sum();
        let mut centre = Vec2::zero();
        for part in parts.iter() {
            centre += part.position * part.mass;
        }
        centre /= total_mass;

        // The identity part wraps every piece in a single convex ring
        let all: Vec<Vertex> = parts
            .iter()
            .flat_map(|part| part.vertices.iter().copied())
            .collect();
        let hull = vertices::hull(&all);
        let identity = Part {
            position: centre,
            axes: axes::from_vertices(&hull),
            bounds: bounds::from_vertices(&hull),
            area: total_area,
            mass: total_mass,
            inertia: total_inertia,
            vertices: hull,
        };
        parts.insert(0, identity);

        let mut body =
            Self::with_parts(centre, parts, total_mass, total_inertia, total_area, &options);

        if options.angle != 0.0 {
            body.set_angle(options.angle);
        }
        if options.is_static {
            body.set_static(true);
        }

        Ok(body)
    }

    /// Shared constructor tail once the parts exist.
    fn with_parts(
        position: Vec2<f64>,
        parts: Vec<Part>,
        mass: f64,
        inertia: f64,
        area: f64,
        options: &BodyOptions,
    ) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            parts,
            position,
            position_prev: position,
            angle: 0.0,
            angle_prev: 0.0,
            velocity: Vec2::zero(),
            angular_velocity: 0.0,
            speed: 0.0,
            angular_speed: 0.0,
            force: Vec2::zero(),
            torque: 0.0,
            position_impulse: Vec2::zero(),
            constraint_impulse: ConstraintImpulse::default(),
            total_contacts: 0,
            mass,
            inverse_mass: inverse_or_zero(mass),
            inertia,
            inverse_inertia: inverse_or_zero(inertia),
            density: options.density,
            area,
            friction: options.friction,
            friction_static: options.friction_static,
            friction_air: options.friction_air,
            restitution: options.restitution,
            slop: options.slop,
            is_static: false,
            is_sleeping: false,
            is_sensor: options.is_sensor,
            sleep_counter: 0,
            sleep_threshold: options.sleep_threshold,
            motion: 0.0,
            collision_filter: options.collision_filter,
            region: None,
            static_backup: None,
        }
    }

    /// Integrate one step of time corrected Verlet with air drag.
    ///
    /// Moves the body along its implied velocity plus the accumulated force,
    /// then drags the geometry of every part along.
    pub fn update(&mut self, delta_time: f64, time_scale: f64, correction: f64) {
        let delta_time_squared = (delta_time * time_scale).powi(2);
        let friction_air = 1.0 - self.friction_air * time_scale;
        let velocity_prev = self.position - self.position_prev;

        self.velocity = velocity_prev * friction_air * correction
            + self.force * self.inverse_mass * delta_time_squared;
        self.position_prev = self.position;
        self.position += self.velocity;

        self.angular_velocity = (self.angle - self.angle_prev) * friction_air * correction
            + self.torque * self.inverse_inertia * delta_time_squared;
        self.angle_prev = self.angle;
        self.angle += self.angular_velocity;

        self.speed = self.velocity.magnitude();
        self.angular_speed = self.angular_velocity.abs();

        let position = self.position;
        let velocity = self.velocity;
        let angular_velocity = self.angular_velocity;
        for part in self.parts.iter_mut() {
            vertices::translate(&mut part.vertices, velocity);
            part.position += velocity;

            if angular_velocity != 0.0 {
                vertices::rotate(&mut part.vertices, angular_velocity, position);
                axes::rotate(&mut part.axes, angular_velocity);
                part.position = math::rotate_about(part.position, angular_velocity, position);
            }

            bounds::update(&mut part.bounds, &part.vertices, velocity);
        }
    }

    /// Accumulate a force applied at a world position, with its torque.
    pub fn apply_force(&mut self, position: Vec2<f64>, force: Vec2<f64>) {
        self.force += force;
        self.torque += math::cross(position - self.position, force);
    }

    /// Move the body without changing its velocity.
    pub fn set_position(&mut self, position: Vec2<f64>) {
        let delta = position - self.position;
        self.position_prev += delta;
        self.position = position;

        for part in self.parts.iter_mut() {
            part.position += delta;
            vertices::translate(&mut part.vertices, delta);
            bounds::update(&mut part.bounds, &part.vertices, self.velocity);
        }
    }

    /// Move the body by a delta without changing its velocity.
    pub fn translate(&mut self, delta: Vec2<f64>) {
        self.set_position(self.position + delta);
    }

    /// Set the angle without changing angular velocity.
    pub fn set_angle(&mut self, angle: f64) {
        let delta = angle - self.angle;
        self.angle_prev += delta;
        self.angle = angle;

        let position = self.position;
        for part in self.parts.iter_mut() {
            vertices::rotate(&mut part.vertices, delta, position);
            axes::rotate(&mut part.axes, delta);
            part.position = math::rotate_about(part.position, delta, position);
            bounds::update(&mut part.bounds, &part.vertices, self.velocity);
        }
    }

    /// Rotate the body, optionally around a world point instead of its centre.
    pub fn rotate(&mut self, rotation: f64, point: Option<Vec2<f64>>) {
        match point {
            None => self.set_angle(self.angle + rotation),
            Some(point) => {
                self.set_position(math::rotate_about(self.position, rotation, point));
                self.set_angle(self.angle + rotation);
            }
        }
    }

    /// Set the implied velocity by shifting the previous position.
    pub fn set_velocity(&mut self, velocity: Vec2<f64>) {
        self.position_prev = self.position - velocity;
        self.velocity = velocity;
        self.speed = velocity.magnitude();
    }

    /// Set the implied angular velocity by shifting the previous angle.
    pub fn set_angular_velocity(&mut self, angular_velocity: f64) {
        self.angle_prev = self.angle - angular_velocity;
        self.angular_velocity = angular_velocity;
        self.angular_speed = angular_velocity.abs();
    }

    /// Toggle between static and dynamic, restoring saved mass properties.
    pub fn set_static(&mut self, is_static: bool) {
        if is_static == self.is_static {
            return;
        }

        if is_static {
            self.static_backup = Some(DynamicProps {
                restitution: self.restitution,
                friction: self.friction,
                mass: self.mass,
                inertia: self.inertia,
                density: self.density,
                inverse_mass: self.inverse_mass,
                inverse_inertia: self.inverse_inertia,
            });

            self.is_static = true;
            self.restitution = 0.0;
            self.friction = 1.0;
            self.mass = f64::INFINITY;
            self.inertia = f64::INFINITY;
            self.density = f64::INFINITY;
            self.inverse_mass = 0.0;
            self.inverse_inertia = 0.0;
            self.position_prev = self.position;
            self.angle_prev = self.angle;
            self.velocity = Vec2::zero();
            self.angular_velocity = 0.0;
            self.speed = 0.0;
            self.angular_speed = 0.0;
            self.motion = 0.0;
        } else {
            self.is_static = false;

            if let Some(backup) = self.static_backup.take() {
                self.restitution = backup.restitution;
                self.friction = backup.friction;
                self.mass = backup.mass;
                self.inertia = backup.inertia;
                self.density = backup.density;
                self.inverse_mass = backup.inverse_mass;
                self.inverse_inertia = backup.inverse_inertia;
            }
        }
    }

    /// Change the mass, scaling inertia with it.
    pub fn set_mass(&mut self, mass: f64) {
        let moment = self.inertia / (self.mass / 6.0);
        self.inertia = moment * (mass / 6.0);
        self.inverse_inertia = inverse_or_zero(self.inertia);

        self.mass = mass;
        self.inverse_mass = inverse_or_zero(mass);
        self.density = self.mass / self.area;
    }

    /// Override the moment of inertia.
    pub fn set_inertia(&mut self, inertia: f64) {
        self.inertia = inertia;
        self.inverse_inertia = inverse_or_zero(inertia);
    }

    /// Put the body to sleep or wake it.
    pub fn set_sleeping(&mut self, is_sleeping: bool) {
        if is_sleeping {
            self.is_sleeping = true;
            self.sleep_counter = self.sleep_threshold;

            self.position_impulse = Vec2::zero();
            self.position_prev = self.position;
            self.angle_prev = self.angle;
            self.velocity = Vec2::zero();
            self.angular_velocity = 0.0;
            self.speed = 0.0;
            self.angular_speed = 0.0;
            self.motion = 0.0;
        } else {
            self.is_sleeping = false;
            self.sleep_counter = 0;
        }
    }

    /// Scale the body away from a point, recomputing mass properties.
    pub fn scale(&mut self, scale_x: f64, scale_y: f64, point: Option<Vec2<f64>>) {
        let point = point.unwrap_or(self.position);
        let density = self.density;
        let velocity = self.velocity;

        for part in self.parts.iter_mut() {
            vertices::scale(&mut part.vertices, scale_x, scale_y, point);
            part.axes = axes::from_vertices(&part.vertices);
            part.area = vertices::area(&part.vertices, false);
            part.position = point
                + Vec2::new(
                    (part.position.x - point.x) * scale_x,
                    (part.position.y - point.y) * scale_y,
                );
            part.set_mass_properties(density);
            bounds::update(&mut part.bounds, &part.vertices, velocity);
        }

        // Scaling about an external point also moves the body centre
        let delta = self.parts[0].position - self.position;
        self.position += delta;
        self.position_prev += delta;

        // Compound totals skip the identity hull, single bodies are the hull
        let range = if self.parts.len() > 1 { 1.. } else { 0.. };
        let total_mass: f64 = self.parts[range.clone()].iter().map(|p| p.mass).sum();
        let total_area: f64 = self.parts[range.clone()].iter().map(|p| p.area).sum();
        let total_inertia: f64 = self.parts[range].iter().map(|p| p.inertia).sum();

        self.area = total_area;
        if !self.is_static {
            self.mass = total_mass;
            self.inverse_mass = inverse_or_zero(total_mass);
            self.inertia = total_inertia;
            self.inverse_inertia = inverse_or_zero(total_inertia);
        }
    }

    /// Body identity, unique per process.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Parts of the body, the identity part first.
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// World centre position.
    pub fn position(&self) -> Vec2<f64> {
        self.position
    }

    /// Angle in radians.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Implied velocity of the last step.
    pub fn velocity(&self) -> Vec2<f64> {
        self.velocity
    }

    /// Implied angular velocity of the last step.
    pub fn angular_velocity(&self) -> f64 {
        self.angular_velocity
    }

    /// Velocity magnitude.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Angular velocity magnitude.
    pub fn angular_speed(&self) -> f64 {
        self.angular_speed
    }

    /// Mass, infinite for static bodies.
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Inverse mass, zero for static bodies.
    pub fn inverse_mass(&self) -> f64 {
        self.inverse_mass
    }

    /// Moment of inertia.
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    /// Whether the body is immovable.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Whether the body is currently asleep.
    pub fn is_sleeping(&self) -> bool {
        self.is_sleeping
    }

    /// Whether the body only senses collisions.
    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    /// Filtered motion metric used by the sleeping controller.
    pub fn motion(&self) -> f64 {
        self.motion
    }

    /// World bounds of the identity part.
    pub fn bounds(&self) -> Aabr<f64> {
        self.parts[0].bounds
    }

    /// Vertex ring of the identity part.
    pub fn vertices(&self) -> &[Vertex] {
        &self.parts[0].vertices
    }

    /// Accumulated force for this step.
    pub fn force(&self) -> Vec2<f64> {
        self.force
    }
}

/// Reciprocal with zero and infinity clamped to zero.
pub(crate) fn inverse_or_zero(value: f64) -> f64 {
    if value == 0.0 || value.is_infinite() {
        0.0
    } else {
        value.recip()
    }
}

#[cfg(test)]
mod tests {
    use vek::Vec2;

    use super::*;

    /// Axis aligned box ring.
    fn box_points(width: f64, height: f64) -> Vec<Vec2<f64>> {
        let (w, h) = (width / 2.0, height / 2.0);
        vec![
            Vec2::new(-w, -h),
            Vec2::new(w, -h),
            Vec2::new(w, h),
            Vec2::new(-w, h),
        ]
    }

    /// Test construction validation of bad geometry.
    #[test]
    fn test_invalid_geometry() {
        let opts = BodyOptions::default();

        let two = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)];
        assert_eq!(
            Body::from_vertices(Vec2::zero(), &two, opts.clone()).unwrap_err(),
            InvalidBody::TooFewVertices
        );

        let nan = [Vec2::new(0.0, 0.0), Vec2::new(1.0, f64::NAN), Vec2::new(0.0, 1.0)];
        assert_eq!(
            Body::from_vertices(Vec2::zero(), &nan, opts.clone()).unwrap_err(),
            InvalidBody::NonFinite
        );

        let line = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0)];
        assert_eq!(
            Body::from_vertices(Vec2::zero(), &line, opts).unwrap_err(),
            InvalidBody::NotConvex
        );
    }

    /// Test that mass and bounds follow from the geometry.
    #[test]
    fn test_mass_properties() {
        let body = Body::from_vertices(
            Vec2::new(10.0, 20.0),
            &box_points(40.0, 40.0),
            BodyOptions::default(),
        )
        .unwrap();

        assert!((body.area - 1600.0).abs() < 1e-9);
        assert!((body.mass - 1.6).abs() < 1e-9);
        assert!((body.inverse_mass - 1.0 / 1.6).abs() < 1e-9);
        assert_eq!(body.bounds().min, Vec2::new(-10.0, 0.0));
        assert_eq!(body.bounds().max, Vec2::new(30.0, 40.0));
    }

    /// Test the static flag round trip restores dynamic properties.
    #[test]
    fn test_set_static_roundtrip() {
        let mut body = Body::from_vertices(
            Vec2::zero(),
            &box_points(10.0, 10.0),
            BodyOptions::default(),
        )
        .unwrap();
        let mass = body.mass;

        body.set_static(true);
        assert!(body.is_static());
        assert_eq!(body.inverse_mass, 0.0);
        assert_eq!(body.mass, f64::INFINITY);

        body.set_static(false);
        assert!(!body.is_static());
        assert!((body.mass - mass).abs() < 1e-12);
        assert!((body.inverse_mass - 1.0 / mass).abs() < 1e-12);
    }

    /// Test translate followed by its negation restores the position.
    #[test]
    fn test_translate_roundtrip() {
        let mut body = Body::from_vertices(
            Vec2::new(5.0, 5.0),
            &box_points(8.0, 8.0),
            BodyOptions::default(),
        )
        .unwrap();

        body.translate(Vec2::new(13.0, -4.5));
        body.translate(Vec2::new(-13.0, 4.5));

        assert!((body.position - Vec2::new(5.0, 5.0)).magnitude() < 1e-9);
        assert!((body.parts[0].vertices[0].point - Vec2::new(1.0, 1.0)).magnitude() < 1e-9);
    }

    /// Test rotate and rotate back about a shared point.
    #[test]
    fn test_rotate_roundtrip() {
        let mut body = Body::from_vertices(
            Vec2::new(5.0, 0.0),
            &box_points(8.0, 8.0),
            BodyOptions::default(),
        )
        .unwrap();
        let original: Vec<Vec2<f64>> =
            body.vertices().iter().map(|vertex| vertex.point).collect();

        let pivot = Some(Vec2::zero());
        body.rotate(0.9, pivot);
        body.rotate(-0.9, pivot);

        for (vertex, point) in body.vertices().iter().zip(original.iter()) {
            assert!((vertex.point - *point).magnitude() < 1e-6);
        }
    }

    /// Test that setting velocity shifts the previous position.
    #[test]
    fn test_set_velocity() {
        let mut body = Body::from_vertices(
            Vec2::zero(),
            &box_points(4.0, 4.0),
            BodyOptions::default(),
        )
        .unwrap();

        body.set_velocity(Vec2::new(2.0, -1.0));
        assert_eq!(body.position_prev, Vec2::new(-2.0, 1.0));
        assert!((body.speed - 5.0_f64.sqrt()).abs() < 1e-12);
    }

    /// Test a free integration step with a constant force.
    #[test]
    fn test_update_applies_force() {
        let mut body = Body::from_vertices(
            Vec2::zero(),
            &box_points(4.0, 4.0),
            BodyOptions {
                friction_air: 0.0,
                ..BodyOptions::default()
            },
        )
        .unwrap();

        body.force = Vec2::new(0.0, body.mass * 0.001);
        body.update(16.666, 1.0, 1.0);

        assert!(body.position.y > 0.0);
        assert_eq!(body.velocity.y, body.position.y);
        assert_eq!(body.position_prev, Vec2::zero());
    }

    /// Test compound construction sums part masses.
    #[test]
    fn test_compound_totals() {
        let left = [
            Vec2::new(-20.0, -10.0),
            Vec2::new(0.0, -10.0),
            Vec2::new(0.0, 10.0),
            Vec2::new(-20.0, 10.0),
        ];
        let right = [
            Vec2::new(0.0, -10.0),
            Vec2::new(20.0, -10.0),
            Vec2::new(20.0, 10.0),
            Vec2::new(0.0, 10.0),
        ];

        let body = Body::compound(&[&left, &right], BodyOptions::default()).unwrap();

        assert_eq!(body.parts.len(), 3);
        assert!((body.mass - 0.8).abs() < 1e-9);
        assert!((body.position - Vec2::new(0.0, 0.0)).magnitude() < 1e-9);
        // The identity hull covers both halves
        assert_eq!(body.bounds().min, Vec2::new(-20.0, -10.0));
        assert_eq!(body.bounds().max, Vec2::new(20.0, 10.0));
    }
}
