//! The world: a composite tree of bodies, constraints and nested composites.
//!
//! Bodies, constraints and composites live in arenas with stable keys; the
//! tree only stores keys, so parent links can't form ownership cycles.

use serde::Deserialize;
use slotmap::{new_key_type, SlotMap};
use vek::{Aabr, Vec2};

use crate::{
    body::{Body, BodyKey},
    constraint::{Constraint, ConstraintKey, ConstraintOptions},
    geometry::bounds,
    math,
};

new_key_type! {
    /// Arena key of a composite in the world tree.
    pub struct CompositeKey;
}

/// World gravity, applied to every dynamic body each step.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Gravity {
    /// Horizontal component.
    pub x: f64,
    /// Vertical component, positive points down the screen.
    pub y: f64,
    /// Scale applied to the gravity force.
    pub scale: f64,
}

impl Default for Gravity {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 1.0,
            scale: 0.001,
        }
    }
}

/// Node of the world tree holding keys into the arenas.
#[derive(Debug, Clone, Default)]
struct Composite {
    parent: Option<CompositeKey>,
    bodies: Vec<BodyKey>,
    constraints: Vec<ConstraintKey>,
    children: Vec<CompositeKey>,
    /// Structural dirty flag, forces a broadphase rebuild when set on the root.
    is_modified: bool,
    label: String,
}

/// Root container of the simulation state.
pub struct World {
    composites: SlotMap<CompositeKey, Composite>,
    root: CompositeKey,
    pub(crate) bodies: SlotMap<BodyKey, Body>,
    pub(crate) constraints: SlotMap<ConstraintKey, Constraint>,
    gravity: Gravity,
    bounds: Aabr<f64>,
}

impl World {
    /// Construct an empty world with default gravity and infinite bounds.
    pub fn new() -> Self {
        let mut composites = SlotMap::with_key();
        let root = composites.insert(Composite {
            label: "world".to_string(),
            ..Composite::default()
        });

        Self {
            composites,
            root,
            bodies: SlotMap::with_key(),
            constraints: SlotMap::with_key(),
            gravity: Gravity::default(),
            bounds: bounds::infinite(),
        }
    }

    /// Key of the root composite.
    pub fn root(&self) -> CompositeKey {
        self.root
    }

    /// Add a child composite under a parent.
    pub fn add_composite(&mut self, parent: CompositeKey, label: &str) -> CompositeKey {
        log::debug!("adding composite '{label}' to the world");

        let key = self.composites.insert(Composite {
            parent: Some(parent),
            label: label.to_string(),
            ..Composite::default()
        });
        if let Some(parent) = self.composites.get_mut(parent) {
            parent.children.push(key);
        }
        self.set_modified(parent, true, true, false);

        key
    }

    /// Remove a composite and everything inside it.
    pub fn remove_composite(&mut self, key: CompositeKey) {
        if key == self.root {
            return;
        }

        // Drop the whole subtree from the arenas
        for body in self.all_bodies_of(key) {
            self.bodies.remove(body);
        }
        for constraint in self.all_constraints_of(key) {
            self.constraints.remove(constraint);
        }

        let mut stack = vec![key];
        while let Some(composite_key) = stack.pop() {
            if let Some(composite) = self.composites.remove(composite_key) {
                log::debug!("removing composite '{}' from the world", composite.label);
                stack.extend(composite.children);

                if let Some(parent) = composite.parent.and_then(|p| self.composites.get_mut(p)) {
                    parent.children.retain(|&child| child != composite_key);
                }
            }
        }

        self.set_modified(self.root, true, false, false);
    }

    /// Add a body to the root composite.
    pub fn add_body(&mut self, body: Body) -> BodyKey {
        self.add_body_to(self.root, body)
    }

    /// Add a body to a specific composite.
    pub fn add_body_to(&mut self, composite: CompositeKey, body: Body) -> BodyKey {
        log::debug!("adding body {} to the world", body.id());

        let key = self.bodies.insert(body);
        if let Some(composite) = self.composites.get_mut(composite) {
            composite.bodies.push(key);
        }
        self.set_modified(composite, true, true, false);

        key
    }

    /// Remove a body from whatever composite holds it.
    pub fn remove_body(&mut self, key: BodyKey) {
        let holder = self
            .composites
            .iter()
            .find(|(_, composite)| composite.bodies.contains(&key))
            .map(|(composite_key, _)| composite_key);

        if let Some(holder) = holder {
            if let Some(composite) = self.composites.get_mut(holder) {
                composite.bodies.retain(|&body| body != key);
            }
            self.set_modified(holder, true, true, false);
        }

        self.bodies.remove(key);
    }

    /// Resolve constraint options and add the constraint to the root.
    pub fn add_constraint(&mut self, options: ConstraintOptions) -> ConstraintKey {
        self.add_constraint_to(self.root, options)
    }

    /// Resolve constraint options and add the constraint to a composite.
    pub fn add_constraint_to(
        &mut self,
        composite: CompositeKey,
        options: ConstraintOptions,
    ) -> ConstraintKey {
        let constraint = Constraint::from_options(options, &self.bodies);
        let key = self.constraints.insert(constraint);

        if let Some(composite) = self.composites.get_mut(composite) {
            composite.constraints.push(key);
        }
        self.set_modified(composite, true, true, false);

        key
    }

    /// Remove a constraint from whatever composite holds it.
    pub fn remove_constraint(&mut self, key: ConstraintKey) {
        let holder = self
            .composites
            .iter()
            .find(|(_, composite)| composite.constraints.contains(&key))
            .map(|(composite_key, _)| composite_key);

        if let Some(holder) = holder {
            if let Some(composite) = self.composites.get_mut(holder) {
                composite.constraints.retain(|&constraint| constraint != key);
            }
            self.set_modified(holder, true, true, false);
        }

        self.constraints.remove(key);
    }

    /// Every body key in the tree, depth first from the root.
    pub fn all_bodies(&self) -> Vec<BodyKey> {
        self.all_bodies_of(self.root)
    }

    /// Every body key under a composite, depth first.
    pub fn all_bodies_of(&self, composite: CompositeKey) -> Vec<BodyKey> {
        let mut keys = Vec::new();
        self.walk(composite, &mut |node| keys.extend(node.bodies.iter().copied()));

        keys
    }

    /// Every constraint key in the tree, depth first from the root.
    pub fn all_constraints(&self) -> Vec<ConstraintKey> {
        self.all_constraints_of(self.root)
    }

    /// Every constraint key under a composite, depth first.
    pub fn all_constraints_of(&self, composite: CompositeKey) -> Vec<ConstraintKey> {
        let mut keys = Vec::new();
        self.walk(composite, &mut |node| {
            keys.extend(node.constraints.iter().copied())
        });

        keys
    }

    /// Depth first walk over a subtree.
    fn walk(&self, key: CompositeKey, visit: &mut impl FnMut(&Composite)) {
        let Some(composite) = self.composites.get(key) else {
            return;
        };

        visit(composite);
        for &child in composite.children.iter() {
            self.walk(child, visit);
        }
    }

    /// Look up a body.
    pub fn body(&self, key: BodyKey) -> Option<&Body> {
        self.bodies.get(key)
    }

    /// Look up a body mutably.
    pub fn body_mut(&mut self, key: BodyKey) -> Option<&mut Body> {
        self.bodies.get_mut(key)
    }

    /// Look up a constraint.
    pub fn constraint(&self, key: ConstraintKey) -> Option<&Constraint> {
        self.constraints.get(key)
    }

    /// Move every body under a composite by a delta.
    pub fn translate(&mut self, composite: CompositeKey, delta: Vec2<f64>) {
        for key in self.all_bodies_of(composite) {
            if let Some(body) = self.bodies.get_mut(key) {
                body.translate(delta);
            }
        }
    }

    /// Rotate every body under a composite around a world point.
    pub fn rotate(&mut self, composite: CompositeKey, rotation: f64, point: Vec2<f64>) {
        for key in self.all_bodies_of(composite) {
            if let Some(body) = self.bodies.get_mut(key) {
                body.set_position(math::rotate_about(body.position(), rotation, point));
                body.rotate(rotation, None);
            }
        }
    }

    /// Scale every body under a composite away from a world point.
    pub fn scale(&mut self, composite: CompositeKey, scale_x: f64, scale_y: f64, point: Vec2<f64>) {
        for key in self.all_bodies_of(composite) {
            if let Some(body) = self.bodies.get_mut(key) {
                let delta = body.position() - point;
                body.set_position(point + Vec2::new(delta.x * scale_x, delta.y * scale_y));
                body.scale(scale_x, scale_y, None);
            }
        }
    }

    /// Set or clear the dirty flag, optionally walking parents or children.
    pub fn set_modified(
        &mut self,
        key: CompositeKey,
        is_modified: bool,
        update_parents: bool,
        update_children: bool,
    ) {
        let Some(composite) = self.composites.get_mut(key) else {
            return;
        };
        composite.is_modified = is_modified;
        let parent = composite.parent;
        let children = composite.children.clone();

        if update_parents {
            if let Some(parent) = parent {
                self.set_modified(parent, is_modified, true, false);
            }
        }
        if update_children {
            for child in children {
                self.set_modified(child, is_modified, false, true);
            }
        }
    }

    /// Whether the tree changed structurally since the last step.
    pub fn is_modified(&self) -> bool {
        self.composites
            .get(self.root)
            .is_some_and(|root| root.is_modified)
    }

    /// World gravity.
    pub fn gravity(&self) -> Gravity {
        self.gravity
    }

    /// Change the world gravity.
    pub fn set_gravity(&mut self, gravity: Gravity) {
        self.gravity = gravity;
    }

    /// Broadphase clip bounds.
    pub fn bounds(&self) -> Aabr<f64> {
        self.bounds
    }

    /// Limit the broadphase to a rectangle; bodies outside are ignored.
    pub fn set_bounds(&mut self, bounds: Aabr<f64>) {
        self.bounds = bounds;
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
