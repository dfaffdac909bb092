//! The engine: owns the world and caches, runs the step pipeline.

use serde::Deserialize;
use slotmap::SlotMap;

use crate::{
    body::{Body, BodyKey},
    collision::{detector, grid::Grid, pairs::Pairs, Collision},
    constraint, sleeping,
    solver::{position, velocity},
    world::{Gravity, World},
};

/// Tuning knobs of the simulation, loadable from a settings file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Iterations of the positional impulse solver per step.
    pub position_iterations: u32,
    /// Iterations of the velocity impulse solver per step.
    pub velocity_iterations: u32,
    /// Iterations of the constraint solver per pass.
    pub constraint_iterations: u32,
    /// Whether bodies at rest are put to sleep.
    pub enable_sleeping: bool,
    /// Scale applied to the wall clock delta.
    pub time_scale: f64,
    /// Broadphase cell width in world units.
    pub bucket_width: f64,
    /// Broadphase cell height in world units.
    pub bucket_height: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            position_iterations: 6,
            velocity_iterations: 4,
            constraint_iterations: 2,
            enable_sleeping: false,
            time_scale: 1.0,
            bucket_width: 48.0,
            bucket_height: 48.0,
        }
    }
}

/// Simulation clock.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Accumulated simulation time in milliseconds.
    pub timestamp: f64,
    /// Scale applied to every delta, zero freezes the simulation.
    pub time_scale: f64,
}

/// The simulation: world state, broadphase grid and pair cache.
pub struct Engine {
    world: World,
    grid: Grid,
    pairs: Pairs,
    /// Narrowphase scratch, reused across steps.
    collisions: Vec<Collision>,
    timing: Timing,
    position_iterations: u32,
    velocity_iterations: u32,
    constraint_iterations: u32,
    enable_sleeping: bool,
}

impl Engine {
    /// Construct an engine with an empty world.
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_world(settings, World::new())
    }

    /// Construct an engine around an existing world.
    pub fn with_world(settings: EngineSettings, world: World) -> Self {
        Self {
            world,
            grid: Grid::new(settings.bucket_width, settings.bucket_height),
            pairs: Pairs::new(),
            collisions: Vec::new(),
            timing: Timing {
                timestamp: 0.0,
                time_scale: settings.time_scale,
            },
            position_iterations: settings.position_iterations,
            velocity_iterations: settings.velocity_iterations,
            constraint_iterations: settings.constraint_iterations,
            enable_sleeping: settings.enable_sleeping,
        }
    }

    /// Advance the simulation by a wall clock delta in milliseconds.
    ///
    /// The correction factor implements time corrected Verlet: pass the
    /// ratio of this delta to the previous one, or 1 for a fixed timestep.
    pub fn update(&mut self, delta: f64, correction: f64) {
        puffin::profile_function!();

        self.timing.timestamp += delta * self.timing.time_scale;
        let timestamp = self.timing.timestamp;
        let time_scale = self.timing.time_scale;

        let body_keys = self.world.all_bodies();
        let constraint_keys = self.world.all_constraints();

        let enable_sleeping = self.enable_sleeping;
        let position_iterations = self.position_iterations;
        let velocity_iterations = self.velocity_iterations;
        let constraint_iterations = self.constraint_iterations;
        let Self {
            world,
            grid,
            pairs,
            collisions,
            ..
        } = self;
        let gravity = world.gravity();
        let world_bounds = world.bounds();

        if enable_sleeping {
            puffin::profile_scope!("Sleeping update");

            sleeping::update(&mut world.bodies, &body_keys, time_scale);
        }

        {
            puffin::profile_scope!("Apply gravity");

            apply_gravity(&mut world.bodies, &body_keys, gravity);
        }

        {
            puffin::profile_scope!("Integrate bodies");

            update_bodies(&mut world.bodies, &body_keys, delta, time_scale, correction);
        }

        {
            puffin::profile_scope!("Constraints first pass");

            constraint::pre_solve_all(&mut world.bodies, &body_keys);
            for _ in 0..constraint_iterations {
                constraint::solve_all(
                    &mut world.constraints,
                    &constraint_keys,
                    &mut world.bodies,
                    time_scale,
                );
            }
            constraint::post_solve_all(&mut world.bodies, &body_keys);
        }

        {
            puffin::profile_scope!("Broadphase");

            // A structurally changed world invalidates the whole grid
            let forced = world.is_modified();
            if forced {
                log::debug!("world modified, rebuilding broadphase grid");
                grid.clear();
            }

            grid.update(&mut world.bodies, &body_keys, &world_bounds, forced);

            if forced {
                let root = world.root();
                world.set_modified(root, false, false, true);
            }
        }

        {
            puffin::profile_scope!("Narrowphase");

            detector::collisions(collisions, grid.pairs_list(), &world.bodies, pairs);
        }

        {
            puffin::profile_scope!("Update pair cache");

            pairs.update(collisions.drain(..), &world.bodies, timestamp);
            pairs.remove_old(&world.bodies, timestamp);
        }

        if enable_sleeping {
            puffin::profile_scope!("Wake colliding sleepers");

            sleeping::after_collisions(pairs, &mut world.bodies, time_scale);
        }

        {
            puffin::profile_scope!("Position solver");

            position::pre_solve(pairs, &mut world.bodies);
            for _ in 0..position_iterations {
                position::solve(pairs, &mut world.bodies, time_scale);
            }
            position::post_solve(&mut world.bodies, &body_keys);
        }

        {
            puffin::profile_scope!("Constraints second pass");

            constraint::pre_solve_all(&mut world.bodies, &body_keys);
            for _ in 0..constraint_iterations {
                constraint::solve_all(
                    &mut world.constraints,
                    &constraint_keys,
                    &mut world.bodies,
                    time_scale,
                );
            }
            constraint::post_solve_all(&mut world.bodies, &body_keys);
        }

        {
            puffin::profile_scope!("Velocity solver");

            velocity::pre_solve(pairs, &mut world.bodies);
            for _ in 0..velocity_iterations {
                velocity::solve(pairs, &mut world.bodies, time_scale);
            }
        }

        {
            puffin::profile_scope!("Clear forces");

            clear_forces(&mut world.bodies, &body_keys);
        }
    }

    /// Drop every cached pair and rebuild the broadphase from scratch.
    pub fn clear(&mut self) {
        let body_keys = self.world.all_bodies();
        let world_bounds = self.world.bounds();

        self.pairs.clear();
        self.grid.clear();
        self.grid
            .update(&mut self.world.bodies, &body_keys, &world_bounds, true);
    }

    /// The simulated world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The simulated world, mutable for setup and queries.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The pair cache with this step's start/active/end sets.
    pub fn pairs(&self) -> &Pairs {
        &self.pairs
    }

    /// The simulation clock.
    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// Change the simulation speed, zero pauses it.
    pub fn set_time_scale(&mut self, time_scale: f64) {
        self.timing.time_scale = time_scale;
    }
}

/// Accumulate the gravity force on every dynamic body.
fn apply_gravity(bodies: &mut SlotMap<BodyKey, Body>, keys: &[BodyKey], gravity: Gravity) {
    if (gravity.x == 0.0 && gravity.y == 0.0) || gravity.scale == 0.0 {
        return;
    }

    for &key in keys {
        let Some(body) = bodies.get_mut(key) else {
            continue;
        };
        if body.is_static() || body.is_sleeping() {
            continue;
        }

        body.force.x += body.mass() * gravity.x * gravity.scale;
        body.force.y += body.mass() * gravity.y * gravity.scale;
    }
}

/// Integrate every dynamic body one step.
fn update_bodies(
    bodies: &mut SlotMap<BodyKey, Body>,
    keys: &[BodyKey],
    delta: f64,
    time_scale: f64,
    correction: f64,
) {
    for &key in keys {
        let Some(body) = bodies.get_mut(key) else {
            continue;
        };
        if body.is_static() || body.is_sleeping() {
            continue;
        }

        body.update(delta, time_scale, correction);
    }
}

/// Zero the force and torque accumulators at the end of the step.
fn clear_forces(bodies: &mut SlotMap<BodyKey, Body>, keys: &[BodyKey]) {
    for &key in keys {
        if let Some(body) = bodies.get_mut(key) {
            body.force = vek::Vec2::zero();
            body.torque = 0.0;
        }
    }
}
