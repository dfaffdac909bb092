//! 2D rigid body physics engine with sequential impulse solvers.
//!
//! Bodies are convex polygons integrated with time corrected Verlet, so a
//! body's velocity is implied by `position - position_prev`. Every
//! [`Engine::update`] runs the step pipeline:
//!
//! 1. Advance the simulation clock
//! 2. Update sleeping states (when enabled)
//! 3. Apply gravity and integrate bodies
//! 4. Solve distance constraints
//! 5. Broadphase over a uniform spatial hash grid
//! 6. SAT narrowphase with contact synthesis
//! 7. Fold collisions into the persistent pair cache
//! 8. Solve positions, constraints again, then velocities with warm
//!    started sequential impulses
//! 9. Clear force accumulators
//!
//! The solvers never fail: degenerate input is clamped and skipped, bad
//! geometry is rejected once at body construction.

pub mod body;
pub mod collision;
pub mod constraint;
pub mod engine;
pub mod geometry;
pub mod math;
pub mod query;
pub mod sleeping;
pub mod solver;
pub mod world;

pub use body::{Body, BodyKey, BodyOptions, CollisionFilter, InvalidBody};
pub use collision::{pair::Pair, pairs::Pairs, Collision};
pub use constraint::{Constraint, ConstraintKey, ConstraintOptions};
pub use engine::{Engine, EngineSettings};
pub use world::{CompositeKey, Gravity, World};
