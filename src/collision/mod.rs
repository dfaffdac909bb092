//! Collision detection: broadphase grid, SAT narrowphase and the pair cache.

pub mod detector;
pub mod grid;
pub mod pair;
pub mod pairs;
pub mod sat;

use arrayvec::ArrayVec;
use vek::Vec2;

use crate::body::{Body, BodyKey};

/// Reference to one part of a body in the world arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartHandle {
    /// Owning body.
    pub body: BodyKey,
    /// Index into the body's part list.
    pub part: usize,
}

/// Stable, order-comparable identity of a part.
///
/// Built from the body's monotonic id so pair keys are canonical no matter
/// which side a part entered the detector on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartId {
    /// Monotonic id of the owning body.
    pub body: u64,
    /// Index of the part.
    pub part: u32,
}

impl PartId {
    /// Identity of a part of a body.
    pub fn new(body: &Body, part: usize) -> Self {
        Self {
            body: body.id(),
            part: part as u32,
        }
    }
}

/// Support vertex of a collision, identified by its owning part and ring index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportVertex {
    /// Part the vertex belongs to.
    pub part: PartHandle,
    /// Index in the part's vertex ring.
    pub vertex: u32,
}

/// Transient per-step record of two overlapping parts.
///
/// `part_a`/`part_b` are ordered canonically by part id. The normal points
/// against the centre axis from A to B, which makes an approach read as
/// negative velocity along it in the solver.
#[derive(Debug, Clone)]
pub struct Collision {
    /// First colliding part, the one with the lower id.
    pub part_a: PartHandle,
    /// Second colliding part.
    pub part_b: PartHandle,
    /// Body owning `part_a`.
    pub parent_a: BodyKey,
    /// Body owning `part_b`.
    pub parent_b: BodyKey,
    /// Unit collision normal.
    pub normal: Vec2<f64>,
    /// Perpendicular of the normal.
    pub tangent: Vec2<f64>,
    /// Overlap depth along the normal.
    pub depth: f64,
    /// Normal scaled by the depth.
    pub penetration: Vec2<f64>,
    /// One or two deepest contact vertices.
    pub supports: ArrayVec<SupportVertex, 2>,
    /// Part whose axis produced the minimum overlap, for coherence reuse.
    pub axis_part: PartHandle,
    /// Index of that axis in the part's axis list.
    pub axis_number: usize,
}
