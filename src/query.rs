//! Read-only queries against world bodies: hit tests, rays and regions.

use vek::{Aabr, Vec2};

use crate::{
    body::{Body, BodyKey, BodyOptions},
    collision::{sat, Collision, PartHandle},
    geometry::{bounds, vertices},
    world::World,
};

/// All collisions between one body and a set of candidates.
///
/// Each candidate reports at most one collision, from its first overlapping
/// part.
pub fn collides(world: &World, body: BodyKey, candidates: &[BodyKey]) -> Vec<Collision> {
    let Some(body_ref) = world.body(body) else {
        return Vec::new();
    };

    collides_with(body_ref, body, world, candidates)
}

/// Cast a thin rectangle between two points and report everything it hits.
///
/// The ray itself is a throwaway body outside the world; in the returned
/// collisions it carries a null body key, the other side is the hit body.
pub fn ray(
    world: &World,
    candidates: &[BodyKey],
    start: Vec2<f64>,
    end: Vec2<f64>,
    width: Option<f64>,
) -> Vec<Collision> {
    let width = width.unwrap_or(1e-100);
    let length = (end - start).magnitude();
    let angle = (end.y - start.y).atan2(end.x - start.x);
    let midpoint = (start + end) * 0.5;

    let (half_length, half_width) = (length / 2.0, width / 2.0);
    let ray_body = Body::from_vertices(
        midpoint,
        &[
            Vec2::new(-half_length, -half_width),
            Vec2::new(half_length, -half_width),
            Vec2::new(half_length, half_width),
            Vec2::new(-half_length, half_width),
        ],
        BodyOptions {
            angle,
            ..BodyOptions::default()
        },
    );

    match ray_body {
        Ok(ray_body) => collides_with(&ray_body, BodyKey::default(), world, candidates),
        // A degenerate ray (zero length) hits nothing
        Err(_) => Vec::new(),
    }
}

/// Bodies whose bounds overlap a region, or all bodies outside it.
pub fn region(
    world: &World,
    candidates: &[BodyKey],
    region: &Aabr<f64>,
    outside: bool,
) -> Vec<BodyKey> {
    candidates
        .iter()
        .copied()
        .filter(|&key| {
            world
                .body(key)
                .is_some_and(|body| bounds::overlaps(&body.bounds(), region) != outside)
        })
        .collect()
}

/// Bodies containing a world point.
pub fn point(world: &World, candidates: &[BodyKey], point: Vec2<f64>) -> Vec<BodyKey> {
    candidates
        .iter()
        .copied()
        .filter(|&key| {
            let Some(body) = world.body(key) else {
                return false;
            };
            if !bounds::contains(&body.bounds(), point) {
                return false;
            }

            let start = if body.parts().len() > 1 { 1 } else { 0 };
            body.parts()[start..].iter().any(|part| {
                bounds::contains(&part.bounds, point) && vertices::contains(&part.vertices, point)
            })
        })
        .collect()
}

/// SAT a free-standing body against world candidates.
fn collides_with(
    body: &Body,
    body_key: BodyKey,
    world: &World,
    candidates: &[BodyKey],
) -> Vec<Collision> {
    let mut collisions = Vec::new();
    let body_handle = PartHandle {
        body: body_key,
        part: 0,
    };

    for &other_key in candidates {
        let Some(other) = world.body(other_key) else {
            continue;
        };
        if other_key == body_key || !bounds::overlaps(&other.bounds(), &body.bounds()) {
            continue;
        }

        let start = if other.parts().len() > 1 { 1 } else { 0 };
        for part_index in start..other.parts().len() {
            let part = &other.parts()[part_index];
            if !bounds::overlaps(&part.bounds, &body.bounds()) {
                continue;
            }

            let other_handle = PartHandle {
                body: other_key,
                part: part_index,
            };
            if let Some(collision) = sat::collides(other, other_handle, body, body_handle, None) {
                collisions.push(collision);
                break;
            }
        }
    }

    collisions
}
