//! Axis-aligned bounding boxes over vertex rings.

use vek::{Aabr, Vec2};

use crate::geometry::vertices::Vertex;

/// Empty bounds that any vertex will expand.
pub fn empty() -> Aabr<f64> {
    Aabr {
        min: Vec2::broadcast(f64::INFINITY),
        max: Vec2::broadcast(f64::NEG_INFINITY),
    }
}

/// Bounds of a vertex ring without any velocity expansion.
pub fn from_vertices(vertices: &[Vertex]) -> Aabr<f64> {
    let mut bounds = empty();
    update(&mut bounds, vertices, Vec2::zero());

    bounds
}

/// Recompute bounds from a vertex ring, extended along the velocity.
///
/// The extension keeps fast bodies inside their broadphase cells for the
/// upcoming step.
pub fn update(bounds: &mut Aabr<f64>, vertices: &[Vertex], velocity: Vec2<f64>) {
    let mut min = Vec2::broadcast(f64::INFINITY);
    let mut max = Vec2::broadcast(f64::NEG_INFINITY);

    for vertex in vertices {
        min.x = min.x.min(vertex.point.x);
        min.y = min.y.min(vertex.point.y);
        max.x = max.x.max(vertex.point.x);
        max.y = max.y.max(vertex.point.y);
    }

    if velocity.x > 0.0 {
        max.x += velocity.x;
    } else {
        min.x += velocity.x;
    }
    if velocity.y > 0.0 {
        max.y += velocity.y;
    } else {
        min.y += velocity.y;
    }

    bounds.min = min;
    bounds.max = max;
}

/// Whether two bounds overlap, touching included.
pub fn overlaps(a: &Aabr<f64>, b: &Aabr<f64>) -> bool {
    a.min.x <= b.max.x && a.max.x >= b.min.x && a.min.y <= b.max.y && a.max.y >= b.min.y
}

/// Whether a point lies inside the bounds, boundary included.
pub fn contains(bounds: &Aabr<f64>, point: Vec2<f64>) -> bool {
    point.x >= bounds.min.x
        && point.x <= bounds.max.x
        && point.y >= bounds.min.y
        && point.y <= bounds.max.y
}

/// Move the bounds by a delta.
pub fn translate(bounds: &mut Aabr<f64>, delta: Vec2<f64>) {
    bounds.min += delta;
    bounds.max += delta;
}

/// Bounds covering the whole plane.
pub fn infinite() -> Aabr<f64> {
    Aabr {
        min: Vec2::broadcast(f64::NEG_INFINITY),
        max: Vec2::broadcast(f64::INFINITY),
    }
}

#[cfg(test)]
mod tests {
    use vek::Vec2;

    use crate::geometry::vertices;

    use super::*;

    /// Test bounds from a ring and the velocity extension.
    #[test]
    fn test_update_with_velocity() {
        let ring = vertices::create(&[
            Vec2::new(-1.0, -2.0),
            Vec2::new(3.0, -2.0),
            Vec2::new(3.0, 4.0),
            Vec2::new(-1.0, 4.0),
        ]);

        let mut bounds = from_vertices(&ring);
        assert_eq!(bounds.min, Vec2::new(-1.0, -2.0));
        assert_eq!(bounds.max, Vec2::new(3.0, 4.0));

        update(&mut bounds, &ring, Vec2::new(2.0, -3.0));
        assert_eq!(bounds.min, Vec2::new(-1.0, -5.0));
        assert_eq!(bounds.max, Vec2::new(5.0, 4.0));
    }

    /// Test overlap checks for disjoint, touching and nested bounds.
    #[test]
    fn test_overlaps() {
        let a = Aabr {
            min: Vec2::new(0.0, 0.0),
            max: Vec2::new(2.0, 2.0),
        };
        let touching = Aabr {
            min: Vec2::new(2.0, 0.0),
            max: Vec2::new(4.0, 2.0),
        };
        let disjoint = Aabr {
            min: Vec2::new(2.1, 0.0),
            max: Vec2::new(4.0, 2.0),
        };

        assert!(overlaps(&a, &touching));
        assert!(!overlaps(&a, &disjoint));
        assert!(overlaps(&a, &a));
    }

    /// Test point containment with the boundary included.
    #[test]
    fn test_contains() {
        let bounds = Aabr {
            min: Vec2::new(-1.0, -1.0),
            max: Vec2::new(1.0, 1.0),
        };

        assert!(contains(&bounds, Vec2::zero()));
        assert!(contains(&bounds, Vec2::new(1.0, -1.0)));
        assert!(!contains(&bounds, Vec2::new(1.01, 0.0)));
    }
}
