//! Separating axis theorem narrowphase with temporal coherence.

use arrayvec::ArrayVec;
use vek::Vec2;

use crate::{
    body::Body,
    collision::{Collision, PartHandle, PartId, SupportVertex},
    geometry::vertices::{self, Vertex},
    math,
};

/// Combined motion below which the previously separating axis is retested
/// alone instead of running the full axis sweep.
const REUSE_MOTION_THRESHOLD: f64 = 0.2;

/// A polygon projected onto an axis.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Projection {
    /// Minimum projected value.
    min: f64,
    /// Maximum projected value.
    max: f64,
}

impl Projection {
    /// Project a vertex ring on an axis.
    fn project(vertices: &[Vertex], axis: Vec2<f64>) -> Self {
        let mut min = axis.dot(vertices[0].point);
        let mut max = min;

        for vertex in vertices.iter().skip(1) {
            let projection = axis.dot(vertex.point);

            if projection < min {
                min = projection;
            } else if projection > max {
                max = projection;
            }
        }

        Self { min, max }
    }

    /// Length of the overlapping interval with another projection.
    fn overlap(&self, other: Self) -> f64 {
        (self.max - other.min).min(other.max - self.min)
    }
}

/// Axis of least overlap found by a sweep.
#[derive(Debug, Clone, Copy)]
struct MinOverlap {
    overlap: f64,
    axis: Vec2<f64>,
    axis_number: usize,
}

/// Find the axis with the smallest projection overlap.
///
/// Stops early on the first separating axis.
fn overlap_axes(vertices_a: &[Vertex], vertices_b: &[Vertex], axes: &[Vec2<f64>]) -> MinOverlap {
    let mut result = MinOverlap {
        overlap: f64::MAX,
        axis: Vec2::zero(),
        axis_number: 0,
    };

    for (axis_number, axis) in axes.iter().enumerate() {
        let projection_a = Projection::project(vertices_a, *axis);
        let projection_b = Projection::project(vertices_b, *axis);
        let overlap = projection_a.overlap(projection_b);

        if overlap <= 0.0 {
            result.overlap = overlap;
            break;
        }

        if overlap < result.overlap {
            result = MinOverlap {
                overlap,
                axis: *axis,
                axis_number,
            };
        }
    }

    result
}

/// The nearest vertex of a ring along the collision normal and its better
/// projecting ring neighbour.
fn find_supports(part_position: Vec2<f64>, vertices: &[Vertex], normal: Vec2<f64>) -> (u32, u32) {
    let mut nearest_distance = f64::MAX;
    let mut vertex_a = 0;

    for (index, vertex) in vertices.iter().enumerate() {
        let distance = -normal.dot(vertex.point - part_position);
        if distance < nearest_distance {
            nearest_distance = distance;
            vertex_a = index;
        }
    }

    // Hill climb to the neighbour that projects deeper
    let count = vertices.len();
    let prev = (vertex_a + count - 1) % count;
    let next = (vertex_a + 1) % count;

    let prev_distance = -normal.dot(vertices[prev].point - part_position);
    let next_distance = -normal.dot(vertices[next].point - part_position);
    let vertex_b = if next_distance < prev_distance { next } else { prev };

    (vertex_a as u32, vertex_b as u32)
}

/// SAT test between two parts, returning contact information on overlap.
///
/// When a previous colliding result exists and the involved bodies barely
/// moved, only the previously separating axis is retested.
pub(crate) fn collides(
    body_a: &Body,
    handle_a: PartHandle,
    body_b: &Body,
    handle_b: PartHandle,
    previous: Option<&Collision>,
) -> Option<Collision> {
    puffin::profile_function!();

    let part_a = &body_a.parts()[handle_a.part];
    let part_b = &body_b.parts()[handle_b.part];

    let can_reuse = previous.is_some_and(|_| {
        let motion = body_a.speed() * body_a.speed()
            + body_a.angular_speed() * body_a.angular_speed()
            + body_b.speed() * body_b.speed()
            + body_b.angular_speed() * body_b.angular_speed();

        motion < REUSE_MOTION_THRESHOLD
    });

    // Retest only the axis that resolved the previous step, when the bodies
    // barely moved and the axis still exists
    let reused = previous.filter(|_| can_reuse).and_then(|previous| {
        let (axis_vertices, other_vertices, axis) = if previous.axis_part == handle_a {
            (
                &part_a.vertices,
                &part_b.vertices,
                part_a.axes.get(previous.axis_number)?,
            )
        } else {
            (
                &part_b.vertices,
                &part_a.vertices,
                part_b.axes.get(previous.axis_number)?,
            )
        };

        Some((
            overlap_axes(axis_vertices, other_vertices, &[*axis]),
            previous.axis_part,
            previous.axis_number,
        ))
    });

    let (min_overlap, axis_part, axis_number) = match reused {
        Some((min_overlap, axis_part, axis_number)) => {
            if min_overlap.overlap <= 0.0 {
                return None;
            }

            (min_overlap, axis_part, axis_number)
        }
        None => {
            // Full sweep over the axes of both parts
            let overlap_ab = overlap_axes(&part_a.vertices, &part_b.vertices, &part_a.axes);
            if overlap_ab.overlap <= 0.0 {
                return None;
            }

            let overlap_ba = overlap_axes(&part_b.vertices, &part_a.vertices, &part_b.axes);
            if overlap_ba.overlap <= 0.0 {
                return None;
            }

            if overlap_ab.overlap < overlap_ba.overlap {
                (overlap_ab, handle_a, overlap_ab.axis_number)
            } else {
                (overlap_ba, handle_b, overlap_ba.axis_number)
            }
        }
    };

    // Canonical order by part identity, independent of argument order
    let (handle_a, part_a, handle_b, part_b) =
        if PartId::new(body_a, handle_a.part) <= PartId::new(body_b, handle_b.part) {
            (handle_a, part_a, handle_b, part_b)
        } else {
            (handle_b, part_b, handle_a, part_a)
        };

    // Orient the normal against the centre axis from A to B
    let normal = if min_overlap
        .axis
        .dot(part_b.position - part_a.position)
        < 0.0
    {
        min_overlap.axis
    } else {
        -min_overlap.axis
    };
    let tangent = math::perp(normal);
    let depth = min_overlap.overlap;

    // Deepest vertices of B inside A, then of A inside B, then the nearest
    // vertex as a last resort
    let mut supports: ArrayVec<SupportVertex, 2> = ArrayVec::new();
    let (b_first, b_second) = find_supports(part_a.position, &part_b.vertices, normal);
    if vertices::contains(&part_a.vertices, part_b.vertices[b_first as usize].point) {
        supports.push(SupportVertex {
            part: handle_b,
            vertex: b_first,
        });
    }
    if vertices::contains(&part_a.vertices, part_b.vertices[b_second as usize].point) {
        supports.push(SupportVertex {
            part: handle_b,
            vertex: b_second,
        });
    }

    if supports.len() < 2 {
        let (a_first, a_second) = find_supports(part_b.position, &part_a.vertices, -normal);
        if vertices::contains(&part_b.vertices, part_a.vertices[a_first as usize].point) {
            supports.push(SupportVertex {
                part: handle_a,
                vertex: a_first,
            });
        }
        if supports.len() < 2
            && vertices::contains(&part_b.vertices, part_a.vertices[a_second as usize].point)
        {
            supports.push(SupportVertex {
                part: handle_a,
                vertex: a_second,
            });
        }
    }

    if supports.is_empty() {
        supports.push(SupportVertex {
            part: handle_b,
            vertex: b_first,
        });
    }

    Some(Collision {
        part_a: handle_a,
        part_b: handle_b,
        parent_a: handle_a.body,
        parent_b: handle_b.body,
        normal,
        tangent,
        depth,
        penetration: normal * depth,
        supports,
        axis_part,
        axis_number,
    })
}

#[cfg(test)]
mod tests {
    use vek::Vec2;

    use crate::body::{Body, BodyKey, BodyOptions};

    use super::*;

    /// Box body centred at a position.
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

    fn handle(part: usize) -> PartHandle {
        PartHandle {
            body: BodyKey::default(),
            part,
        }
    }

    /// Test that overlapping boxes collide with the expected depth.
    #[test]
    fn test_overlapping_boxes() {
        let a = box_body(0.0, 0.0, 20.0);
        let b = box_body(18.0, 0.0, 20.0);

        let collision = collides(&a, handle(0), &b, handle(0), None).unwrap();
        assert!((collision.depth - 2.0).abs() < 1e-9);
        assert_eq!(collision.supports.len(), 2);
        assert!((collision.normal.magnitude() - 1.0).abs() < 1e-12);
        // Normal points against the A to B axis
        assert!(collision.normal.dot(b.position() - a.position()) < 0.0);
    }

    /// Test that separated boxes do not collide.
    #[test]
    fn test_separated_boxes() {
        let a = box_body(0.0, 0.0, 20.0);
        let b = box_body(25.0, 0.0, 20.0);

        assert!(collides(&a, handle(0), &b, handle(0), None).is_none());
    }

    /// Test that swapping the arguments yields the same canonical result.
    #[test]
    fn test_swapped_arguments_agree() {
        let a = box_body(0.0, 0.0, 20.0);
        let b = box_body(15.0, 5.0, 20.0);

        let ab = collides(&a, handle(0), &b, handle(0), None).unwrap();
        let ba = collides(&b, handle(0), &a, handle(0), None).unwrap();

        assert!((ab.depth - ba.depth).abs() < 1e-12);
        assert_eq!(ab.normal, ba.normal);
        assert_eq!(ab.supports.len(), ba.supports.len());
    }

    /// Test that a body fully inside another still produces a contact.
    #[test]
    fn test_contained_body() {
        let outer = box_body(0.0, 0.0, 40.0);
        let inner = box_body(2.0, 1.0, 4.0);

        let collision = collides(&outer, handle(0), &inner, handle(0), None).unwrap();
        assert!(collision.depth > 0.0);
        assert!(!collision.supports.is_empty());
    }

    /// Test one axis reuse when nothing moved.
    #[test]
    fn test_coherence_reuse() {
        let a = box_body(0.0, 0.0, 20.0);
        let b = box_body(18.0, 0.0, 20.0);

        let first = collides(&a, handle(0), &b, handle(0), None).unwrap();
        let again = collides(&a, handle(0), &b, handle(0), Some(&first)).unwrap();

        assert!((first.depth - again.depth).abs() < 1e-12);
        assert_eq!(first.normal, again.normal);
    }
}
