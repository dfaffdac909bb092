//! Operations on convex polygon vertex rings.
//!
//! Vertices are stored in clockwise order and carry their position in the
//! ring, which gives contact points a stable identity across steps.

use std::cmp::Ordering;

use itertools::Itertools;
use vek::Vec2;

use crate::math;

/// Single vertex of a polygon ring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// World position.
    pub point: Vec2<f64>,
    /// Position in the ring.
    ///
    /// Stays stable over the lifetime of the body so it can identify contacts.
    pub index: u32,
}

/// Wrap raw points into an indexed vertex ring.
pub fn create(points: &[Vec2<f64>]) -> Vec<Vertex> {
    points
        .iter()
        .enumerate()
        .map(|(index, point)| Vertex {
            point: *point,
            index: index as u32,
        })
        .collect()
}

/// Area of the polygon.
///
/// The signed variant keeps the winding sign, positive for clockwise rings.
pub fn area(vertices: &[Vertex], signed: bool) -> f64 {
    let mut area = 0.0;
    let mut j = vertices.len() - 1;

    for i in 0..vertices.len() {
        area += (vertices[j].point.x - vertices[i].point.x)
            * (vertices[j].point.y + vertices[i].point.y);
        j = i;
    }

    if signed {
        area / 2.0
    } else {
        area.abs() / 2.0
    }
}

/// Centre of mass of the polygon.
pub fn centre(vertices: &[Vertex]) -> Vec2<f64> {
    let area = area(vertices, true);
    let mut centre = Vec2::zero();

    for (a, b) in vertices.iter().circular_tuple_windows() {
        let cross = math::cross(a.point, b.point);
        centre += (a.point + b.point) * cross;
    }

    centre / (6.0 * area)
}

/// Average of all vertex positions.
pub fn mean(vertices: &[Vertex]) -> Vec2<f64> {
    let mut sum = Vec2::zero();
    for vertex in vertices {
        sum += vertex.point;
    }

    sum / vertices.len() as f64
}

/// Moment of inertia of the polygon for a given mass.
pub fn inertia(vertices: &[Vertex], mass: f64) -> f64 {
    let mut numerator = 0.0;
    let mut denominator = 0.0;

    for (v, w) in vertices.iter().circular_tuple_windows() {
        let cross = math::cross(w.point, v.point).abs();
        numerator += cross
            * (w.point.dot(w.point) + w.point.dot(v.point) + v.point.dot(v.point));
        denominator += cross;
    }

    (mass / 6.0) * (numerator / denominator)
}

/// Move every vertex by a delta.
pub fn translate(vertices: &mut [Vertex], delta: Vec2<f64>) {
    for vertex in vertices.iter_mut() {
        vertex.point += delta;
    }
}

/// Rotate every vertex around an origin.
pub fn rotate(vertices: &mut [Vertex], angle: f64, origin: Vec2<f64>) {
    if angle == 0.0 {
        return;
    }

    let (sin, cos) = angle.sin_cos();
    for vertex in vertices.iter_mut() {
        let delta = vertex.point - origin;
        vertex.point = Vec2::new(
            origin.x + (delta.x * cos - delta.y * sin),
            origin.y + (delta.x * sin + delta.y * cos),
        );
    }
}

/// Scale every vertex away from an origin point.
pub fn scale(vertices: &mut [Vertex], scale_x: f64, scale_y: f64, origin: Vec2<f64>) {
    if scale_x == 1.0 && scale_y == 1.0 {
        return;
    }

    for vertex in vertices.iter_mut() {
        let delta = vertex.point - origin;
        vertex.point = origin + Vec2::new(delta.x * scale_x, delta.y * scale_y);
    }
}

/// Whether a point lies inside the polygon, boundary included.
///
/// Assumes a clockwise ring.
pub fn contains(vertices: &[Vertex], point: Vec2<f64>) -> bool {
    for (vertex, next) in vertices.iter().circular_tuple_windows() {
        if (point.x - vertex.point.x) * (next.point.y - vertex.point.y)
            + (point.y - vertex.point.y) * (vertex.point.x - next.point.x)
            > 0.0
        {
            return false;
        }
    }

    true
}

/// Sort the ring clockwise around its mean and renumber the indices.
pub fn clockwise_sort(vertices: &mut Vec<Vertex>) {
    let centre = mean(vertices);

    vertices.sort_by(|a, b| {
        let angle_a = (a.point.y - centre.y).atan2(a.point.x - centre.x);
        let angle_b = (b.point.y - centre.y).atan2(b.point.x - centre.x);

        angle_a.partial_cmp(&angle_b).unwrap_or(Ordering::Equal)
    });

    reindex(vertices);
}

/// Whether the ring forms a convex polygon.
///
/// Returns `None` when the ring is degenerate (collinear or too small).
pub fn is_convex(vertices: &[Vertex]) -> Option<bool> {
    // http://paulbourke.net/geometry/polygonmesh/
    let n = vertices.len();
    if n < 3 {
        return None;
    }

    let mut flag = 0;
    for i in 0..n {
        let j = (i + 1) % n;
        let k = (i + 2) % n;

        let edge_a = vertices[j].point - vertices[i].point;
        let edge_b = vertices[k].point - vertices[j].point;
        let z = math::cross(edge_a, edge_b);

        if z < 0.0 {
            flag |= 1;
        } else if z > 0.0 {
            flag |= 2;
        }

        if flag == 3 {
            return Some(false);
        }
    }

    if flag != 0 {
        Some(true)
    } else {
        None
    }
}

/// Convex hull of the vertices as a new renumbered ring.
pub fn hull(vertices: &[Vertex]) -> Vec<Vertex> {
    // http://geomalgorithms.com/a10-_hull-1.html
    let mut sorted = vertices.to_vec();
    sorted.sort_by(|a, b| {
        a.point
            .x
            .partial_cmp(&b.point.x)
            .unwrap_or(Ordering::Equal)
            .then(a.point.y.partial_cmp(&b.point.y).unwrap_or(Ordering::Equal))
    });

    let cross3 = |a: &Vertex, b: &Vertex, c: &Vertex| {
        math::cross(b.point - a.point, c.point - a.point)
    };

    let mut lower: Vec<Vertex> = Vec::new();
    for vertex in sorted.iter() {
        while lower.len() >= 2 && cross3(&lower[lower.len() - 2], &lower[lower.len() - 1], vertex) <= 0.0
        {
            lower.pop();
        }
        lower.push(*vertex);
    }

    let mut upper: Vec<Vertex> = Vec::new();
    for vertex in sorted.iter().rev() {
        while upper.len() >= 2 && cross3(&upper[upper.len() - 2], &upper[upper.len() - 1], vertex) <= 0.0
        {
            upper.pop();
        }
        upper.push(*vertex);
    }

    upper.pop();
    lower.pop();

    let mut hull = upper;
    hull.append(&mut lower);
    reindex(&mut hull);

    hull
}

/// Renumber the ring after a structural change.
fn reindex(vertices: &mut [Vertex]) {
    for (index, vertex) in vertices.iter_mut().enumerate() {
        vertex.index = index as u32;
    }
}
