//! Edge normals of a polygon, used as candidate separating axes.

use itertools::Itertools;
use vek::Vec2;

use crate::{geometry::vertices::Vertex, math};

/// Unit edge normals of a vertex ring, deduplicated by gradient.
///
/// Parallel edges project identically, so a rectangle ends up with two axes
/// instead of four.
pub fn from_vertices(vertices: &[Vertex]) -> Vec<Vec2<f64>> {
    let mut axes = Vec::with_capacity(vertices.len());
    let mut gradients: Vec<i64> = Vec::with_capacity(vertices.len());

    for (a, b) in vertices.iter().circular_tuple_windows() {
        let normal = math::normalize_or_zero(Vec2::new(
            b.point.y - a.point.y,
            a.point.x - b.point.x,
        ));
        let gradient = if normal.y == 0.0 {
            f64::INFINITY
        } else {
            normal.x / normal.y
        };

        // Key on a fixed precision so near-parallel edges collapse to one axis
        let key = (gradient * 1000.0).round() as i64;
        if !gradients.contains(&key) {
            gradients.push(key);
            axes.push(normal);
        }
    }

    axes
}

/// Rotate all axes in place.
pub fn rotate(axes: &mut [Vec2<f64>], angle: f64) {
    if angle == 0.0 {
        return;
    }

    let (sin, cos) = angle.sin_cos();
    for axis in axes.iter_mut() {
        *axis = Vec2::new(axis.x * cos - axis.y * sin, axis.x * sin + axis.y * cos);
    }
}

#[cfg(test)]
mod tests {
    use vek::Vec2;

    use crate::geometry::vertices;

    use super::*;

    /// Test that a rectangle keeps only its two unique normals.
    #[test]
    fn test_rectangle_axes_deduplicated() {
        let ring = vertices::create(&[
            Vec2::new(-2.0, -1.0),
            Vec2::new(2.0, -1.0),
            Vec2::new(2.0, 1.0),
            Vec2::new(-2.0, 1.0),
        ]);

        let axes = from_vertices(&ring);
        assert_eq!(axes.len(), 2);
        for axis in &axes {
            assert!((axis.magnitude() - 1.0).abs() < 1e-12);
        }
    }

    /// Test that rotating axes preserves unit length.
    #[test]
    fn test_rotate_preserves_length() {
        let ring = vertices::create(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(3.0, 0.0),
            Vec2::new(0.0, 4.0),
        ]);

        let mut axes = from_vertices(&ring);
        rotate(&mut axes, 1.1);

        for axis in &axes {
            assert!((axis.magnitude() - 1.0).abs() < 1e-12);
        }
    }
}
