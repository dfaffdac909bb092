//! Planar vector helpers shared by the geometry and solver code.

use vek::Vec2;

/// Cross product of two planar vectors, the z component of the 3D cross.
#[inline]
pub fn cross(a: Vec2<f64>, b: Vec2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Counter-clockwise perpendicular of a vector.
#[inline]
pub fn perp(v: Vec2<f64>) -> Vec2<f64> {
    Vec2::new(-v.y, v.x)
}

/// Rotate a point around an origin by an angle in radians.
#[inline]
pub fn rotate_about(point: Vec2<f64>, angle: f64, origin: Vec2<f64>) -> Vec2<f64> {
    let (sin, cos) = angle.sin_cos();
    let delta = point - origin;

    Vec2::new(
        origin.x + (delta.x * cos - delta.y * sin),
        origin.y + (delta.x * sin + delta.y * cos),
    )
}

/// Normalize a vector, falling back to zero for degenerate input.
#[inline]
pub fn normalize_or_zero(v: Vec2<f64>) -> Vec2<f64> {
    v.try_normalized().unwrap_or_else(Vec2::zero)
}

#[cfg(test)]
mod tests {
    use vek::Vec2;

    use super::{cross, perp, rotate_about};

    /// Test the planar cross product sign convention.
    #[test]
    fn test_cross() {
        assert_eq!(cross(Vec2::unit_x(), Vec2::unit_y()), 1.0);
        assert_eq!(cross(Vec2::unit_y(), Vec2::unit_x()), -1.0);
    }

    /// Test that the perpendicular is a quarter rotation.
    #[test]
    fn test_perp() {
        assert_eq!(perp(Vec2::new(1.0, 0.0)), Vec2::new(0.0, 1.0));
        assert_eq!(perp(Vec2::new(0.0, 1.0)), Vec2::new(-1.0, 0.0));
    }

    /// Test rotating a point about an arbitrary origin.
    #[test]
    fn test_rotate_about() {
        let rotated = rotate_about(
            Vec2::new(2.0, 1.0),
            std::f64::consts::FRAC_PI_2,
            Vec2::new(1.0, 1.0),
        );

        assert!((rotated - Vec2::new(1.0, 2.0)).magnitude() < 1e-12);
    }
}
