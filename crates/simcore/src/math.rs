//! Scalar helpers shared by the balance and steering models.

/// Wraps an angle in degrees to (-180, 180].
pub fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 { wrapped - 360.0 } else { wrapped }
}

/// Linear interpolation with `t` clamped to [0, 1].
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t.clamp(0.0, 1.0)
}

/// Interpolates between two angles in degrees along the shortest arc.
pub fn lerp_angle(a: f64, b: f64, t: f64) -> f64 {
    let mut delta = (b - a).rem_euclid(360.0);
    if delta > 180.0 {
        delta -= 360.0;
    }
    a + delta * t.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_degrees_half_open_interval() {
        assert!((wrap_degrees(180.0) - 180.0).abs() < 1e-12);
        assert!((wrap_degrees(-180.0) - 180.0).abs() < 1e-12);
        assert!((wrap_degrees(350.0) - (-10.0)).abs() < 1e-12);
        assert!((wrap_degrees(-370.0) - (-10.0)).abs() < 1e-12);
        assert!((wrap_degrees(45.0) - 45.0).abs() < 1e-12);
    }

    #[test]
    fn test_lerp_clamps_parameter() {
        assert!((lerp(15.0, 75.0, 0.5) - 45.0).abs() < 1e-12);
        assert!((lerp(15.0, 75.0, 3.0) - 75.0).abs() < 1e-12);
        assert!((lerp(15.0, 75.0, -1.0) - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_lerp_angle_takes_short_way() {
        assert!((lerp_angle(35.0, 5.0, 0.5) - 20.0).abs() < 1e-12);
        assert!((lerp_angle(350.0, 10.0, 0.5) - 360.0).abs() < 1e-12);
    }
}
