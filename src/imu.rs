// Measurement assembly from raw IMU readings
//
// Converts accelerometer X/Y readings into a crank angle and packs it with
// the gyro rate into the filter's measurement vector. The accelerometer
// sees gravity rotate through its X/Y plane as the crank turns, so the
// angle falls out of a quadrant-aware arctangent.

use nalgebra as na;
use na::Vector2;
use std::f64::consts::{FRAC_PI_2, PI};

/// Crank angle in radians from accelerometer X/Y components
///
/// Quadrant-aware arctangent with an explicit branch for `x == 0`, where
/// straight up reads `+pi/2` and straight down `-pi/2` (a plain `atan2`
/// would return 0 for a zero vector). Output is in (-pi, pi].
pub fn accel_angle(x: f64, y: f64) -> f64 {
    if x != 0.0 {
        // Most cases, avoiding any chance of divide by zero.
        let angle = (y / x).atan();
        if x > 0.0 {
            // First or fourth quadrants
            angle
        } else if y >= 0.0 {
            // Second quadrant
            PI + angle
        } else {
            // Third quadrant
            -PI + angle
        }
    } else if y >= 0.0 {
        // Straight up.
        FRAC_PI_2
    } else {
        // Straight down.
        -FRAC_PI_2
    }
}

/// Remove the centripetal component from an accelerometer reading
///
/// An IMU mounted `radius` metres from the axis of rotation measures an
/// extra `radius * omega^2` along the crank arm; subtracting happens by
/// passing a negative radius for the mirrored axis.
pub fn correct_centripetal(reading: f64, radius: f64, omega: f64) -> f64 {
    reading + radius * omega * omega
}

/// Pack corrected accelerometer components and a gyro rate into a
/// `[theta_accel, omega_gyro]` measurement vector
pub fn measurement(accel_x: f64, accel_y: f64, gyro_rate: f64) -> Vector2<f64> {
    Vector2::new(accel_angle(accel_x, accel_y), gyro_rate)
}
