// Two-state angle-aware Kalman filter
//
// Fuses an accelerometer-derived crank angle with a gyroscope rate using a
// constant-velocity model. The angle state lives on a circle, so the
// position is re-wrapped after every predict and update, and the innovation
// uses the circular difference instead of plain subtraction.

use nalgebra as na;
use na::{Matrix2, Vector2};

use crate::angles::{angle_diff, wrap_angle};
use crate::error::FilterError;
use super::linear::{Correction, LinearKalman, Prediction};

/// The angle-aware filter over `[theta, omega]`
///
/// `theta` is the crank position in radians, always held in (-pi, pi];
/// `omega` is the angular velocity in radians/second and is treated as an
/// ordinary linear state.
#[derive(Debug, Clone)]
pub struct AngleKalman {
    inner: LinearKalman<2>,
}

impl AngleKalman {
    /// Create a filter from its noise covariances
    ///
    /// # Arguments
    /// * `process_noise` - 2x2 Q matrix, uncertainty added per step
    /// * `measurement_noise` - 2x2 R matrix; the crank IMU tuning distrusts
    ///   the accelerometer angle heavily and trusts the gyro rate
    pub fn new(
        process_noise: Matrix2<f64>,
        measurement_noise: Matrix2<f64>,
    ) -> Result<Self, FilterError> {
        Ok(AngleKalman {
            inner: LinearKalman::new(process_noise, measurement_noise)?,
        })
    }

    /// Constant-velocity state transition for a time step in seconds
    pub fn transition(dt: f64) -> Matrix2<f64> {
        Matrix2::new(1.0, dt, 0.0, 1.0)
    }

    /// Predict the state `dt` seconds ahead
    ///
    /// `dt` must be non-negative; a step of zero degenerates the transition
    /// to the identity and the covariance still grows by Q. The predicted
    /// angle is wrapped back into (-pi, pi].
    pub fn predict(
        &self,
        state: &Vector2<f64>,
        covariance: &Matrix2<f64>,
        dt: f64,
    ) -> Result<Prediction<2>, FilterError> {
        let mut prediction = self.inner.predict(state, covariance, &Self::transition(dt))?;
        prediction.state[0] = wrap_angle(prediction.state[0])?;
        Ok(prediction)
    }

    /// Correct a prediction against a `[theta_accel, omega_gyro]` measurement
    ///
    /// The innovation is computed with the circular difference so a
    /// measurement just across the -pi/+pi boundary pulls the state the
    /// short way around. The corrected angle is wrapped again afterwards.
    pub fn update(
        &self,
        prediction: &Prediction<2>,
        measurement: &Vector2<f64>,
    ) -> Result<Correction<2>, FilterError> {
        let mut correction =
            self.inner
                .update_with_residual(prediction, measurement, |z, x| angle_diff(z, x))?;
        correction.state[0] = wrap_angle(correction.state[0])?;
        Ok(correction)
    }

    /// Run one full predict + update cycle
    pub fn step(
        &self,
        state: &Vector2<f64>,
        covariance: &Matrix2<f64>,
        dt: f64,
        measurement: &Vector2<f64>,
    ) -> Result<Correction<2>, FilterError> {
        let prediction = self.predict(state, covariance, dt)?;
        self.update(&prediction, measurement)
    }
}
