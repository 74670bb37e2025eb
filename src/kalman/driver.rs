// Sequential driver for the angle filter
//
// Owns the state/covariance threading, timestamp differencing and the
// accumulated per-sample estimates. One driver per channel; the fold is
// strictly sequential and never looks at future samples.

use nalgebra as na;
use na::{Matrix2, Vector2};
use tracing::warn;

use crate::error::{FilterError, StepError};
use super::angle::AngleKalman;

/// One timestamped input sample
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    /// Time in seconds, strictly ascending within a stream
    pub time: f64,
    /// `[theta_accel, omega_gyro]` in radians and radians/second
    pub measurement: Vector2<f64>,
}

impl Sample {
    pub fn new(time: f64, theta_accel: f64, omega_gyro: f64) -> Self {
        Sample {
            time,
            measurement: Vector2::new(theta_accel, omega_gyro),
        }
    }
}

/// One per-sample state estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub time: f64,
    /// Crank position in radians, wrapped to (-pi, pi]
    pub theta: f64,
    /// Angular velocity in radians/second
    pub omega: f64,
}

/// Caller-supplied filter constants
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub initial_state: Vector2<f64>,
    pub initial_covariance: Matrix2<f64>,
    pub process_noise: Matrix2<f64>,
    pub measurement_noise: Matrix2<f64>,
}

impl Default for FilterConfig {
    /// The crank IMU tuning: no prior confidence in the initial state, a
    /// heavily distrusted accelerometer angle and a trusted gyro rate.
    fn default() -> Self {
        FilterConfig {
            initial_state: Vector2::new(0.0, 0.0),
            initial_covariance: Matrix2::new(1e4, 1e4, 1e4, 1e4),
            process_noise: Matrix2::new(0.002, 0.0, 0.0, 0.1),
            measurement_noise: Matrix2::new(100.0, 0.0, 0.0, 0.01),
        }
    }
}

/// Folds the angle filter over an ordered measurement stream
///
/// The first sample records the supplied initial state unchanged; every
/// later sample runs one predict + update cycle with the time delta from
/// its predecessor. On failure the driver stops and keeps the estimates
/// accumulated so far, so partial results stay available for analysis.
#[derive(Debug, Clone)]
pub struct FilterDriver {
    filter: AngleKalman,
    state: Vector2<f64>,
    covariance: Matrix2<f64>,
    last_time: Option<f64>,
    next_index: usize,
    estimates: Vec<Estimate>,
}

impl FilterDriver {
    pub fn new(config: FilterConfig) -> Result<Self, FilterError> {
        let filter = AngleKalman::new(config.process_noise, config.measurement_noise)?;
        Ok(FilterDriver {
            filter,
            state: config.initial_state,
            covariance: config.initial_covariance,
            last_time: None,
            next_index: 0,
            estimates: Vec::new(),
        })
    }

    /// Current state estimate `[theta, omega]`
    pub fn state(&self) -> &Vector2<f64> {
        &self.state
    }

    /// Current estimate covariance, for diagnostics only
    pub fn covariance(&self) -> &Matrix2<f64> {
        &self.covariance
    }

    /// Estimates recorded so far, one per accepted sample
    pub fn estimates(&self) -> &[Estimate] {
        &self.estimates
    }

    /// Reset to a new initial state, clearing history and the time base
    pub fn reset(&mut self, state: Vector2<f64>, covariance: Matrix2<f64>) {
        self.state = state;
        self.covariance = covariance;
        self.last_time = None;
        self.next_index = 0;
        self.estimates.clear();
    }

    /// Feed one sample through the filter
    ///
    /// # Errors
    /// * `NonMonotonicTime` if the timestamp is earlier than the previous one
    /// * `InvalidInput` / `SingularMatrix` from the filter step
    ///
    /// All errors carry the sample index. A failed sample leaves the driver
    /// state untouched, so a caller may inspect partial results or resume
    /// with corrected data.
    pub fn step(&mut self, time: f64, measurement: &Vector2<f64>) -> Result<Estimate, StepError> {
        let index = self.next_index;
        if !time.is_finite() {
            return Err(StepError::new(index, FilterError::InvalidInput));
        }

        if let Some(last_time) = self.last_time {
            let dt = time - last_time;
            if dt < 0.0 {
                warn!(
                    "sample {} moves backwards in time ({} s after {} s)",
                    index, time, last_time
                );
                return Err(StepError::new(index, FilterError::NonMonotonicTime));
            }
            let correction = self
                .filter
                .step(&self.state, &self.covariance, dt, measurement)
                .map_err(|cause| StepError::new(index, cause))?;
            self.state = correction.state;
            self.covariance = correction.covariance;
        }
        // The first sample reports the initial state unchanged; the filter
        // only runs from the second sample onwards.

        self.last_time = Some(time);
        self.next_index = index + 1;
        let estimate = Estimate {
            time,
            theta: self.state[0],
            omega: self.state[1],
        };
        self.estimates.push(estimate);
        Ok(estimate)
    }

    /// Fold the filter over a whole sample stream
    ///
    /// Records one estimate per sample, readable through
    /// [`FilterDriver::estimates`]. On failure the stream is abandoned at
    /// the offending sample and the estimates recorded up to that point
    /// remain available.
    pub fn run(&mut self, samples: &[Sample]) -> Result<(), StepError> {
        for sample in samples {
            self.step(sample.time, &sample.measurement)?;
        }
        Ok(())
    }
}
