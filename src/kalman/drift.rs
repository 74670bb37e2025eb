// Three-state drift smoother for strain-gauge recalculation
//
// Tracks `[value, rate, acceleration]` of a slowly drifting raw reading,
// fed with the reading and its first/second finite differences. A sibling
// configuration of the generic linear filter, not a variant of the angle
// filter: nothing here lives on a circle.

use nalgebra as na;
use na::{Matrix3, Vector3};

use crate::error::{FilterError, StepError};
use super::linear::LinearKalman;

/// Caller-supplied constants for the drift smoother
#[derive(Debug, Clone)]
pub struct DriftConfig {
    pub initial_state: Vector3<f64>,
    pub initial_covariance: Matrix3<f64>,
    pub process_noise: Matrix3<f64>,
    pub measurement_noise: Matrix3<f64>,
}

impl Default for DriftConfig {
    /// Starting point for a 24-bit ADC channel: mid-scale initial value and
    /// loose priors. The noise matrices are small but nonzero; an all-zero
    /// configuration collapses the covariance after the first update and the
    /// next step fails with `SingularMatrix`.
    fn default() -> Self {
        DriftConfig {
            initial_state: Vector3::new(2f64.powi(23), 1.0, 1.0),
            initial_covariance: Matrix3::from_diagonal(&Vector3::new(100.0, 200.0, 300.0)),
            process_noise: Matrix3::from_diagonal(&Vector3::new(1.0, 10.0, 100.0)),
            measurement_noise: Matrix3::from_diagonal(&Vector3::new(100.0, 200.0, 300.0)),
        }
    }
}

/// Smooths a raw time series with a constant-acceleration model
#[derive(Debug, Clone)]
pub struct DriftSmoother {
    filter: LinearKalman<3>,
    initial_state: Vector3<f64>,
    initial_covariance: Matrix3<f64>,
}

impl DriftSmoother {
    pub fn new(config: DriftConfig) -> Result<Self, FilterError> {
        Ok(DriftSmoother {
            filter: LinearKalman::new(config.process_noise, config.measurement_noise)?,
            initial_state: config.initial_state,
            initial_covariance: config.initial_covariance,
        })
    }

    /// Constant-acceleration state transition for a time step in seconds
    pub fn transition(dt: f64) -> Matrix3<f64> {
        Matrix3::new(
            1.0, dt, 0.0, //
            0.0, 1.0, dt, //
            0.0, 0.0, 1.0,
        )
    }

    /// Smooth a raw series sampled at the given times
    ///
    /// The measurement at each sample is the raw value plus its first and
    /// second finite differences (both zero at the first sample). Produces
    /// one `[value, rate, acceleration]` state per sample; the first entry
    /// is the initial state unchanged.
    ///
    /// # Errors
    /// * `InvalidInput` if the series lengths differ or a value is non-finite
    /// * `NonMonotonicTime` if the timestamps go backwards
    /// * `SingularMatrix` from a degenerate noise configuration
    ///
    /// Errors carry the index of the failing sample.
    pub fn smooth(
        &self,
        times: &[f64],
        values: &[f64],
    ) -> Result<Vec<Vector3<f64>>, StepError> {
        if times.len() != values.len() {
            return Err(StepError::new(0, FilterError::InvalidInput));
        }

        let measurements = derivative_series(times, values);
        let mut state = self.initial_state;
        let mut covariance = self.initial_covariance;
        let mut output = Vec::with_capacity(times.len());

        for (index, measurement) in measurements.iter().enumerate() {
            if index == 0 {
                output.push(state);
                continue;
            }
            let dt = times[index] - times[index - 1];
            if dt < 0.0 {
                return Err(StepError::new(index, FilterError::NonMonotonicTime));
            }
            let prediction = self
                .filter
                .predict(&state, &covariance, &Self::transition(dt))
                .map_err(|cause| StepError::new(index, cause))?;
            let correction = self
                .filter
                .update(&prediction, measurement)
                .map_err(|cause| StepError::new(index, cause))?;
            state = correction.state;
            covariance = correction.covariance;
            output.push(state);
        }

        Ok(output)
    }
}

/// Build `[value, d_value, dd_value]` measurements from a raw series
///
/// Differences are divided by the local time step; the derivative entries of
/// the first sample are zero since there is nothing to difference against.
/// A zero time step yields non-finite derivatives, which the filter rejects
/// as `InvalidInput` at that sample.
fn derivative_series(times: &[f64], values: &[f64]) -> Vec<Vector3<f64>> {
    let mut first = vec![0.0; values.len()];
    for i in 1..values.len() {
        first[i] = (values[i] - values[i - 1]) / (times[i] - times[i - 1]);
    }
    let mut second = vec![0.0; values.len()];
    for i in 1..values.len() {
        second[i] = (first[i] - first[i - 1]) / (times[i] - times[i - 1]);
    }
    values
        .iter()
        .zip(first.iter().zip(second.iter()))
        .map(|(&v, (&dv, &ddv))| Vector3::new(v, dv, ddv))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_series_holds_value() {
        let config = DriftConfig {
            initial_state: Vector3::new(5.0, 0.0, 0.0),
            initial_covariance: Matrix3::from_diagonal(&Vector3::new(100.0, 100.0, 100.0)),
            process_noise: Matrix3::from_diagonal(&Vector3::new(0.01, 0.01, 0.01)),
            measurement_noise: Matrix3::from_diagonal(&Vector3::new(0.1, 0.1, 0.1)),
        };
        let smoother = DriftSmoother::new(config).unwrap();

        let times: Vec<f64> = (0..100).map(|i| i as f64 * 0.1).collect();
        let values = vec![5.0; 100];
        let output = smoother.smooth(&times, &values).unwrap();

        assert_eq!(output.len(), 100);
        let last = output.last().unwrap();
        assert!((last[0] - 5.0).abs() < 0.01);
        assert!(last[1].abs() < 0.01);
    }

    #[test]
    fn test_ramp_series_recovers_rate() {
        let config = DriftConfig {
            initial_state: Vector3::new(0.0, 0.0, 0.0),
            initial_covariance: Matrix3::from_diagonal(&Vector3::new(100.0, 100.0, 100.0)),
            process_noise: Matrix3::from_diagonal(&Vector3::new(0.01, 0.01, 0.01)),
            measurement_noise: Matrix3::from_diagonal(&Vector3::new(0.1, 0.1, 0.1)),
        };
        let smoother = DriftSmoother::new(config).unwrap();

        let times: Vec<f64> = (0..100).map(|i| i as f64 * 0.1).collect();
        let values: Vec<f64> = times.iter().map(|t| 2.0 * t).collect();
        let output = smoother.smooth(&times, &values).unwrap();

        let last = output.last().unwrap();
        assert!((last[0] - 2.0 * times[99]).abs() < 0.1);
        assert!((last[1] - 2.0).abs() < 0.05);
    }

    #[test]
    fn test_zero_noise_configuration_is_singular() {
        // With Q = R = 0 the first update collapses the covariance to zero,
        // so the innovation covariance of the following step is singular.
        let config = DriftConfig {
            initial_state: Vector3::new(0.0, 0.0, 0.0),
            initial_covariance: Matrix3::from_diagonal(&Vector3::new(100.0, 200.0, 300.0)),
            process_noise: Matrix3::zeros(),
            measurement_noise: Matrix3::zeros(),
        };
        let smoother = DriftSmoother::new(config).unwrap();

        let times = [0.0, 1.0, 2.0];
        let values = [1.0, 1.0, 1.0];
        let err = smoother.smooth(&times, &values).unwrap_err();
        assert_eq!(err.index, 2);
        assert_eq!(err.cause, FilterError::SingularMatrix);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let smoother = DriftSmoother::new(DriftConfig::default()).unwrap();
        let err = smoother.smooth(&[0.0, 1.0], &[1.0]).unwrap_err();
        assert_eq!(err.cause, FilterError::InvalidInput);
    }

    #[test]
    fn test_backwards_time_rejected() {
        let smoother = DriftSmoother::new(DriftConfig::default()).unwrap();
        let err = smoother
            .smooth(&[0.0, 1.0, 0.5], &[1.0, 2.0, 3.0])
            .unwrap_err();
        assert_eq!(err.index, 2);
        assert_eq!(err.cause, FilterError::NonMonotonicTime);
    }

    #[test]
    fn test_first_output_is_initial_state() {
        let smoother = DriftSmoother::new(DriftConfig::default()).unwrap();
        let output = smoother.smooth(&[0.0, 1.0], &[8_388_608.0, 8_388_610.0]).unwrap();
        assert_eq!(output[0], Vector3::new(2f64.powi(23), 1.0, 1.0));
    }
}
