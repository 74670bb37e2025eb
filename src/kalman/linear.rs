// Generic fixed-size linear Kalman filter
//
// One implementation of the predict/update math, parameterized by the state
// dimension. The two-state angle filter and the three-state drift smoother
// are both configurations of this type.

use nalgebra as na;
use na::{Const, DimMin, SMatrix, SVector};

use crate::error::FilterError;

// Determinants smaller than this are treated as singular.
const SINGULAR_DET_THRESHOLD: f64 = 1e-12;

/// Result of a predict step
#[derive(Debug, Clone)]
pub struct Prediction<const N: usize> {
    pub state: SVector<f64, N>,
    pub covariance: SMatrix<f64, N, N>,
}

/// Result of an update step
///
/// Carries the predicted-only state alongside the corrected one so callers
/// can compare the filter's prior against the measurement-corrected output.
#[derive(Debug, Clone)]
pub struct Correction<const N: usize> {
    pub predicted: SVector<f64, N>,
    pub state: SVector<f64, N>,
    pub covariance: SMatrix<f64, N, N>,
}

/// An N-state linear Kalman filter with identity observation matrix
///
/// Holds the two noise covariances, which are constant for the lifetime of a
/// run. The state and estimate covariance are threaded through the calls by
/// the caller, keeping each step a pure function.
#[derive(Debug, Clone)]
pub struct LinearKalman<const N: usize> {
    process_noise: SMatrix<f64, N, N>,
    measurement_noise: SMatrix<f64, N, N>,
}

impl<const N: usize> LinearKalman<N>
where
    Const<N>: DimMin<Const<N>, Output = Const<N>>,
{
    /// Create a filter from its noise covariances
    ///
    /// # Arguments
    /// * `process_noise` - Q, uncertainty added by the environment each step
    /// * `measurement_noise` - R, uncertainty of the sensor readings
    ///
    /// # Errors
    /// Returns `InvalidInput` if either matrix contains a non-finite entry.
    pub fn new(
        process_noise: SMatrix<f64, N, N>,
        measurement_noise: SMatrix<f64, N, N>,
    ) -> Result<Self, FilterError> {
        check_matrix(&process_noise)?;
        check_matrix(&measurement_noise)?;
        Ok(LinearKalman {
            process_noise,
            measurement_noise,
        })
    }

    pub fn process_noise(&self) -> &SMatrix<f64, N, N> {
        &self.process_noise
    }

    pub fn measurement_noise(&self) -> &SMatrix<f64, N, N> {
        &self.measurement_noise
    }

    /// Predict the next state distribution
    ///
    /// Computes `x' = F x` and `P' = F P Ft + Q` for the supplied transition
    /// matrix. No control input is modeled.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the state, covariance or transition matrix
    /// contain non-finite entries.
    pub fn predict(
        &self,
        state: &SVector<f64, N>,
        covariance: &SMatrix<f64, N, N>,
        transition: &SMatrix<f64, N, N>,
    ) -> Result<Prediction<N>, FilterError> {
        check_vector(state)?;
        check_matrix(covariance)?;
        check_matrix(transition)?;

        let predicted = transition * state;
        let predicted_cov = transition * covariance * transition.transpose() + self.process_noise;

        Ok(Prediction {
            state: predicted,
            covariance: predicted_cov,
        })
    }

    /// Correct a prediction against a measurement, using a plain residual
    pub fn update(
        &self,
        prediction: &Prediction<N>,
        measurement: &SVector<f64, N>,
    ) -> Result<Correction<N>, FilterError> {
        self.update_with_residual(prediction, measurement, |z, x| z - x)
    }

    /// Correct a prediction against a measurement
    ///
    /// The observation matrix is the identity (every state component is
    /// directly measured), so the gain is `K = P (P + R)^-1` and the
    /// corrected covariance is `P - K P`. The residual function computes
    /// the innovation `z - x_pred`; the angle filter injects its circular
    /// difference here, everything else uses plain subtraction.
    ///
    /// # Errors
    /// * `InvalidInput` if the measurement contains non-finite entries
    /// * `SingularMatrix` if `P + R` cannot be inverted
    pub fn update_with_residual<F>(
        &self,
        prediction: &Prediction<N>,
        measurement: &SVector<f64, N>,
        residual: F,
    ) -> Result<Correction<N>, FilterError>
    where
        F: Fn(&SVector<f64, N>, &SVector<f64, N>) -> SVector<f64, N>,
    {
        check_vector(measurement)?;

        let innovation_cov = prediction.covariance + self.measurement_noise;
        if innovation_cov.determinant().abs() < SINGULAR_DET_THRESHOLD {
            return Err(FilterError::SingularMatrix);
        }
        let gain = prediction.covariance
            * innovation_cov
                .try_inverse()
                .ok_or(FilterError::SingularMatrix)?;

        let innovation = residual(measurement, &prediction.state);
        let state = prediction.state + gain * innovation;
        let covariance = prediction.covariance - gain * prediction.covariance;

        Ok(Correction {
            predicted: prediction.state,
            state,
            covariance,
        })
    }
}

fn check_vector<const N: usize>(v: &SVector<f64, N>) -> Result<(), FilterError> {
    if v.iter().all(|value| value.is_finite()) {
        Ok(())
    } else {
        Err(FilterError::InvalidInput)
    }
}

fn check_matrix<const N: usize>(m: &SMatrix<f64, N, N>) -> Result<(), FilterError> {
    if m.iter().all(|value| value.is_finite()) {
        Ok(())
    } else {
        Err(FilterError::InvalidInput)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use na::{Matrix2, Vector2};

    fn simple_filter() -> LinearKalman<2> {
        LinearKalman::new(
            Matrix2::new(0.1, 0.0, 0.0, 0.1),
            Matrix2::new(1.0, 0.0, 0.0, 1.0),
        )
        .unwrap()
    }

    #[test]
    fn test_predict_constant_velocity() {
        let filter = simple_filter();
        let transition = Matrix2::new(1.0, 0.5, 0.0, 1.0);
        let prediction = filter
            .predict(
                &Vector2::new(1.0, 2.0),
                &Matrix2::new(1.0, 0.0, 0.0, 1.0),
                &transition,
            )
            .unwrap();

        // x' = [1 + 0.5*2, 2]
        assert!((prediction.state[0] - 2.0).abs() < 1e-12);
        assert!((prediction.state[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_predict_identity_transition_adds_q() {
        let filter = simple_filter();
        let covariance = Matrix2::new(2.0, 0.5, 0.5, 3.0);
        let prediction = filter
            .predict(
                &Vector2::new(1.0, -1.0),
                &covariance,
                &Matrix2::identity(),
            )
            .unwrap();

        // State unchanged, covariance grows by exactly Q
        assert!((prediction.state[0] - 1.0).abs() < 1e-12);
        assert!((prediction.state[1] + 1.0).abs() < 1e-12);
        let expected = covariance + filter.process_noise();
        assert!((prediction.covariance - expected).abs().max() < 1e-12);
    }

    #[test]
    fn test_update_moves_toward_measurement() {
        let filter = simple_filter();
        let prediction = Prediction {
            state: Vector2::new(0.0, 0.0),
            covariance: Matrix2::new(1.0, 0.0, 0.0, 1.0),
        };
        let correction = filter.update(&prediction, &Vector2::new(1.0, 1.0)).unwrap();

        // With P = R = I the gain is 0.5 in each channel
        assert!((correction.state[0] - 0.5).abs() < 1e-12);
        assert!((correction.state[1] - 0.5).abs() < 1e-12);
        // Covariance shrinks
        assert!(correction.covariance[(0, 0)] < prediction.covariance[(0, 0)]);
        // Predicted state is passed through untouched
        assert!(correction.predicted[0].abs() < 1e-12);
    }

    #[test]
    fn test_update_singular_innovation_covariance() {
        let filter = LinearKalman::new(Matrix2::zeros(), Matrix2::zeros()).unwrap();
        let prediction = Prediction {
            state: Vector2::new(0.0, 0.0),
            covariance: Matrix2::zeros(),
        };
        let result = filter.update(&prediction, &Vector2::new(0.0, 0.0));
        assert_eq!(result.unwrap_err(), FilterError::SingularMatrix);
    }

    #[test]
    fn test_non_finite_inputs_rejected() {
        let filter = simple_filter();
        let bad_state = Vector2::new(f64::NAN, 0.0);
        let result = filter.predict(&bad_state, &Matrix2::identity(), &Matrix2::identity());
        assert_eq!(result.unwrap_err(), FilterError::InvalidInput);

        let prediction = Prediction {
            state: Vector2::new(0.0, 0.0),
            covariance: Matrix2::identity(),
        };
        let result = filter.update(&prediction, &Vector2::new(f64::INFINITY, 0.0));
        assert_eq!(result.unwrap_err(), FilterError::InvalidInput);

        assert_eq!(
            LinearKalman::<2>::new(Matrix2::new(f64::NAN, 0.0, 0.0, 0.0), Matrix2::zeros())
                .unwrap_err(),
            FilterError::InvalidInput
        );
    }

    #[test]
    fn test_update_with_custom_residual() {
        let filter = simple_filter();
        let prediction = Prediction {
            state: Vector2::new(1.0, 0.0),
            covariance: Matrix2::identity(),
        };
        // A residual that ignores the measurement leaves the state alone
        let correction = filter
            .update_with_residual(&prediction, &Vector2::new(100.0, 100.0), |_, _| {
                Vector2::zeros()
            })
            .unwrap();
        assert!((correction.state[0] - 1.0).abs() < 1e-12);
        assert!(correction.state[1].abs() < 1e-12);
    }
}
