// Error types for the crank filter

use std::fmt;

/// Errors surfaced by the filter math and the sequential driver
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterError {
    /// A NaN or infinite value was passed as an angle, measurement or matrix entry
    InvalidInput,
    /// The innovation covariance matrix could not be inverted
    SingularMatrix,
    /// A sample arrived with a timestamp earlier than its predecessor
    NonMonotonicTime,
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::InvalidInput => write!(f, "non-finite value in filter input"),
            FilterError::SingularMatrix => write!(f, "innovation covariance is not invertible"),
            FilterError::NonMonotonicTime => write!(f, "negative time step between samples"),
        }
    }
}

impl std::error::Error for FilterError {}

/// A filter error tagged with the index of the sample that triggered it
///
/// Produced by the sequential driver so downstream tools can report which
/// row of the input stream was at fault.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepError {
    pub index: usize,
    pub cause: FilterError,
}

impl StepError {
    pub fn new(index: usize, cause: FilterError) -> Self {
        StepError { index, cause }
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sample {}: {}", self.index, self.cause)
    }
}

impl std::error::Error for StepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_error_display() {
        let err = StepError::new(42, FilterError::SingularMatrix);
        assert_eq!(
            err.to_string(),
            "sample 42: innovation covariance is not invertible"
        );
    }

    #[test]
    fn test_step_error_source() {
        use std::error::Error;
        let err = StepError::new(0, FilterError::NonMonotonicTime);
        assert!(err.source().is_some());
    }
}
