// Kalman filtering module
// One generic linear filter implementation, plus its two configurations:
// the angle-aware crank filter and the strain drift smoother.

pub mod angle;
pub mod drift;
pub mod driver;
pub mod linear;

pub use angle::AngleKalman;
pub use drift::{DriftConfig, DriftSmoother};
pub use driver::{Estimate, FilterConfig, FilterDriver, Sample};
pub use linear::{Correction, LinearKalman, Prediction};
