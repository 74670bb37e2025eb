pub mod angles;
pub mod config;
pub mod error;
pub mod imu;
pub mod kalman;
pub mod replay;
