use clap::Parser;
use std::path::PathBuf;

/// Crank Filter Replay Configuration
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Input CSV of logged IMU samples (Timestamp [us], Acceleration X/Y, Gyro Z)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Write the filtered estimates to this CSV file
    #[arg(short, long, value_name = "FILE", default_value = "kalman.csv")]
    pub output: PathBuf,

    /// IMU mounting offset along the crank arm, in metres
    #[arg(long, default_value_t = 0.0)]
    pub length_offset: f64,

    /// IMU mounting offset across the crank arm, in metres
    #[arg(long, default_value_t = 0.0)]
    pub width_offset: f64,

    /// Verbose logging (DEBUG level)
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
}
