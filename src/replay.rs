// CSV replay of logged IMU data through the crank filter
//
// Reads the CSV format produced by the logging client, rebuilds the
// measurement stream (time rebasing, centripetal correction, accelerometer
// angle) and writes the filtered estimates back out as CSV. No estimation
// logic lives here.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::StepError;
use crate::imu;
use crate::kalman::driver::{Estimate, FilterConfig, FilterDriver, Sample};

// Column headers written by the logging client.
const COL_TIMESTAMP: &str = "Timestamp [us]";
const COL_ACCEL_X: &str = "Acceleration X [m/s^2]";
const COL_ACCEL_Y: &str = "Acceleration Y [m/s^2]";
const COL_GYRO_Z: &str = "Gyro Z [rad/s]";

/// Errors from parsing or writing the replay CSV files
#[derive(Debug)]
pub enum ReplayError {
    Io(std::io::Error),
    /// A required column header is missing from the input
    MissingColumn(&'static str),
    /// A field failed to parse as a number (1-based line number)
    BadField { line: usize, column: &'static str },
    /// The input contains no data rows
    Empty,
    /// The filter rejected a sample
    Filter(StepError),
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::Io(e) => write!(f, "i/o error: {}", e),
            ReplayError::MissingColumn(name) => write!(f, "missing column '{}'", name),
            ReplayError::BadField { line, column } => {
                write!(f, "line {}: cannot parse '{}'", line, column)
            }
            ReplayError::Empty => write!(f, "input contains no samples"),
            ReplayError::Filter(e) => write!(f, "filter failed at {}", e),
        }
    }
}

impl std::error::Error for ReplayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReplayError::Io(e) => Some(e),
            ReplayError::Filter(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ReplayError {
    fn from(e: std::io::Error) -> Self {
        ReplayError::Io(e)
    }
}

/// One raw row of the logged IMU CSV
#[derive(Debug, Clone, Copy)]
pub struct ImuRecord {
    /// Timestamp in microseconds, as logged
    pub timestamp_us: f64,
    pub accel_x: f64,
    pub accel_y: f64,
    pub gyro_z: f64,
}

/// Parse the logged IMU CSV, locating columns by header name
pub fn load_imu_csv(path: &Path) -> Result<Vec<ImuRecord>, ReplayError> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = reader.lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => return Err(ReplayError::Empty),
    };
    let columns: Vec<&str> = header.split(',').map(|c| c.trim()).collect();
    let find = |name: &'static str| -> Result<usize, ReplayError> {
        columns
            .iter()
            .position(|c| *c == name)
            .ok_or(ReplayError::MissingColumn(name))
    };
    let idx_time = find(COL_TIMESTAMP)?;
    let idx_x = find(COL_ACCEL_X)?;
    let idx_y = find(COL_ACCEL_Y)?;
    let idx_gyro = find(COL_GYRO_Z)?;

    let mut records = Vec::new();
    for (line_no, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        let parse = |idx: usize, column: &'static str| -> Result<f64, ReplayError> {
            fields
                .get(idx)
                .and_then(|f| f.trim().parse::<f64>().ok())
                .ok_or(ReplayError::BadField {
                    // 1-based, counting the header line
                    line: line_no + 2,
                    column,
                })
        };
        records.push(ImuRecord {
            timestamp_us: parse(idx_time, COL_TIMESTAMP)?,
            accel_x: parse(idx_x, COL_ACCEL_X)?,
            accel_y: parse(idx_y, COL_ACCEL_Y)?,
            gyro_z: parse(idx_gyro, COL_GYRO_Z)?,
        });
    }

    if records.is_empty() {
        return Err(ReplayError::Empty);
    }
    Ok(records)
}

/// Turn raw IMU records into filter samples
///
/// Timestamps are rebased to seconds relative to the first record. The
/// centripetal component is removed using the IMU's mounting offsets, and
/// the accelerometer angle is negated to match the logged axis convention
/// (the logger's X/Y frame is mirrored relative to the crank's positive
/// direction of rotation).
pub fn build_samples(records: &[ImuRecord], length_offset: f64, width_offset: f64) -> Vec<Sample> {
    let t0 = records[0].timestamp_us;
    records
        .iter()
        .map(|r| {
            let x = imu::correct_centripetal(r.accel_x, -width_offset, r.gyro_z);
            let y = imu::correct_centripetal(r.accel_y, length_offset, r.gyro_z);
            let theta_accel = -imu::accel_angle(x, y);
            Sample::new((r.timestamp_us - t0) / 1e6, theta_accel, r.gyro_z)
        })
        .collect()
}

/// Write estimates as `Timestamp [s],Position [rad],Velocity [rad/s]`
pub fn write_estimates_csv(path: &Path, estimates: &[Estimate]) -> Result<(), ReplayError> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "Timestamp [s],Position [rad],Velocity [rad/s]")?;
    for estimate in estimates {
        writeln!(writer, "{},{},{}", estimate.time, estimate.theta, estimate.omega)?;
    }
    writer.flush()?;
    Ok(())
}

/// Run the whole replay: load, filter, write
///
/// If the filter rejects a sample, the estimates accumulated before the
/// failure are still written out before the error is returned.
pub fn run(config: &Config) -> Result<(), ReplayError> {
    info!("Loading IMU data from {}", config.input.display());
    let records = load_imu_csv(&config.input)?;
    info!("Loaded {} samples", records.len());

    let samples = build_samples(&records, config.length_offset, config.width_offset);

    let mut driver = FilterDriver::new(FilterConfig::default())
        .map_err(|cause| ReplayError::Filter(StepError::new(0, cause)))?;

    match driver.run(&samples) {
        Ok(()) => {
            write_estimates_csv(&config.output, driver.estimates())?;
            info!(
                "Wrote {} estimates to {}",
                driver.estimates().len(),
                config.output.display()
            );
            Ok(())
        }
        Err(step_error) => {
            error!("Filter failed at {}", step_error);
            if driver.estimates().is_empty() {
                warn!("No estimates to write");
            } else {
                write_estimates_csv(&config.output, driver.estimates())?;
                warn!(
                    "Wrote {} partial estimates to {}",
                    driver.estimates().len(),
                    config.output.display()
                );
            }
            Err(ReplayError::Filter(step_error))
        }
    }
}
