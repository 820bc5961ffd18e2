//! Typed sysfs attribute access
//!
//! Thin readers over single-value kernel attributes. All reads are bounded
//! and trimmed; failures surface as [`LaptopctlError`] so callers can decide
//! whether to degrade a field or fail an operation.

use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

use crate::constants::limits;
use crate::data::{BacklightPaths, ChargeThresholds, CpuFreqPaths, FanControlPaths, ThresholdPaths};
use crate::error::{LaptopctlError, Result};

pub fn read_trimmed<P: AsRef<Path>>(p: P) -> io::Result<String> {
    let mut s = String::new();
    fs::File::open(p)?
        .take(limits::MAX_ATTRIBUTE_SIZE)
        .read_to_string(&mut s)?;
    Ok(s.trim().to_string())
}

/// True if the attribute exists and can be opened for reading
pub fn is_readable(path: &Path) -> bool {
    fs::File::open(path).is_ok()
}

pub fn read_attr(path: &Path) -> Result<String> {
    read_trimmed(path).map_err(|e| LaptopctlError::transient_read(path, e.to_string()))
}

pub fn read_parsed<T: FromStr>(path: &Path) -> Result<T> {
    let raw = read_attr(path)?;
    raw.parse().map_err(|_| LaptopctlError::Parse {
        path: path.to_path_buf(),
        reason: format!("unexpected value '{raw}'"),
    })
}

/// Scale a raw reading against its maximum to a whole percentage
pub fn scale_to_percent(raw: u64, max: u64) -> u8 {
    if max == 0 {
        return 0;
    }
    ((raw.min(max) as f64 / max as f64) * 100.0).round() as u8
}

/// Scale a percentage to a raw value in `0..=max`
pub fn scale_from_percent(percent: u8, max: u64) -> u64 {
    ((percent.min(100) as f64 / 100.0) * max as f64).round() as u64
}

pub fn read_governor(paths: &CpuFreqPaths) -> Result<String> {
    read_attr(&paths.governor)
}

pub fn read_available_governors(paths: &CpuFreqPaths) -> Result<Vec<String>> {
    let raw = read_attr(&paths.available_governors)?;
    Ok(raw.split_whitespace().map(str::to_string).collect())
}

/// Returns (raw brightness, max brightness)
pub fn read_brightness(paths: &BacklightPaths) -> Result<(u64, u64)> {
    let max: u64 = read_parsed(&paths.max_brightness)?;
    let raw: u64 = read_parsed(&paths.brightness)?;
    Ok((raw, max))
}

pub fn read_brightness_percent(paths: &BacklightPaths) -> Result<u8> {
    let (raw, max) = read_brightness(paths)?;
    Ok(scale_to_percent(raw, max))
}

pub fn read_thresholds(paths: &ThresholdPaths) -> Result<ChargeThresholds> {
    Ok(ChargeThresholds {
        start: read_parsed(&paths.start)?,
        stop: read_parsed(&paths.stop)?,
    })
}

pub fn read_pwm(paths: &FanControlPaths) -> Result<u8> {
    read_parsed(&paths.pwm)
}

pub fn read_pwm_enable(paths: &FanControlPaths) -> Result<u8> {
    read_parsed(&paths.pwm_enable)
}
