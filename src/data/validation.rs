//! Input validation for control requests
//!
//! Every check here is pure: no filesystem access. Requests that fail
//! validation never reach the escalation layer.

use crate::constants::limits;
use crate::error::{LaptopctlError, Result};

/// Validates that a percentage is within 0-100
pub fn validate_percent(field: &str, value: u8) -> Result<u8> {
    if value > 100 {
        return Err(LaptopctlError::invalid_value(format!(
            "{field} {value}% is outside 0-100"
        )));
    }
    Ok(value)
}

/// Validates a requested fan speed against the safety floor
pub fn validate_fan_speed(percent: u8, min_percent: u8, override_floor: bool) -> Result<u8> {
    let percent = validate_percent("fan speed", percent)?;
    if percent < min_percent && !override_floor {
        return Err(LaptopctlError::BelowSafetyFloor {
            requested: percent,
            floor: min_percent,
        });
    }
    Ok(percent)
}

/// Validates the shape of a governor token.
///
/// Membership in the available list is checked separately against a fresh
/// read; this only guarantees the token is safe to hand to a subprocess.
pub fn validate_governor_name(name: &str) -> Result<&str> {
    if name.is_empty() || name.len() > limits::MAX_GOVERNOR_NAME_LEN {
        return Err(LaptopctlError::invalid_value(format!(
            "governor name must be 1-{} characters",
            limits::MAX_GOVERNOR_NAME_LEN
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(LaptopctlError::invalid_value(format!(
            "governor name '{name}' contains invalid characters"
        )));
    }
    Ok(name)
}

/// Validates a charge threshold pair against the configured ranges
pub fn validate_thresholds(
    start: u8,
    stop: u8,
    start_range: [u8; 2],
    stop_range: [u8; 2],
) -> Result<(u8, u8)> {
    if start >= stop {
        return Err(LaptopctlError::invalid_value(format!(
            "start threshold {start}% must be below stop threshold {stop}%"
        )));
    }
    if !(start_range[0]..=start_range[1]).contains(&start) {
        return Err(LaptopctlError::invalid_value(format!(
            "start threshold {start}% is outside {}-{}",
            start_range[0], start_range[1]
        )));
    }
    if !(stop_range[0]..=stop_range[1]).contains(&stop) {
        return Err(LaptopctlError::invalid_value(format!(
            "stop threshold {stop}% is outside {}-{}",
            stop_range[0], stop_range[1]
        )));
    }
    Ok((start, stop))
}
