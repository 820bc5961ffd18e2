/*
 * This file is part of laptopctl.
 *
 * Copyright (C) 2025 laptopctl contributors
 *
 * laptopctl is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * laptopctl is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with laptopctl. If not, see <https://www.gnu.org/licenses/>.
 */

use std::env;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{defaults, paths, temperature};
use crate::error::{LaptopctlError, Result};

/// How privileged writes reach sysfs
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EscalationTool {
    #[default]
    Pkexec,
    Sudo,
    Doas,
    /// Write in-process; only useful when already running as root
    Direct,
}

impl EscalationTool {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationTool::Pkexec => "pkexec",
            EscalationTool::Sudo => "sudo",
            EscalationTool::Doas => "doas",
            EscalationTool::Direct => "direct",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub poll_interval_ms: u64,
    pub escalation: EscalationTool,
    /// Extra options passed to the escalation tool, e.g. `["-A"]` for sudo
    /// with an askpass helper or `["-n"]` for non-interactive doas
    pub escalation_args: Vec<String>,
    /// Lowest fan speed accepted without an explicit override
    pub min_fan_percent: u8,
    pub brightness_tolerance_percent: u8,
    pub fan_tolerance_percent: u8,
    /// Inclusive [min, max] accepted for the charge start threshold
    pub threshold_start_range: [u8; 2],
    /// Inclusive [min, max] accepted for the charge stop threshold
    pub threshold_stop_range: [u8; 2],
    pub temperature_range_c: [f32; 2],
    pub sysfs_root: PathBuf,
    pub procfs_root: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            escalation: EscalationTool::default(),
            escalation_args: Vec::new(),
            min_fan_percent: defaults::MIN_FAN_PERCENT,
            brightness_tolerance_percent: defaults::BRIGHTNESS_TOLERANCE_PERCENT,
            fan_tolerance_percent: defaults::FAN_TOLERANCE_PERCENT,
            threshold_start_range: defaults::THRESHOLD_START_RANGE,
            threshold_stop_range: defaults::THRESHOLD_STOP_RANGE,
            temperature_range_c: [temperature::DEFAULT_MIN_C, temperature::DEFAULT_MAX_C],
            sysfs_root: PathBuf::from(paths::SYSFS_ROOT),
            procfs_root: PathBuf::from(paths::PROCFS_ROOT),
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = env::var(paths::CONFIG_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    match dirs::config_dir() {
        Some(dir) => dir.join(paths::CONFIG_DIR_NAME).join(paths::CONFIG_FILE),
        None => PathBuf::from(paths::SYSTEM_CONFIG),
    }
}

/// Load settings from the default location; a missing file yields defaults.
pub fn load_settings() -> Result<Settings> {
    load_settings_from(&config_path())
}

pub fn load_settings_from(path: &Path) -> Result<Settings> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Settings::default());
        }
        Err(source) => {
            return Err(LaptopctlError::FileRead {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let settings: Settings = serde_json::from_str(&data)?;
    validate_settings(&settings)?;
    debug!(path = %path.display(), "Loaded settings");
    Ok(settings)
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    validate_settings(settings)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| LaptopctlError::FileWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json).map_err(|source| LaptopctlError::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;
    // Best-effort set permissions to 0644
    let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o644));
    Ok(())
}

fn validate_range(field: &str, range: [u8; 2], ceiling: u8) -> Result<()> {
    if range[0] > range[1] {
        return Err(LaptopctlError::invalid_config(
            field,
            format!("min {} exceeds max {}", range[0], range[1]),
        ));
    }
    if range[1] > ceiling {
        return Err(LaptopctlError::invalid_config(
            field,
            format!("max {} exceeds {}", range[1], ceiling),
        ));
    }
    Ok(())
}

pub fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.poll_interval_ms < defaults::MIN_POLL_INTERVAL_MS {
        return Err(LaptopctlError::invalid_config(
            "poll_interval_ms",
            format!("must be at least {}", defaults::MIN_POLL_INTERVAL_MS),
        ));
    }
    if let Some(arg) = settings.escalation_args.iter().find(|a| !a.starts_with('-')) {
        return Err(LaptopctlError::invalid_config(
            "escalation_args",
            format!("'{arg}' is not an option; only flags are accepted"),
        ));
    }
    if settings.escalation == EscalationTool::Direct && !settings.escalation_args.is_empty() {
        return Err(LaptopctlError::invalid_config(
            "escalation_args",
            "has no effect with direct escalation",
        ));
    }
    if settings.min_fan_percent > 100 {
        return Err(LaptopctlError::invalid_config("min_fan_percent", "must be 0-100"));
    }
    if settings.brightness_tolerance_percent > 100 {
        return Err(LaptopctlError::invalid_config(
            "brightness_tolerance_percent",
            "must be 0-100",
        ));
    }
    if settings.fan_tolerance_percent > 100 {
        return Err(LaptopctlError::invalid_config("fan_tolerance_percent", "must be 0-100"));
    }
    validate_range("threshold_start_range", settings.threshold_start_range, 99)?;
    validate_range("threshold_stop_range", settings.threshold_stop_range, 100)?;
    if settings.threshold_stop_range[1] <= settings.threshold_start_range[0] {
        return Err(LaptopctlError::invalid_config(
            "threshold_stop_range",
            "leaves no stop value above the lowest start value",
        ));
    }
    let [lo, hi] = settings.temperature_range_c;
    if !(lo.is_finite() && hi.is_finite()) || lo >= hi {
        return Err(LaptopctlError::invalid_config(
            "temperature_range_c",
            format!("[{lo}, {hi}] is not a valid range"),
        ));
    }
    if settings.sysfs_root.as_os_str().is_empty() || settings.procfs_root.as_os_str().is_empty() {
        return Err(LaptopctlError::config("sysfs_root and procfs_root must not be empty"));
    }
    Ok(())
}
