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

//! Constants and configuration values for laptopctl
//!
//! Centralizes paths, candidate lists, limits and defaults. Add new magic
//! numbers here rather than inline in the modules that use them.

use std::time::Duration;

/// Filesystem locations, relative to the configured sysfs/procfs roots
pub mod paths {
    /// Default sysfs mount point
    pub const SYSFS_ROOT: &str = "/sys";

    /// Default procfs mount point
    pub const PROCFS_ROOT: &str = "/proc";

    pub const POWER_SUPPLY_DIR: &str = "class/power_supply";
    pub const BACKLIGHT_DIR: &str = "class/backlight";
    pub const HWMON_DIR: &str = "class/hwmon";
    pub const THERMAL_DIR: &str = "class/thermal";
    pub const CPU_DIR: &str = "devices/system/cpu";

    /// procfs files, relative to the procfs root
    pub const PROC_STAT: &str = "stat";
    pub const PROC_DISKSTATS: &str = "diskstats";

    /// Config directory name under the XDG config dir
    pub const CONFIG_DIR_NAME: &str = "laptopctl";

    /// Settings file name
    pub const CONFIG_FILE: &str = "config.json";

    /// Environment variable overriding the settings file location
    pub const CONFIG_ENV: &str = "LAPTOPCTL_CONFIG";

    /// System-wide settings location used when no user config dir exists
    pub const SYSTEM_CONFIG: &str = "/etc/laptopctl/config.json";
}

/// Ordered candidate names. The first entry that exists wins.
pub mod candidates {
    pub const BATTERIES: &[&str] = &["BAT0", "BAT1", "BAT2", "BATT", "BATC", "CMB0"];

    pub const AC_ADAPTERS: &[&str] = &["AC", "AC0", "ACAD", "ADP0", "ADP1"];

    /// (start, stop) attribute pairs, vendor layout before the generic kernel one
    pub const THRESHOLD_PAIRS: &[(&str, &str)] = &[
        ("charge_start_threshold", "charge_stop_threshold"),
        ("charge_control_start_threshold", "charge_control_end_threshold"),
    ];

    pub const BACKLIGHTS: &[&str] = &[
        "intel_backlight",
        "amdgpu_bl0",
        "amdgpu_bl1",
        "acpi_video0",
        "acpi_video1",
        "nvidia_0",
    ];
}

/// Probe bounds and plausibility limits
pub mod limits {
    /// Highest hwmonN index probed
    pub const MAX_HWMON: usize = 16;

    /// Highest cpuN index probed for the governor write set
    pub const MAX_CPUS: usize = 256;

    /// Highest tempN_input index probed per hwmon chip
    pub const MAX_TEMP_INPUTS: usize = 8;

    /// Highest fanN_input index probed per hwmon chip
    pub const MAX_FAN_INPUTS: usize = 4;

    /// Highest thermal_zoneN index probed in the fallback path
    pub const MAX_THERMAL_ZONES: usize = 8;

    /// Fan readings above this are treated as garbage
    pub const MAX_PLAUSIBLE_RPM: i64 = 30_000;

    /// Battery runtime estimates beyond a week are treated as garbage
    pub const MAX_PLAUSIBLE_RUNTIME_SECS: u64 = 7 * 24 * 3600;

    /// Longest governor token accepted from callers
    pub const MAX_GOVERNOR_NAME_LEN: usize = 32;

    /// Upper bound on bytes read from a single sysfs attribute
    pub const MAX_ATTRIBUTE_SIZE: u64 = 4096;
}

/// PWM control constants
pub mod pwm {
    /// Maximum PWM value (full speed)
    pub const MAX_VALUE: u8 = 255;

    /// pwmN_enable values
    pub mod enable {
        /// Manual PWM control
        pub const MANUAL: u8 = 1;
        /// Automatic/firmware control
        pub const AUTOMATIC: u8 = 2;
    }

    /// Convert percentage (0-100) to PWM value (0-255)
    #[inline]
    pub fn from_percent(percent: u8) -> u8 {
        ((percent.min(100) as f32 / 100.0) * MAX_VALUE as f32).round() as u8
    }

    /// Convert PWM value (0-255) to a whole percentage (0-100)
    #[inline]
    pub fn to_percent(value: u8) -> u8 {
        ((value as f32 / MAX_VALUE as f32) * 100.0).round() as u8
    }
}

/// Temperature constants
pub mod temperature {
    /// Temperature readings are in millidegrees, divide by this to get Celsius
    pub const MILLIDEGREE_DIVISOR: f32 = 1000.0;

    /// Lowest plausible reading (Celsius)
    pub const DEFAULT_MIN_C: f32 = -40.0;

    /// Highest plausible reading (Celsius)
    pub const DEFAULT_MAX_C: f32 = 150.0;
}

/// Escalation subprocess handling
pub mod escalation {
    use super::*;

    /// How often a running escalation child is checked for exit or cancellation
    pub const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(50);

    /// pkexec: authorization could not be obtained (dialog dismissed)
    pub const PKEXEC_NOT_AUTHORIZED: i32 = 126;

    /// pkexec: user denied, or no authentication agent
    pub const PKEXEC_AUTH_FAILED: i32 = 127;

    /// sudo/doas: the inner command exists but could not be executed
    pub const COMMAND_NOT_EXECUTABLE: i32 = 126;

    /// sudo/doas: the inner command was not found
    pub const COMMAND_NOT_FOUND: i32 = 127;
}

/// Settings defaults
pub mod defaults {
    pub const POLL_INTERVAL_MS: u64 = 2000;
    pub const MIN_FAN_PERCENT: u8 = 10;
    pub const BRIGHTNESS_TOLERANCE_PERCENT: u8 = 2;
    pub const FAN_TOLERANCE_PERCENT: u8 = 5;
    pub const THRESHOLD_START_RANGE: [u8; 2] = [0, 99];
    pub const THRESHOLD_STOP_RANGE: [u8; 2] = [1, 100];

    /// Shortest poll interval accepted in settings
    pub const MIN_POLL_INTERVAL_MS: u64 = 100;
}

/// /proc/diskstats sector size in bytes, fixed by the kernel ABI
pub const DISKSTATS_SECTOR_SIZE: u64 = 512;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pwm_from_percent() {
        assert_eq!(pwm::from_percent(0), 0);
        assert_eq!(pwm::from_percent(50), 128);
        assert_eq!(pwm::from_percent(100), 255);
        assert_eq!(pwm::from_percent(200), 255);
    }

    #[test]
    fn test_pwm_to_percent() {
        assert_eq!(pwm::to_percent(0), 0);
        assert_eq!(pwm::to_percent(128), 50);
        assert_eq!(pwm::to_percent(255), 100);
    }

    #[test]
    fn test_threshold_pairs_vendor_first() {
        assert_eq!(candidates::THRESHOLD_PAIRS[0].0, "charge_start_threshold");
        assert_eq!(candidates::THRESHOLD_PAIRS[1].1, "charge_control_end_threshold");
    }
}
