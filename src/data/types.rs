//! Core data types for laptopctl
//!
//! Capability snapshots, sensor snapshots, control requests and results.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::pwm;
use crate::error::{ErrorKind, LaptopctlError};

// ============================================================================
// Capability map
// ============================================================================

/// Resolved battery attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PowerSupplyPaths {
    pub name: String,
    pub dir: PathBuf,
    pub capacity: PathBuf,
    pub status: PathBuf,
    pub energy_now: Option<PathBuf>,
    pub power_now: Option<PathBuf>,
    pub charge_now: Option<PathBuf>,
    pub current_now: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CpuFreqPaths {
    /// cpu0 governor, used for readback
    pub governor: PathBuf,
    pub available_governors: PathBuf,
    /// Every cpuN governor file, in index order
    pub governor_targets: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BacklightPaths {
    pub name: String,
    pub brightness: PathBuf,
    pub max_brightness: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FanControlPaths {
    /// Chip id in "name@hwmonN" form
    pub chip: String,
    pub pwm: PathBuf,
    pub pwm_enable: PathBuf,
    pub fan_input: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdLayout {
    /// charge_start_threshold / charge_stop_threshold (thinkpad_acpi and friends)
    Vendor,
    /// charge_control_start_threshold / charge_control_end_threshold
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThresholdPaths {
    pub layout: ThresholdLayout,
    pub start: PathBuf,
    pub stop: PathBuf,
}

/// A named read-only sensor input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorSource {
    pub name: String,
    pub path: PathBuf,
}

/// Immutable description of what this machine exposes.
///
/// Every control capability is an `Option`: a capability is present only
/// with all of its backing paths resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapabilityMap {
    pub power_supply: Option<PowerSupplyPaths>,
    pub ac_adapter: Option<PathBuf>,
    pub cpu_freq: Option<CpuFreqPaths>,
    pub backlight: Option<BacklightPaths>,
    pub fan_control: Option<FanControlPaths>,
    pub battery_thresholds: Option<ThresholdPaths>,
    pub temperature_sources: Vec<SensorSource>,
    pub fan_sources: Vec<SensorSource>,
}

impl CapabilityMap {
    pub fn has_power_supply(&self) -> bool {
        self.power_supply.is_some()
    }

    pub fn has_cpu_freq(&self) -> bool {
        self.cpu_freq.is_some()
    }

    pub fn has_backlight(&self) -> bool {
        self.backlight.is_some()
    }

    pub fn has_fan_control(&self) -> bool {
        self.fan_control.is_some()
    }

    pub fn has_battery_thresholds(&self) -> bool {
        self.battery_thresholds.is_some()
    }

    pub fn supports(&self, class: ResourceClass) -> bool {
        match class {
            ResourceClass::Governor => self.has_cpu_freq(),
            ResourceClass::Brightness => self.has_backlight(),
            ResourceClass::Fan => self.has_fan_control(),
            ResourceClass::BatteryThreshold => self.has_battery_thresholds(),
        }
    }

    pub fn flags(&self) -> CapabilityFlags {
        CapabilityFlags {
            has_power_supply: self.has_power_supply(),
            has_cpu_freq: self.has_cpu_freq(),
            has_backlight: self.has_backlight(),
            has_fan_control: self.has_fan_control(),
            has_battery_thresholds: self.has_battery_thresholds(),
        }
    }
}

/// Boolean view of a [`CapabilityMap`] for front-ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityFlags {
    pub has_power_supply: bool,
    pub has_cpu_freq: bool,
    pub has_backlight: bool,
    pub has_fan_control: bool,
    pub has_battery_thresholds: bool,
}

// ============================================================================
// Sensor snapshot
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CpuUsage {
    /// No previous sample to diff against yet
    WarmingUp,
    Unavailable,
    Measured { overall: f32, per_core: Vec<f32> },
}

impl CpuUsage {
    pub fn overall(&self) -> Option<f32> {
        match self {
            CpuUsage::Measured { overall, .. } => Some(*overall),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryUsage {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub swap_used_bytes: u64,
    pub swap_total_bytes: u64,
}

impl MemoryUsage {
    pub fn percent(&self) -> f32 {
        percent_of(self.used_bytes, self.total_bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskUsage {
    pub mount_point: String,
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl DiskUsage {
    pub fn percent(&self) -> f32 {
        percent_of(self.used_bytes, self.total_bytes)
    }
}

fn percent_of(used: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    (used as f64 / total as f64 * 100.0) as f32
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiskThroughput {
    pub read_bytes_per_sec: f64,
    pub write_bytes_per_sec: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryState {
    Charging,
    Discharging,
    Full,
    NotCharging,
    #[default]
    Unknown,
}

impl BatteryState {
    /// Map a power_supply `status` value
    pub fn from_sysfs(status: &str) -> Self {
        match status.trim() {
            "Charging" => BatteryState::Charging,
            "Discharging" => BatteryState::Discharging,
            "Full" => BatteryState::Full,
            "Not charging" => BatteryState::NotCharging,
            _ => BatteryState::Unknown,
        }
    }
}

impl fmt::Display for BatteryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatteryState::Charging => "charging",
            BatteryState::Discharging => "discharging",
            BatteryState::Full => "full",
            BatteryState::NotCharging => "not charging",
            BatteryState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanMode {
    Auto,
    Manual,
}

impl FanMode {
    /// Decode a pwmN_enable value. 0 (full speed, no control) is not a mode we drive.
    pub fn from_enable(value: u8) -> Option<Self> {
        match value {
            pwm::enable::MANUAL => Some(FanMode::Manual),
            pwm::enable::AUTOMATIC => Some(FanMode::Auto),
            _ => None,
        }
    }

    pub fn enable_value(&self) -> u8 {
        match self {
            FanMode::Manual => pwm::enable::MANUAL,
            FanMode::Auto => pwm::enable::AUTOMATIC,
        }
    }
}

impl fmt::Display for FanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FanMode::Auto => f.write_str("auto"),
            FanMode::Manual => f.write_str("manual"),
        }
    }
}

impl FromStr for FanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" | "automatic" => Ok(FanMode::Auto),
            "manual" => Ok(FanMode::Manual),
            other => Err(format!("unknown fan mode '{other}' (expected auto or manual)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeThresholds {
    pub start: u8,
    pub stop: u8,
}

impl fmt::Display for ChargeThresholds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}%", self.start, self.stop)
    }
}

/// One polling tick's worth of telemetry. Fields that could not be read are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSnapshot {
    /// Unix time in milliseconds
    pub timestamp_ms: u64,
    pub cpu: CpuUsage,
    pub memory: Option<MemoryUsage>,
    pub disks: Vec<DiskUsage>,
    pub disk_io: Option<DiskThroughput>,
    pub battery_percent: Option<u8>,
    pub battery_state: BatteryState,
    pub ac_online: Option<bool>,
    pub battery_time_remaining_secs: Option<u64>,
    pub charge_thresholds: Option<ChargeThresholds>,
    pub governor: Option<String>,
    pub brightness_percent: Option<u8>,
    pub fan_mode: Option<FanMode>,
    pub temperatures: BTreeMap<String, f32>,
    pub fan_speeds: BTreeMap<String, u32>,
}

// ============================================================================
// Control requests and results
// ============================================================================

/// Serialization domain for writes; at most one write per class is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClass {
    Governor,
    Brightness,
    Fan,
    BatteryThreshold,
}

impl ResourceClass {
    pub const COUNT: usize = 4;

    pub const ALL: [ResourceClass; Self::COUNT] = [
        ResourceClass::Governor,
        ResourceClass::Brightness,
        ResourceClass::Fan,
        ResourceClass::BatteryThreshold,
    ];

    pub fn index(&self) -> usize {
        match self {
            ResourceClass::Governor => 0,
            ResourceClass::Brightness => 1,
            ResourceClass::Fan => 2,
            ResourceClass::BatteryThreshold => 3,
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceClass::Governor => "governor",
            ResourceClass::Brightness => "brightness",
            ResourceClass::Fan => "fan",
            ResourceClass::BatteryThreshold => "battery threshold",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControlRequest {
    SetGovernor { name: String },
    SetBrightness { percent: u8 },
    SetFanMode { mode: FanMode },
    SetFanSpeed { percent: u8, override_floor: bool },
    SetBatteryThresholds { start: u8, stop: u8 },
}

impl ControlRequest {
    pub fn resource_class(&self) -> ResourceClass {
        match self {
            ControlRequest::SetGovernor { .. } => ResourceClass::Governor,
            ControlRequest::SetBrightness { .. } => ResourceClass::Brightness,
            ControlRequest::SetFanMode { .. } | ControlRequest::SetFanSpeed { .. } => {
                ResourceClass::Fan
            }
            ControlRequest::SetBatteryThresholds { .. } => ResourceClass::BatteryThreshold,
        }
    }
}

impl fmt::Display for ControlRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlRequest::SetGovernor { name } => write!(f, "governor={name}"),
            ControlRequest::SetBrightness { percent } => write!(f, "brightness={percent}%"),
            ControlRequest::SetFanMode { mode } => write!(f, "fan_mode={mode}"),
            ControlRequest::SetFanSpeed { percent, override_floor } => {
                write!(f, "fan_speed={percent}%")?;
                if *override_floor {
                    f.write_str(" (floor overridden)")?;
                }
                Ok(())
            }
            ControlRequest::SetBatteryThresholds { start, stop } => {
                write!(f, "thresholds={start}-{stop}%")
            }
        }
    }
}

/// Value observed on re-read after a successful write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AppliedValue {
    Governor(String),
    Brightness(u8),
    FanMode(FanMode),
    FanSpeed(u8),
    BatteryThresholds(ChargeThresholds),
}

impl fmt::Display for AppliedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppliedValue::Governor(name) => write!(f, "governor {name}"),
            AppliedValue::Brightness(p) => write!(f, "brightness {p}%"),
            AppliedValue::FanMode(mode) => write!(f, "fan mode {mode}"),
            AppliedValue::FanSpeed(p) => write!(f, "fan speed {p}%"),
            AppliedValue::BatteryThresholds(t) => write!(f, "charge thresholds {t}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlResult {
    pub succeeded: bool,
    pub applied: Option<AppliedValue>,
    pub error: Option<ErrorKind>,
    pub message: Option<String>,
}

impl ControlResult {
    pub fn applied(value: AppliedValue) -> Self {
        Self {
            succeeded: true,
            applied: Some(value),
            error: None,
            message: None,
        }
    }

    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            applied: None,
            error: Some(kind),
            message: Some(message.into()),
        }
    }
}

impl From<&LaptopctlError> for ControlResult {
    fn from(err: &LaptopctlError) -> Self {
        ControlResult::failed(err.kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battery_state_from_sysfs() {
        assert_eq!(BatteryState::from_sysfs("Charging\n"), BatteryState::Charging);
        assert_eq!(BatteryState::from_sysfs("Not charging"), BatteryState::NotCharging);
        assert_eq!(BatteryState::from_sysfs("Full"), BatteryState::Full);
        assert_eq!(BatteryState::from_sysfs("bogus"), BatteryState::Unknown);
    }

    #[test]
    fn test_fan_mode_enable_values() {
        assert_eq!(FanMode::from_enable(1), Some(FanMode::Manual));
        assert_eq!(FanMode::from_enable(2), Some(FanMode::Auto));
        assert_eq!(FanMode::from_enable(0), None);
        assert_eq!(FanMode::Manual.enable_value(), 1);
        assert_eq!("AUTO".parse::<FanMode>(), Ok(FanMode::Auto));
        assert!("turbo".parse::<FanMode>().is_err());
    }

    #[test]
    fn test_request_resource_classes() {
        let fan_mode = ControlRequest::SetFanMode { mode: FanMode::Auto };
        let fan_speed = ControlRequest::SetFanSpeed { percent: 50, override_floor: false };
        assert_eq!(fan_mode.resource_class(), fan_speed.resource_class());
        assert_eq!(
            ControlRequest::SetBatteryThresholds { start: 20, stop: 80 }.resource_class(),
            ResourceClass::BatteryThreshold
        );
        let indices: Vec<usize> = ResourceClass::ALL.iter().map(|c| c.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_capability_supports_matches_options() {
        let caps = CapabilityMap {
            backlight: Some(BacklightPaths {
                name: "intel_backlight".into(),
                brightness: "/b".into(),
                max_brightness: "/m".into(),
            }),
            ..CapabilityMap::default()
        };
        assert!(caps.supports(ResourceClass::Brightness));
        assert!(!caps.supports(ResourceClass::Governor));
        assert!(caps.flags().has_backlight);
        assert!(!caps.flags().has_power_supply);
    }

    #[test]
    fn test_control_result_from_error() {
        let result = ControlResult::from(&LaptopctlError::Busy("fan".into()));
        assert!(!result.succeeded);
        assert_eq!(result.error, Some(ErrorKind::Busy));
        assert!(result.applied.is_none());
    }

    #[test]
    fn test_request_json_shape() {
        let req: ControlRequest =
            serde_json::from_str(r#"{"kind":"set_battery_thresholds","start":20,"stop":80}"#)
                .unwrap();
        assert_eq!(req, ControlRequest::SetBatteryThresholds { start: 20, stop: 80 });
    }

    #[test]
    fn test_cpu_usage_overall() {
        assert_eq!(CpuUsage::WarmingUp.overall(), None);
        let measured = CpuUsage::Measured { overall: 12.5, per_core: vec![10.0, 15.0] };
        assert_eq!(measured.overall(), Some(12.5));
    }
}
