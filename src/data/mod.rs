//! Data types and validation
//!
//! Contains the capability map, sensor snapshot and control request/result types.

mod types;
mod validation;

pub use types::{
    AppliedValue, BacklightPaths, BatteryState, CapabilityFlags, CapabilityMap,
    ChargeThresholds, ControlRequest, ControlResult, CpuFreqPaths, CpuUsage, DiskThroughput,
    DiskUsage, FanControlPaths, FanMode, MemoryUsage, PowerSupplyPaths, ResourceClass,
    SensorSnapshot, SensorSource, ThresholdLayout, ThresholdPaths,
};
pub use validation::{
    validate_fan_speed, validate_governor_name, validate_percent, validate_thresholds,
};
