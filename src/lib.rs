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

//! laptopctl - Laptop telemetry and privileged hardware control for Linux
//!
//! This library discovers which power, thermal, cpufreq and backlight
//! interfaces the running machine exposes, samples telemetry from them, and
//! applies setting changes through an external privilege escalation tool.

pub mod config;
pub mod constants;
pub mod data;
pub mod error;
pub mod facade;
pub mod hw;
pub mod poller;

#[cfg(test)]
pub mod test_utils;

pub use config::{EscalationTool, Settings};
pub use data::{
    AppliedValue, CapabilityMap, ControlRequest, ControlResult, FanMode, ResourceClass,
    SensorSnapshot,
};
pub use error::{ErrorKind, LaptopctlError, Result};
pub use facade::ControlCenter;
pub use hw::{CancelToken, EscalationOutcome, Escalator, MetricsSource, Prober, WriteOp};
pub use poller::Poller;
