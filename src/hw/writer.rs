//! Privileged writes with verifying re-read
//!
//! Each request goes through the same pipeline: capability check, pure value
//! validation, exactly one escalation, then a re-read of what the kernel
//! actually holds. Nothing is retried. A zero exit from the escalation tool
//! is not trusted on its own; firmware is free to clamp or ignore writes.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::constants::pwm;
use crate::data::{
    validate_fan_speed, validate_governor_name, validate_percent, validate_thresholds,
    AppliedValue, BacklightPaths, CapabilityMap, ChargeThresholds, ControlRequest,
    ControlResult, CpuFreqPaths, FanControlPaths, FanMode, ResourceClass, ThresholdPaths,
};
use crate::error::{ErrorKind, LaptopctlError, Result};
use crate::hw::escalation::{classify_failure, CancelToken, EscalationOutcome, Escalator, WriteOp};
use crate::hw::sysfs::{
    read_attr, read_available_governors, read_brightness, read_pwm, read_pwm_enable,
    read_thresholds, scale_from_percent, scale_to_percent,
};

/// Limits and tolerances applied to every write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterPolicy {
    pub min_fan_percent: u8,
    pub brightness_tolerance_percent: u8,
    pub fan_tolerance_percent: u8,
    pub threshold_start_range: [u8; 2],
    pub threshold_stop_range: [u8; 2],
}

impl From<&Settings> for WriterPolicy {
    fn from(settings: &Settings) -> Self {
        Self {
            min_fan_percent: settings.min_fan_percent,
            brightness_tolerance_percent: settings.brightness_tolerance_percent,
            fan_tolerance_percent: settings.fan_tolerance_percent,
            threshold_start_range: settings.threshold_start_range,
            threshold_stop_range: settings.threshold_stop_range,
        }
    }
}

pub struct PrivilegedWriter {
    escalator: Arc<dyn Escalator>,
    policy: WriterPolicy,
}

impl PrivilegedWriter {
    pub fn new(escalator: Arc<dyn Escalator>, settings: &Settings) -> Self {
        Self {
            escalator,
            policy: WriterPolicy::from(settings),
        }
    }

    pub fn policy(&self) -> &WriterPolicy {
        &self.policy
    }

    pub fn apply(
        &self,
        caps: &CapabilityMap,
        request: &ControlRequest,
        cancel: &CancelToken,
    ) -> ControlResult {
        match self.try_apply(caps, request, cancel) {
            Ok(applied) => {
                info!(request = %request, applied = %applied, "Control request applied");
                ControlResult::applied(applied)
            }
            Err(e) => {
                match e.kind() {
                    ErrorKind::Unsupported | ErrorKind::InvalidValue => {
                        debug!(request = %request, error = %e, "Control request rejected")
                    }
                    _ => warn!(request = %request, error = %e, "Control request failed"),
                }
                ControlResult::from(&e)
            }
        }
    }

    fn try_apply(
        &self,
        caps: &CapabilityMap,
        request: &ControlRequest,
        cancel: &CancelToken,
    ) -> Result<AppliedValue> {
        let class = request.resource_class();
        match request {
            ControlRequest::SetGovernor { name } => {
                let paths = caps.cpu_freq.as_ref().ok_or_else(|| unsupported(class))?;
                self.set_governor(paths, name, cancel)
            }
            ControlRequest::SetBrightness { percent } => {
                let paths = caps.backlight.as_ref().ok_or_else(|| unsupported(class))?;
                self.set_brightness(paths, *percent, cancel)
            }
            ControlRequest::SetFanMode { mode } => {
                let paths = caps.fan_control.as_ref().ok_or_else(|| unsupported(class))?;
                self.set_fan_mode(paths, *mode, cancel)
            }
            ControlRequest::SetFanSpeed {
                percent,
                override_floor,
            } => {
                let paths = caps.fan_control.as_ref().ok_or_else(|| unsupported(class))?;
                self.set_fan_speed(paths, *percent, *override_floor, cancel)
            }
            ControlRequest::SetBatteryThresholds { start, stop } => {
                let paths = caps
                    .battery_thresholds
                    .as_ref()
                    .ok_or_else(|| unsupported(class))?;
                self.set_thresholds(paths, *start, *stop, cancel)
            }
        }
    }

    fn set_governor(
        &self,
        paths: &CpuFreqPaths,
        name: &str,
        cancel: &CancelToken,
    ) -> Result<AppliedValue> {
        let name = validate_governor_name(name)?;
        let available = read_available_governors(paths)?;
        if !available.iter().any(|g| g == name) {
            return Err(LaptopctlError::invalid_value(format!(
                "governor '{name}' is not one of: {}",
                available.join(", ")
            )));
        }

        let targets = if paths.governor_targets.is_empty() {
            vec![paths.governor.clone()]
        } else {
            paths.governor_targets.clone()
        };
        self.escalate(
            WriteOp::Tee {
                value: name.to_string(),
                targets: targets.clone(),
            },
            cancel,
        )?;

        for target in &targets {
            let observed = read_attr(target)?;
            if observed != name {
                return Err(LaptopctlError::not_applied(
                    name,
                    format!("{observed} on {}", target.display()),
                ));
            }
        }
        Ok(AppliedValue::Governor(name.to_string()))
    }

    fn set_brightness(
        &self,
        paths: &BacklightPaths,
        percent: u8,
        cancel: &CancelToken,
    ) -> Result<AppliedValue> {
        let percent = validate_percent("brightness", percent)?;
        let (_, max) = read_brightness(paths)?;
        if max == 0 {
            return Err(LaptopctlError::transient_read(
                &paths.max_brightness,
                "max_brightness is 0",
            ));
        }
        let target = scale_from_percent(percent, max);
        self.escalate(
            WriteOp::Tee {
                value: target.to_string(),
                targets: vec![paths.brightness.clone()],
            },
            cancel,
        )?;

        let (raw, max) = read_brightness(paths)?;
        let observed = scale_to_percent(raw, max);
        // Coarse panels (max_brightness of 7 or so) cannot hit every percentage
        let within_percent = observed.abs_diff(percent) <= self.policy.brightness_tolerance_percent;
        let within_step = raw.abs_diff(target) <= 1;
        if within_percent || within_step {
            Ok(AppliedValue::Brightness(observed))
        } else {
            Err(LaptopctlError::not_applied(
                format!("{percent}% (raw {target})"),
                format!("{observed}% (raw {raw})"),
            ))
        }
    }

    fn set_fan_mode(
        &self,
        paths: &FanControlPaths,
        mode: FanMode,
        cancel: &CancelToken,
    ) -> Result<AppliedValue> {
        let enable = mode.enable_value().to_string();
        // Taking manual control keeps whatever duty cycle pwm1 holds, so a
        // stopped or crawling fan is raised to the floor in the same script
        let floor = pwm::from_percent(self.policy.min_fan_percent);
        let raise_to_floor = mode == FanMode::Manual
            && read_pwm(paths).map_or(true, |current| current < floor);
        let op = if raise_to_floor {
            info!(
                floor_percent = self.policy.min_fan_percent,
                "Raising fan to safety floor for manual mode"
            );
            WriteOp::Script {
                writes: vec![
                    (paths.pwm_enable.clone(), enable),
                    (paths.pwm.clone(), floor.to_string()),
                ],
            }
        } else {
            WriteOp::Tee {
                value: enable,
                targets: vec![paths.pwm_enable.clone()],
            }
        };
        self.escalate(op, cancel)?;

        let observed = read_pwm_enable(paths)?;
        if FanMode::from_enable(observed) != Some(mode) {
            return Err(LaptopctlError::not_applied(
                format!("{mode} ({})", mode.enable_value()),
                format!("pwm1_enable={observed}"),
            ));
        }
        if raise_to_floor {
            let observed = pwm::to_percent(read_pwm(paths)?);
            let lowest = self
                .policy
                .min_fan_percent
                .saturating_sub(self.policy.fan_tolerance_percent);
            if observed < lowest {
                return Err(LaptopctlError::not_applied(
                    format!("at least {}%", self.policy.min_fan_percent),
                    format!("{observed}%"),
                ));
            }
        }
        Ok(AppliedValue::FanMode(mode))
    }

    fn set_fan_speed(
        &self,
        paths: &FanControlPaths,
        percent: u8,
        override_floor: bool,
        cancel: &CancelToken,
    ) -> Result<AppliedValue> {
        let percent = validate_fan_speed(percent, self.policy.min_fan_percent, override_floor)?;
        if percent < self.policy.min_fan_percent {
            warn!(
                percent,
                floor = self.policy.min_fan_percent,
                "Fan speed below safety floor requested with override"
            );
        }

        let value = pwm::from_percent(percent).to_string();
        let already_manual = read_pwm_enable(paths).ok() == Some(pwm::enable::MANUAL);
        let op = if already_manual {
            WriteOp::Tee {
                value,
                targets: vec![paths.pwm.clone()],
            }
        } else {
            WriteOp::Script {
                writes: vec![
                    (paths.pwm_enable.clone(), pwm::enable::MANUAL.to_string()),
                    (paths.pwm.clone(), value),
                ],
            }
        };
        self.escalate(op, cancel)?;

        let enable = read_pwm_enable(paths)?;
        if enable != pwm::enable::MANUAL {
            return Err(LaptopctlError::not_applied(
                "manual fan mode",
                format!("pwm1_enable={enable}"),
            ));
        }
        let observed = pwm::to_percent(read_pwm(paths)?);
        if observed.abs_diff(percent) <= self.policy.fan_tolerance_percent {
            Ok(AppliedValue::FanSpeed(observed))
        } else {
            Err(LaptopctlError::not_applied(
                format!("{percent}%"),
                format!("{observed}%"),
            ))
        }
    }

    fn set_thresholds(
        &self,
        paths: &ThresholdPaths,
        start: u8,
        stop: u8,
        cancel: &CancelToken,
    ) -> Result<AppliedValue> {
        let (start, stop) = validate_thresholds(
            start,
            stop,
            self.policy.threshold_start_range,
            self.policy.threshold_stop_range,
        )?;
        let wanted = ChargeThresholds { start, stop };

        // The kernel rejects start >= stop at every step, not just at the end
        let stop_first = match read_thresholds(paths) {
            Ok(current) => start >= current.stop,
            Err(e) => {
                debug!(error = %e, "Current thresholds unreadable, writing start first");
                false
            }
        };
        let start_write = (paths.start.clone(), start.to_string());
        let stop_write = (paths.stop.clone(), stop.to_string());
        let writes = if stop_first {
            vec![stop_write, start_write]
        } else {
            vec![start_write, stop_write]
        };
        self.escalate(WriteOp::Script { writes }, cancel)?;

        let observed = read_thresholds(paths)?;
        if observed == wanted {
            Ok(AppliedValue::BatteryThresholds(observed))
        } else {
            Err(LaptopctlError::not_applied(wanted, observed))
        }
    }

    fn escalate(&self, op: WriteOp, cancel: &CancelToken) -> Result<()> {
        match self.escalator.run(&op, cancel) {
            EscalationOutcome::Success => Ok(()),
            EscalationOutcome::Failed { code, stderr } => Err(classify_failure(code, &stderr)),
            EscalationOutcome::ToolMissing(tool) => Err(LaptopctlError::ExternalToolMissing(tool)),
            EscalationOutcome::Cancelled => Err(LaptopctlError::Cancelled),
        }
    }
}

fn unsupported(class: ResourceClass) -> LaptopctlError {
    LaptopctlError::Unsupported(format!("no {class} control found"))
}
