//! Capability discovery
//!
//! Resolves which control surfaces and sensors this machine exposes by
//! walking fixed, ordered candidate lists under the sysfs root. The prober
//! only opens attributes to confirm they are readable, plus the small static
//! `name`, `type` and label files used to name sensors.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::constants::{candidates, limits, paths};
use crate::data::{
    BacklightPaths, CapabilityMap, CpuFreqPaths, FanControlPaths, PowerSupplyPaths,
    SensorSource, ThresholdLayout, ThresholdPaths,
};
use crate::hw::sysfs::{is_readable, read_trimmed};

/// Builds [`CapabilityMap`] snapshots from a sysfs tree
#[derive(Debug, Clone)]
pub struct Prober {
    sysfs_root: PathBuf,
}

impl Default for Prober {
    fn default() -> Self {
        Self::new(paths::SYSFS_ROOT)
    }
}

impl Prober {
    pub fn new(sysfs_root: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
        }
    }

    pub fn sysfs_root(&self) -> &Path {
        &self.sysfs_root
    }

    /// Probe every capability. Never fails: anything missing is `None`.
    pub fn probe(&self) -> CapabilityMap {
        let power_supply = self.probe_battery();
        let battery_thresholds = power_supply
            .as_ref()
            .and_then(|battery| probe_thresholds(&battery.dir));

        let mut temperature_sources = Vec::new();
        let mut fan_sources = Vec::new();
        let mut fan_control = None;
        for (index, chip_dir) in self.hwmon_dirs() {
            let chip = chip_name(&chip_dir, index);
            if fan_control.is_none() {
                fan_control = probe_fan_control(&chip_dir, &chip);
            }
            collect_chip_sensors(&chip_dir, &chip, &mut temperature_sources, &mut fan_sources);
        }
        if temperature_sources.is_empty() {
            temperature_sources = self.probe_thermal_zones();
        }

        let caps = CapabilityMap {
            power_supply,
            ac_adapter: self.probe_ac_adapter(),
            cpu_freq: self.probe_cpu_freq(),
            backlight: self.probe_backlight(),
            fan_control,
            battery_thresholds,
            temperature_sources,
            fan_sources,
        };

        info!(
            battery = caps.power_supply.as_ref().map(|b| b.name.as_str()).unwrap_or("none"),
            cpu_freq = caps.has_cpu_freq(),
            backlight = caps.backlight.as_ref().map(|b| b.name.as_str()).unwrap_or("none"),
            fan_control = caps.fan_control.as_ref().map(|f| f.chip.as_str()).unwrap_or("none"),
            thresholds = caps.has_battery_thresholds(),
            temps = caps.temperature_sources.len(),
            fans = caps.fan_sources.len(),
            "Capability probe complete"
        );
        caps
    }

    fn probe_battery(&self) -> Option<PowerSupplyPaths> {
        let base = self.sysfs_root.join(paths::POWER_SUPPLY_DIR);
        candidates::BATTERIES.iter().find_map(|name| {
            let dir = base.join(name);
            let capacity = dir.join("capacity");
            let status = dir.join("status");
            if !(is_readable(&capacity) && is_readable(&status)) {
                return None;
            }
            debug!(battery = name, "Found battery");
            Some(PowerSupplyPaths {
                name: name.to_string(),
                capacity,
                status,
                energy_now: optional(&dir, "energy_now"),
                power_now: optional(&dir, "power_now"),
                charge_now: optional(&dir, "charge_now"),
                current_now: optional(&dir, "current_now"),
                dir,
            })
        })
    }

    fn probe_ac_adapter(&self) -> Option<PathBuf> {
        let base = self.sysfs_root.join(paths::POWER_SUPPLY_DIR);
        candidates::AC_ADAPTERS
            .iter()
            .map(|name| base.join(name).join("online"))
            .find(|path| is_readable(path))
    }

    fn probe_cpu_freq(&self) -> Option<CpuFreqPaths> {
        let cpu_base = self.sysfs_root.join(paths::CPU_DIR);
        let cpufreq0 = cpu_base.join("cpu0").join("cpufreq");
        let governor = cpufreq0.join("scaling_governor");
        let available_governors = cpufreq0.join("scaling_available_governors");
        if !(is_readable(&governor) && is_readable(&available_governors)) {
            return None;
        }

        // cpuN directories exist for offline CPUs too, so the first gap ends the scan
        let mut governor_targets = Vec::new();
        for n in 0..limits::MAX_CPUS {
            let cpu_dir = cpu_base.join(format!("cpu{n}"));
            if !cpu_dir.is_dir() {
                break;
            }
            let target = cpu_dir.join("cpufreq").join("scaling_governor");
            if is_readable(&target) {
                governor_targets.push(target);
            }
        }
        debug!(cpus = governor_targets.len(), "Found cpufreq governors");

        Some(CpuFreqPaths {
            governor,
            available_governors,
            governor_targets,
        })
    }

    fn probe_backlight(&self) -> Option<BacklightPaths> {
        let base = self.sysfs_root.join(paths::BACKLIGHT_DIR);
        candidates::BACKLIGHTS.iter().find_map(|name| {
            let dir = base.join(name);
            let brightness = dir.join("brightness");
            let max_brightness = dir.join("max_brightness");
            (is_readable(&brightness) && is_readable(&max_brightness)).then(|| BacklightPaths {
                name: name.to_string(),
                brightness,
                max_brightness,
            })
        })
    }

    fn hwmon_dirs(&self) -> impl Iterator<Item = (usize, PathBuf)> + '_ {
        let base = self.sysfs_root.join(paths::HWMON_DIR);
        (0..limits::MAX_HWMON)
            .map(move |i| (i, base.join(format!("hwmon{i}"))))
            .filter(|(_, dir)| dir.is_dir())
    }

    fn probe_thermal_zones(&self) -> Vec<SensorSource> {
        let base = self.sysfs_root.join(paths::THERMAL_DIR);
        (0..limits::MAX_THERMAL_ZONES)
            .filter_map(|n| {
                let zone = format!("thermal_zone{n}");
                let path = base.join(&zone).join("temp");
                if !is_readable(&path) {
                    return None;
                }
                let zone_type = read_trimmed(base.join(&zone).join("type"))
                    .ok()
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "temp".to_string());
                Some(SensorSource {
                    name: format!("{zone}:{zone_type}"),
                    path,
                })
            })
            .collect()
    }
}

fn optional(dir: &Path, attr: &str) -> Option<PathBuf> {
    let path = dir.join(attr);
    is_readable(&path).then_some(path)
}

fn probe_thresholds(battery_dir: &Path) -> Option<ThresholdPaths> {
    candidates::THRESHOLD_PAIRS
        .iter()
        .zip([ThresholdLayout::Vendor, ThresholdLayout::Generic])
        .find_map(|((start, stop), layout)| {
            let start = battery_dir.join(start);
            let stop = battery_dir.join(stop);
            (is_readable(&start) && is_readable(&stop)).then_some(ThresholdPaths {
                layout,
                start,
                stop,
            })
        })
}

fn chip_name(chip_dir: &Path, index: usize) -> String {
    let name = read_trimmed(chip_dir.join("name"))
        .ok()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "hwmon".to_string());
    format!("{name}@hwmon{index}")
}

fn probe_fan_control(chip_dir: &Path, chip: &str) -> Option<FanControlPaths> {
    let pwm = chip_dir.join("pwm1");
    let pwm_enable = chip_dir.join("pwm1_enable");
    if !(is_readable(&pwm) && is_readable(&pwm_enable)) {
        return None;
    }
    debug!(chip, "Found controllable fan");
    Some(FanControlPaths {
        chip: chip.to_string(),
        pwm,
        pwm_enable,
        fan_input: optional(chip_dir, "fan1_input"),
    })
}

fn collect_chip_sensors(
    chip_dir: &Path,
    chip: &str,
    temps: &mut Vec<SensorSource>,
    fans: &mut Vec<SensorSource>,
) {
    for n in 1..=limits::MAX_TEMP_INPUTS {
        let path = chip_dir.join(format!("temp{n}_input"));
        if is_readable(&path) {
            let label = read_trimmed(chip_dir.join(format!("temp{n}_label")))
                .ok()
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| format!("temp{n}"));
            temps.push(SensorSource {
                name: format!("{chip}:{label}"),
                path,
            });
        }
    }
    for n in 1..=limits::MAX_FAN_INPUTS {
        let path = chip_dir.join(format!("fan{n}_input"));
        if is_readable(&path) {
            let label = read_trimmed(chip_dir.join(format!("fan{n}_label")))
                .ok()
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| format!("fan{n}"));
            fans.push(SensorSource {
                name: format!("{chip}:{label}"),
                path,
            });
        }
    }
}
