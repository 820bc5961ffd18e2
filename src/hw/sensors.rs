//! Periodic read-only telemetry
//!
//! [`SensorReader::sample`] reads every field independently. A field that
//! cannot be read, or reads back implausible, is left empty and logged at
//! debug level; it never fails the whole snapshot.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, trace};

use crate::config::Settings;
use crate::constants::{limits, temperature};
use crate::data::{
    BatteryState, CapabilityMap, CpuUsage, DiskThroughput, FanMode, PowerSupplyPaths,
    SensorSnapshot,
};
use crate::error::Result;
use crate::hw::metrics::{CpuTimes, DiskIoCounters, MetricsSource};
use crate::hw::sysfs::{self, read_parsed};

pub struct SensorReader {
    metrics: Box<dyn MetricsSource>,
    temperature_range: (f32, f32),
    previous_cpu: Option<CpuTimes>,
    previous_io: Option<(Instant, DiskIoCounters)>,
}

impl SensorReader {
    pub fn new(metrics: Box<dyn MetricsSource>, settings: &Settings) -> Self {
        let [lo, hi] = settings.temperature_range_c;
        Self {
            metrics,
            temperature_range: (lo, hi),
            previous_cpu: None,
            previous_io: None,
        }
    }

    pub fn sample(&mut self, caps: &CapabilityMap) -> SensorSnapshot {
        let cpu = self.sample_cpu();
        let disk_io = self.sample_disk_io();
        let memory = self.metrics.memory();
        let disks = self.metrics.disks();

        let battery = caps.power_supply.as_ref();
        let battery_state = battery
            .and_then(|b| field("battery status", sysfs::read_attr(&b.status)))
            .map(|s| BatteryState::from_sysfs(&s))
            .unwrap_or_default();

        SensorSnapshot {
            timestamp_ms: unix_millis(),
            cpu,
            memory,
            disks,
            disk_io,
            battery_percent: battery.and_then(read_battery_percent),
            battery_state,
            ac_online: caps
                .ac_adapter
                .as_deref()
                .and_then(|p| field("ac online", read_parsed::<u8>(p)))
                .map(|v| v == 1),
            battery_time_remaining_secs: battery
                .filter(|_| battery_state == BatteryState::Discharging)
                .and_then(time_to_empty),
            charge_thresholds: caps
                .battery_thresholds
                .as_ref()
                .and_then(|t| field("charge thresholds", sysfs::read_thresholds(t))),
            governor: caps
                .cpu_freq
                .as_ref()
                .and_then(|c| field("governor", sysfs::read_governor(c))),
            brightness_percent: caps
                .backlight
                .as_ref()
                .and_then(|b| field("brightness", sysfs::read_brightness_percent(b))),
            fan_mode: caps
                .fan_control
                .as_ref()
                .and_then(|f| field("fan mode", sysfs::read_pwm_enable(f)))
                .and_then(FanMode::from_enable),
            temperatures: caps
                .temperature_sources
                .iter()
                .filter_map(|s| {
                    read_temperature_c(&s.path, self.temperature_range).map(|t| (s.name.clone(), t))
                })
                .collect::<BTreeMap<_, _>>(),
            fan_speeds: caps
                .fan_sources
                .iter()
                .filter_map(|s| read_fan_rpm(&s.path).map(|rpm| (s.name.clone(), rpm)))
                .collect(),
        }
    }

    fn sample_cpu(&mut self) -> CpuUsage {
        let Some(current) = self.metrics.cpu_times() else {
            self.previous_cpu = None;
            return CpuUsage::Unavailable;
        };
        let usage = match self.previous_cpu.as_ref() {
            None => CpuUsage::WarmingUp,
            Some(previous) => CpuUsage::Measured {
                overall: current.overall.usage_since(&previous.overall),
                per_core: current
                    .per_core
                    .iter()
                    .zip(previous.per_core.iter())
                    .map(|(now, before)| now.usage_since(before))
                    .collect(),
            },
        };
        self.previous_cpu = Some(current);
        usage
    }

    fn sample_disk_io(&mut self) -> Option<DiskThroughput> {
        let now = Instant::now();
        let Some(current) = self.metrics.disk_io() else {
            self.previous_io = None;
            return None;
        };
        let throughput = self.previous_io.and_then(|(at, previous)| {
            let elapsed = now.duration_since(at).as_secs_f64();
            (elapsed > 0.0).then(|| DiskThroughput {
                read_bytes_per_sec: current.read_bytes.saturating_sub(previous.read_bytes) as f64
                    / elapsed,
                write_bytes_per_sec: current.written_bytes.saturating_sub(previous.written_bytes)
                    as f64
                    / elapsed,
            })
        });
        self.previous_io = Some((now, current));
        throughput
    }
}

fn field<T>(what: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(field = what, error = %e, "Sensor field unavailable");
            None
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn read_battery_percent(battery: &PowerSupplyPaths) -> Option<u8> {
    let value: i64 = field("battery capacity", read_parsed(&battery.capacity))?;
    if !(0..=100).contains(&value) {
        debug!(value, "Discarding out-of-range battery capacity");
        return None;
    }
    Some(value as u8)
}

/// Seconds until empty from energy/power, or charge/current when the
/// battery reports in µAh.
fn time_to_empty(battery: &PowerSupplyPaths) -> Option<u64> {
    drain_seconds(&battery.energy_now, &battery.power_now)
        .or_else(|| drain_seconds(&battery.charge_now, &battery.current_now))
}

fn drain_seconds(level: &Option<PathBuf>, rate: &Option<PathBuf>) -> Option<u64> {
    let level: u64 = read_parsed(level.as_deref()?).ok()?;
    let rate: u64 = read_parsed(rate.as_deref()?).ok()?;
    let seconds = level.checked_mul(3600)?.checked_div(rate)?;
    if seconds > limits::MAX_PLAUSIBLE_RUNTIME_SECS {
        trace!(level, rate, seconds, "Discarding implausible runtime estimate");
        return None;
    }
    Some(seconds)
}

/// Millidegrees to °C, rejecting readings outside the plausible range
pub fn read_temperature_c(path: &Path, range: (f32, f32)) -> Option<f32> {
    let raw: i64 = read_parsed(path).ok()?;
    let celsius = raw as f32 / temperature::MILLIDEGREE_DIVISOR;
    if celsius < range.0 || celsius > range.1 {
        trace!(path = %path.display(), celsius, "Discarding implausible temperature");
        return None;
    }
    Some(celsius)
}

pub fn read_fan_rpm(path: &Path) -> Option<u32> {
    let raw: i64 = read_parsed(path).ok()?;
    if !(0..=limits::MAX_PLAUSIBLE_RPM).contains(&raw) {
        trace!(path = %path.display(), raw, "Discarding implausible fan speed");
        return None;
    }
    Some(raw as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ChargeThresholds, DiskUsage, MemoryUsage};
    use crate::hw::Prober;
    use crate::test_utils::{cpu_time, FakeMetrics, FakeSysfs};

    fn times(busy: u64, idle: u64) -> Option<CpuTimes> {
        Some(CpuTimes {
            overall: cpu_time(busy, idle),
            per_core: vec![cpu_time(busy / 2, idle / 2), cpu_time(busy / 2, idle / 2)],
        })
    }

    fn reader(metrics: FakeMetrics) -> SensorReader {
        SensorReader::new(Box::new(metrics), &Settings::default())
    }

    #[test]
    fn test_first_cpu_sample_is_warming_up() {
        let mut reader = reader(FakeMetrics::with_cpu(vec![times(100, 900), times(150, 950)]));
        let caps = CapabilityMap::default();
        assert_eq!(reader.sample(&caps).cpu, CpuUsage::WarmingUp);
        match reader.sample(&caps).cpu {
            CpuUsage::Measured { overall, per_core } => {
                assert!((overall - 50.0).abs() < 0.01);
                assert_eq!(per_core.len(), 2);
            }
            other => panic!("expected measured usage, got {other:?}"),
        }
    }

    #[test]
    fn test_cpu_unavailable_resets_baseline() {
        let mut reader = reader(FakeMetrics::with_cpu(vec![times(100, 900), None, times(200, 1000)]));
        let caps = CapabilityMap::default();
        assert_eq!(reader.sample(&caps).cpu, CpuUsage::WarmingUp);
        assert_eq!(reader.sample(&caps).cpu, CpuUsage::Unavailable);
        assert_eq!(reader.sample(&caps).cpu, CpuUsage::WarmingUp);
    }

    #[test]
    fn test_disk_io_absent_on_first_sample() {
        let mut metrics = FakeMetrics::default();
        metrics.push_io(Some(DiskIoCounters { read_bytes: 0, written_bytes: 0 }));
        metrics.push_io(Some(DiskIoCounters { read_bytes: 4096, written_bytes: 8192 }));
        let mut reader = reader(metrics);
        let caps = CapabilityMap::default();
        assert!(reader.sample(&caps).disk_io.is_none());
        std::thread::sleep(std::time::Duration::from_millis(5));
        let io = reader.sample(&caps).disk_io.unwrap();
        assert!(io.read_bytes_per_sec > 0.0);
        assert!(io.write_bytes_per_sec > io.read_bytes_per_sec);
    }

    #[test]
    fn test_general_metrics_pass_through() {
        let metrics = FakeMetrics {
            memory: Some(MemoryUsage {
                used_bytes: 4,
                total_bytes: 16,
                swap_used_bytes: 0,
                swap_total_bytes: 8,
            }),
            disks: vec![DiskUsage {
                mount_point: "/".into(),
                used_bytes: 50,
                total_bytes: 100,
            }],
            ..FakeMetrics::default()
        };
        let snap = reader(metrics).sample(&CapabilityMap::default());
        assert_eq!(snap.memory.unwrap().percent(), 25.0);
        assert_eq!(snap.disks[0].percent(), 50.0);
        assert_eq!(snap.cpu, CpuUsage::Unavailable);
    }

    #[test]
    fn test_battery_fields() {
        let sys = FakeSysfs::new();
        sys.battery("BAT0", 64, "Discharging")
            .write("class/power_supply/BAT0/energy_now", "30000000")
            .write("class/power_supply/BAT0/power_now", "10000000")
            .vendor_thresholds("BAT0", 40, 80)
            .ac("AC", false);
        let caps = Prober::new(sys.root()).probe();
        let snap = reader(FakeMetrics::default()).sample(&caps);
        assert_eq!(snap.battery_percent, Some(64));
        assert_eq!(snap.battery_state, BatteryState::Discharging);
        assert_eq!(snap.ac_online, Some(false));
        assert_eq!(snap.battery_time_remaining_secs, Some(3 * 3600));
        assert_eq!(snap.charge_thresholds, Some(ChargeThresholds { start: 40, stop: 80 }));
    }

    #[test]
    fn test_no_time_remaining_while_charging() {
        let sys = FakeSysfs::new();
        sys.battery("BAT0", 64, "Charging")
            .write("class/power_supply/BAT0/charge_now", "3000000")
            .write("class/power_supply/BAT0/current_now", "1500000");
        let caps = Prober::new(sys.root()).probe();
        let snap = reader(FakeMetrics::default()).sample(&caps);
        assert_eq!(snap.battery_time_remaining_secs, None);
    }

    #[test]
    fn test_huge_energy_reading_drops_runtime_only() {
        let sys = FakeSysfs::new();
        sys.battery("BAT0", 64, "Discharging")
            .write("class/power_supply/BAT0/energy_now", "18446744073709551")
            .write("class/power_supply/BAT0/power_now", "1");
        let caps = Prober::new(sys.root()).probe();
        let snap = reader(FakeMetrics::default()).sample(&caps);
        assert_eq!(snap.battery_time_remaining_secs, None);
        assert_eq!(snap.battery_percent, Some(64));
        assert_eq!(snap.battery_state, BatteryState::Discharging);
    }

    #[test]
    fn test_implausibly_long_runtime_dropped() {
        let sys = FakeSysfs::new();
        sys.battery("BAT0", 64, "Discharging")
            .write("class/power_supply/BAT0/energy_now", "50000000")
            .write("class/power_supply/BAT0/power_now", "1");
        let caps = Prober::new(sys.root()).probe();
        let snap = reader(FakeMetrics::default()).sample(&caps);
        assert_eq!(snap.battery_time_remaining_secs, None);
    }

    #[test]
    fn test_out_of_range_battery_percent_dropped() {
        let sys = FakeSysfs::new();
        sys.battery("BAT0", 0, "Unknown")
            .write("class/power_supply/BAT0/capacity", "180");
        let caps = Prober::new(sys.root()).probe();
        let snap = reader(FakeMetrics::default()).sample(&caps);
        assert_eq!(snap.battery_percent, None);
        assert_eq!(snap.battery_state, BatteryState::Unknown);
    }

    #[test]
    fn test_implausible_sensor_values_dropped() {
        let sys = FakeSysfs::new();
        sys.hwmon(0, "coretemp")
            .temp(0, 1, "47500", Some("Core 0"))
            .temp(0, 2, "-274000", Some("Core 1"))
            .temp(0, 3, "255000", Some("Core 2"))
            .hwmon(1, "thinkpad")
            .fan(1, 1, "2400")
            .fan(1, 2, "-1")
            .fan(1, 3, "65535");
        let caps = Prober::new(sys.root()).probe();
        let snap = reader(FakeMetrics::default()).sample(&caps);
        assert_eq!(snap.temperatures.len(), 1);
        assert_eq!(snap.temperatures["coretemp@hwmon0:Core 0"], 47.5);
        assert_eq!(snap.fan_speeds.len(), 1);
        assert_eq!(snap.fan_speeds["thinkpad@hwmon1:fan1"], 2400);
    }

    #[test]
    fn test_control_readbacks() {
        let sys = FakeSysfs::new();
        sys.cpufreq(2, "schedutil", "performance schedutil powersave")
            .backlight("intel_backlight", 468, 937)
            .hwmon(0, "thinkpad")
            .pwm(0, 128, 1);
        let caps = Prober::new(sys.root()).probe();
        let snap = reader(FakeMetrics::default()).sample(&caps);
        assert_eq!(snap.governor.as_deref(), Some("schedutil"));
        assert_eq!(snap.brightness_percent, Some(50));
        assert_eq!(snap.fan_mode, Some(FanMode::Manual));
    }

    #[test]
    fn test_vanished_attribute_degrades_single_field() {
        let sys = FakeSysfs::new();
        sys.cpufreq(1, "powersave", "powersave performance")
            .backlight("intel_backlight", 100, 200);
        let caps = Prober::new(sys.root()).probe();
        std::fs::remove_file(sys.path("class/backlight/intel_backlight/brightness")).unwrap();
        let snap = reader(FakeMetrics::default()).sample(&caps);
        assert_eq!(snap.brightness_percent, None);
        assert_eq!(snap.governor.as_deref(), Some("powersave"));
    }
}
