/*
 * Test utilities for laptopctl
 *
 * Builders for throwaway sysfs trees and scripted metrics sources, shared by
 * the unit tests of the hw and facade modules.
 */

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::data::{DiskUsage, MemoryUsage};
use crate::hw::{CpuTime, CpuTimes, DiskIoCounters, MetricsSource};

/// A temporary directory laid out like `/sys`
pub struct FakeSysfs {
    dir: TempDir,
}

impl Default for FakeSysfs {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSysfs {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp sysfs root"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, contents: &str) -> &Self {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().expect("attribute has a parent")).unwrap();
        fs::write(&path, format!("{contents}\n")).unwrap();
        self
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).unwrap().trim().to_string()
    }

    pub fn battery(&self, name: &str, capacity: u8, status: &str) -> &Self {
        self.write(&format!("class/power_supply/{name}/capacity"), &capacity.to_string())
            .write(&format!("class/power_supply/{name}/status"), status)
    }

    pub fn vendor_thresholds(&self, battery: &str, start: u8, stop: u8) -> &Self {
        let base = format!("class/power_supply/{battery}");
        self.write(&format!("{base}/charge_start_threshold"), &start.to_string())
            .write(&format!("{base}/charge_stop_threshold"), &stop.to_string())
    }

    pub fn generic_thresholds(&self, battery: &str, start: u8, stop: u8) -> &Self {
        let base = format!("class/power_supply/{battery}");
        self.write(&format!("{base}/charge_control_start_threshold"), &start.to_string())
            .write(&format!("{base}/charge_control_end_threshold"), &stop.to_string())
    }

    pub fn ac(&self, name: &str, online: bool) -> &Self {
        self.write(
            &format!("class/power_supply/{name}/online"),
            if online { "1" } else { "0" },
        )
    }

    pub fn cpufreq(&self, cpus: usize, governor: &str, available: &str) -> &Self {
        for n in 0..cpus {
            self.write(
                &format!("devices/system/cpu/cpu{n}/cpufreq/scaling_governor"),
                governor,
            );
        }
        self.write(
            "devices/system/cpu/cpu0/cpufreq/scaling_available_governors",
            available,
        )
    }

    pub fn backlight(&self, name: &str, brightness: u64, max: u64) -> &Self {
        self.write(&format!("class/backlight/{name}/brightness"), &brightness.to_string())
            .write(&format!("class/backlight/{name}/max_brightness"), &max.to_string())
    }

    pub fn hwmon(&self, index: usize, name: &str) -> &Self {
        self.write(&format!("class/hwmon/hwmon{index}/name"), name)
    }

    pub fn pwm(&self, index: usize, value: u8, enable: u8) -> &Self {
        self.write(&format!("class/hwmon/hwmon{index}/pwm1"), &value.to_string())
            .write(&format!("class/hwmon/hwmon{index}/pwm1_enable"), &enable.to_string())
    }

    pub fn temp(&self, index: usize, n: usize, raw: &str, label: Option<&str>) -> &Self {
        self.write(&format!("class/hwmon/hwmon{index}/temp{n}_input"), raw);
        if let Some(label) = label {
            self.write(&format!("class/hwmon/hwmon{index}/temp{n}_label"), label);
        }
        self
    }

    pub fn fan(&self, index: usize, n: usize, raw: &str) -> &Self {
        self.write(&format!("class/hwmon/hwmon{index}/fan{n}_input"), raw)
    }

    pub fn thermal_zone(&self, n: usize, zone_type: &str, raw: &str) -> &Self {
        self.write(&format!("class/thermal/thermal_zone{n}/type"), zone_type)
            .write(&format!("class/thermal/thermal_zone{n}/temp"), raw)
    }

    /// Every file under the root with its contents, for before/after comparisons
    pub fn contents(&self) -> BTreeMap<PathBuf, String> {
        fn walk(dir: &Path, out: &mut BTreeMap<PathBuf, String>) {
            for entry in fs::read_dir(dir).unwrap().flatten() {
                let path = entry.path();
                if path.is_dir() {
                    walk(&path, out);
                } else {
                    out.insert(path.clone(), fs::read_to_string(&path).unwrap_or_default());
                }
            }
        }
        let mut out = BTreeMap::new();
        walk(self.root(), &mut out);
        out
    }
}

/// Build a CpuTime pair from busy/idle jiffies
pub fn cpu_time(busy: u64, idle: u64) -> CpuTime {
    CpuTime {
        busy,
        total: busy + idle,
    }
}

/// Metrics source replaying scripted counters; the last value repeats
#[derive(Default)]
pub struct FakeMetrics {
    pub cpu: VecDeque<Option<CpuTimes>>,
    pub io: VecDeque<Option<DiskIoCounters>>,
    pub memory: Option<MemoryUsage>,
    pub disks: Vec<DiskUsage>,
}

impl FakeMetrics {
    pub fn with_cpu(samples: Vec<Option<CpuTimes>>) -> Self {
        Self {
            cpu: samples.into(),
            ..Self::default()
        }
    }

    pub fn push_io(&mut self, counters: Option<DiskIoCounters>) {
        self.io.push_back(counters);
    }
}

fn next_or_last<T: Clone>(queue: &mut VecDeque<Option<T>>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front().flatten()
    } else {
        queue.front().cloned().flatten()
    }
}

impl MetricsSource for FakeMetrics {
    fn cpu_times(&mut self) -> Option<CpuTimes> {
        next_or_last(&mut self.cpu)
    }

    fn memory(&mut self) -> Option<MemoryUsage> {
        self.memory
    }

    fn disks(&mut self) -> Vec<DiskUsage> {
        self.disks.clone()
    }

    fn disk_io(&mut self) -> Option<DiskIoCounters> {
        next_or_last(&mut self.io)
    }
}
