//! System-wide metrics source
//!
//! The sensor reader consumes general metrics through [`MetricsSource`] so it
//! can be driven by scripted counters in tests. The production implementation
//! uses `sysinfo` for memory and filesystem capacity, and reads the cumulative
//! CPU and block-device counters from procfs directly.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use sysinfo::{Disks, System};
use tracing::{debug, trace};

use crate::constants::{paths, DISKSTATS_SECTOR_SIZE};
use crate::data::{DiskUsage, MemoryUsage};

/// Cumulative jiffies for one CPU line of /proc/stat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTime {
    pub busy: u64,
    pub total: u64,
}

impl CpuTime {
    /// Busy share of the interval since `previous`, in percent
    pub fn usage_since(&self, previous: &CpuTime) -> f32 {
        let total = self.total.saturating_sub(previous.total);
        if total == 0 {
            return 0.0;
        }
        let busy = self.busy.saturating_sub(previous.busy).min(total);
        (busy as f64 / total as f64 * 100.0) as f32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CpuTimes {
    pub overall: CpuTime,
    pub per_core: Vec<CpuTime>,
}

/// Cumulative bytes moved by whole block devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiskIoCounters {
    pub read_bytes: u64,
    pub written_bytes: u64,
}

/// Source of general system metrics
pub trait MetricsSource: Send {
    fn cpu_times(&mut self) -> Option<CpuTimes>;
    fn memory(&mut self) -> Option<MemoryUsage>;
    fn disks(&mut self) -> Vec<DiskUsage>;
    fn disk_io(&mut self) -> Option<DiskIoCounters>;
}

pub struct SystemMetrics {
    system: System,
    disks: Disks,
    procfs_root: PathBuf,
}

impl SystemMetrics {
    pub fn new(procfs_root: impl Into<PathBuf>) -> Self {
        Self {
            system: System::new(),
            disks: Disks::new_with_refreshed_list(),
            procfs_root: procfs_root.into(),
        }
    }

    fn read_proc(&self, name: &str) -> Option<String> {
        let path = self.procfs_root.join(name);
        match fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "procfs read failed");
                None
            }
        }
    }
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self::new(paths::PROCFS_ROOT)
    }
}

impl MetricsSource for SystemMetrics {
    fn cpu_times(&mut self) -> Option<CpuTimes> {
        parse_proc_stat(&self.read_proc(paths::PROC_STAT)?)
    }

    fn memory(&mut self) -> Option<MemoryUsage> {
        self.system.refresh_memory();
        let total_bytes = self.system.total_memory();
        if total_bytes == 0 {
            return None;
        }
        Some(MemoryUsage {
            used_bytes: self.system.used_memory(),
            total_bytes,
            swap_used_bytes: self.system.used_swap(),
            swap_total_bytes: self.system.total_swap(),
        })
    }

    fn disks(&mut self) -> Vec<DiskUsage> {
        self.disks.refresh(true);
        // Bind mounts and btrfs subvolumes show up once per mount point
        let mut by_mount: BTreeMap<String, DiskUsage> = BTreeMap::new();
        for disk in &self.disks {
            let total_bytes = disk.total_space();
            if total_bytes == 0 {
                continue;
            }
            let mount_point = disk.mount_point().to_string_lossy().into_owned();
            by_mount.entry(mount_point.clone()).or_insert(DiskUsage {
                mount_point,
                used_bytes: total_bytes.saturating_sub(disk.available_space()),
                total_bytes,
            });
        }
        by_mount.into_values().collect()
    }

    fn disk_io(&mut self) -> Option<DiskIoCounters> {
        Some(parse_diskstats(&self.read_proc(paths::PROC_DISKSTATS)?))
    }
}

/// Parse the aggregate and per-core lines of /proc/stat.
///
/// Fields: user nice system idle iowait irq softirq steal [guest guest_nice].
/// guest time is already folded into user, so only the first eight count.
pub fn parse_proc_stat(content: &str) -> Option<CpuTimes> {
    let mut overall = None;
    let mut per_core = Vec::new();
    for line in content.lines() {
        let mut fields = line.split_whitespace();
        let Some(label) = fields.next() else { continue };
        if !label.starts_with("cpu") {
            continue;
        }
        let values: Vec<u64> = fields.take(8).filter_map(|f| f.parse().ok()).collect();
        if values.len() < 4 {
            trace!(line, "Skipping short cpu line");
            continue;
        }
        let total = values.iter().fold(0u64, |acc, v| acc.saturating_add(*v));
        let idle = values[3].saturating_add(values.get(4).copied().unwrap_or(0));
        let time = CpuTime {
            busy: total.saturating_sub(idle),
            total,
        };
        if label == "cpu" {
            overall = Some(time);
        } else {
            per_core.push(time);
        }
    }
    overall.map(|overall| CpuTimes { overall, per_core })
}

/// Sum sectors read/written over whole disks in /proc/diskstats.
///
/// Partitions are skipped so their traffic is not counted twice, as are
/// loop, ram and zram devices.
pub fn parse_diskstats(content: &str) -> DiskIoCounters {
    let mut counters = DiskIoCounters::default();
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 || !is_whole_disk(fields[2]) {
            continue;
        }
        let read_sectors: u64 = fields[5].parse().unwrap_or(0);
        let written_sectors: u64 = fields[9].parse().unwrap_or(0);
        counters.read_bytes = counters
            .read_bytes
            .saturating_add(read_sectors.saturating_mul(DISKSTATS_SECTOR_SIZE));
        counters.written_bytes = counters
            .written_bytes
            .saturating_add(written_sectors.saturating_mul(DISKSTATS_SECTOR_SIZE));
    }
    counters
}

pub fn is_whole_disk(name: &str) -> bool {
    if ["loop", "ram", "zram", "dm-", "md", "sr", "fd"]
        .iter()
        .any(|p| name.starts_with(p))
    {
        return false;
    }
    if let Some(rest) = name.strip_prefix("nvme") {
        // nvme0n1 is a disk, nvme0n1p2 a partition
        return !rest.contains('p');
    }
    if let Some(rest) = name.strip_prefix("mmcblk") {
        return !rest.contains('p');
    }
    // sda, vdb, xvda, hdc: partitions end in a digit
    !name.ends_with(|c: char| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PROC_STAT: &str = "\
cpu  100 0 50 800 50 0 0 0 0 0
cpu0 60 0 20 400 20 0 0 0 0 0
cpu1 40 0 30 400 30 0 0 0 0 0
intr 12345
ctxt 999
";

    #[test]
    fn test_parse_proc_stat() {
        let times = parse_proc_stat(PROC_STAT).unwrap();
        assert_eq!(times.overall, CpuTime { busy: 150, total: 1000 });
        assert_eq!(times.per_core.len(), 2);
        assert_eq!(times.per_core[1], CpuTime { busy: 70, total: 500 });
    }

    #[test]
    fn test_parse_proc_stat_without_aggregate() {
        assert!(parse_proc_stat("intr 1\n").is_none());
    }

    #[test]
    fn test_usage_since() {
        let before = CpuTime { busy: 100, total: 1000 };
        let after = CpuTime { busy: 150, total: 1100 };
        assert!((after.usage_since(&before) - 50.0).abs() < f32::EPSILON);
        assert_eq!(before.usage_since(&before), 0.0);
        // counter reset must not produce garbage
        assert_eq!(before.usage_since(&after), 0.0);
    }

    #[test]
    fn test_whole_disk_detection() {
        assert!(is_whole_disk("sda"));
        assert!(!is_whole_disk("sda1"));
        assert!(is_whole_disk("nvme0n1"));
        assert!(!is_whole_disk("nvme0n1p2"));
        assert!(is_whole_disk("mmcblk0"));
        assert!(!is_whole_disk("mmcblk0p1"));
        assert!(!is_whole_disk("loop3"));
        assert!(!is_whole_disk("dm-0"));
        assert!(!is_whole_disk("zram0"));
    }

    #[test]
    fn test_parse_diskstats() {
        let content = "\
 259       0 nvme0n1 1000 0 2000 300 500 0 4000 600 0 800 900
 259       1 nvme0n1p1 900 0 1800 200 400 0 3000 500 0 700 800
   7       0 loop0 10 0 80 0 0 0 0 0 0 0 0
   8       0 sda 10 0 8 1 2 0 16 1 0 2 2
";
        let counters = parse_diskstats(content);
        assert_eq!(counters.read_bytes, (2000 + 8) * 512);
        assert_eq!(counters.written_bytes, (4000 + 16) * 512);
    }

    #[test]
    fn test_counters_near_u64_max_saturate() {
        let max = u64::MAX;
        let stat = format!("cpu  {max} {max} 0 {max} {max} 0 0 0\n");
        let times = parse_proc_stat(&stat).unwrap();
        assert_eq!(times.overall.total, u64::MAX);
        assert_eq!(times.overall.busy, 0);

        let disks = format!("   8       0 sda {max} 0 {max} 0 0 0 {max} 0 0 0 0\n   8      16 sdb 1 0 {max} 0 0 0 1 0 0 0 0\n");
        let counters = parse_diskstats(&disks);
        assert_eq!(counters.read_bytes, u64::MAX);
        assert_eq!(counters.written_bytes, u64::MAX);
    }

    #[test]
    fn test_system_metrics_reads_procfs_root() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("stat"), PROC_STAT).unwrap();
        let mut metrics = SystemMetrics::new(dir.path());
        assert_eq!(metrics.cpu_times().unwrap().per_core.len(), 2);
        // diskstats missing: counters unavailable rather than zero
        assert!(metrics.disk_io().is_none());
    }
}
