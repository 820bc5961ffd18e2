//! Hardware access
//!
//! Discovery, read-only telemetry, and privileged writes against the Linux
//! sysfs power, thermal, cpufreq and backlight interfaces.

pub mod escalation;
pub mod metrics;
pub mod probe;
pub mod sensors;
pub mod sysfs;
pub mod writer;

pub use escalation::{
    escalator_for, is_root, CancelToken, CommandEscalator, DirectEscalator, EscalationOutcome,
    Escalator, WriteOp,
};
pub use metrics::{CpuTime, CpuTimes, DiskIoCounters, MetricsSource, SystemMetrics};
pub use probe::Prober;
pub use sensors::SensorReader;
pub use writer::{PrivilegedWriter, WriterPolicy};
