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

//! Background sampling loop

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info};

use crate::data::SensorSnapshot;
use crate::facade::ControlCenter;

#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Samples a [`ControlCenter`] on a fixed interval from one background thread.
///
/// The first snapshot is taken immediately. Stopping wakes the thread out of
/// its wait, so shutdown never waits out a full interval.
pub struct Poller {
    signal: Arc<StopSignal>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn spawn<F>(center: Arc<ControlCenter>, interval: Duration, mut on_sample: F) -> io::Result<Self>
    where
        F: FnMut(SensorSnapshot) + Send + 'static,
    {
        let signal = Arc::new(StopSignal::default());
        let thread_signal = Arc::clone(&signal);
        let handle = thread::Builder::new()
            .name("laptopctl-poller".into())
            .spawn(move || {
                info!(interval_ms = interval.as_millis() as u64, "Poller started");
                loop {
                    on_sample(center.sample());
                    let mut stopped = thread_signal.stopped.lock();
                    if !*stopped {
                        thread_signal.wake.wait_for(&mut stopped, interval);
                    }
                    if *stopped {
                        break;
                    }
                }
                debug!("Poller stopped");
            })?;
        Ok(Self {
            signal,
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for it to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        *self.signal.stopped.lock() = true;
        self.signal.wake.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::data::CpuUsage;
    use crate::hw::escalation::MockEscalator;
    use crate::hw::{CpuTimes, Prober};
    use crate::test_utils::{cpu_time, FakeMetrics, FakeSysfs};
    use std::sync::mpsc;
    use std::time::Instant;

    fn center(sys: &FakeSysfs) -> Arc<ControlCenter> {
        let metrics = FakeMetrics::with_cpu(vec![
            Some(CpuTimes { overall: cpu_time(10, 90), per_core: vec![] }),
            Some(CpuTimes { overall: cpu_time(20, 180), per_core: vec![] }),
        ]);
        Arc::new(ControlCenter::with_parts(
            Prober::new(sys.root()),
            Box::new(metrics),
            Arc::new(MockEscalator::new()),
            &Settings::default(),
        ))
    }

    #[test]
    fn test_poller_delivers_snapshots() {
        let sys = FakeSysfs::new();
        sys.backlight("intel_backlight", 50, 100);
        let (tx, rx) = mpsc::channel();
        let poller = Poller::spawn(center(&sys), Duration::from_millis(20), move |snap| {
            let _ = tx.send(snap);
        })
        .unwrap();

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        poller.stop();

        assert_eq!(first.cpu, CpuUsage::WarmingUp);
        assert!(matches!(second.cpu, CpuUsage::Measured { .. }));
        assert_eq!(second.brightness_percent, Some(50));
    }

    #[test]
    fn test_stop_does_not_wait_for_interval() {
        let sys = FakeSysfs::new();
        let (tx, rx) = mpsc::channel();
        let poller = Poller::spawn(center(&sys), Duration::from_secs(60), move |snap| {
            let _ = tx.send(snap);
        })
        .unwrap();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();

        let started = Instant::now();
        poller.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
