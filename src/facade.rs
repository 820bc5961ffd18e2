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

//! Single entry point for front-ends
//!
//! [`ControlCenter`] owns the current capability snapshot, the sensor reader
//! and the privileged writer. Sampling and writing take separate locks, so a
//! write blocked on an authorization dialog never stalls the poller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::data::{CapabilityMap, ControlRequest, ControlResult, ResourceClass, SensorSnapshot};
use crate::error::{ErrorKind, LaptopctlError};
use crate::hw::{
    escalator_for, CancelToken, Escalator, MetricsSource, PrivilegedWriter, Prober, SensorReader,
    SystemMetrics,
};

/// Marks a resource class busy for the lifetime of the guard
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ControlCenter {
    prober: Prober,
    capabilities: RwLock<Arc<CapabilityMap>>,
    reader: Mutex<SensorReader>,
    writer: PrivilegedWriter,
    in_flight: [AtomicBool; ResourceClass::COUNT],
    tool_missing_reported: AtomicBool,
}

impl ControlCenter {
    /// Production wiring: real sysfs/procfs roots and the configured escalation tool
    pub fn new(settings: &Settings) -> Self {
        Self::with_parts(
            Prober::new(&settings.sysfs_root),
            Box::new(SystemMetrics::new(&settings.procfs_root)),
            escalator_for(settings.escalation, &settings.escalation_args),
            settings,
        )
    }

    pub fn with_parts(
        prober: Prober,
        metrics: Box<dyn MetricsSource>,
        escalator: Arc<dyn Escalator>,
        settings: &Settings,
    ) -> Self {
        let capabilities = Arc::new(prober.probe());
        Self {
            prober,
            capabilities: RwLock::new(capabilities),
            reader: Mutex::new(SensorReader::new(metrics, settings)),
            writer: PrivilegedWriter::new(escalator, settings),
            in_flight: Default::default(),
            tool_missing_reported: AtomicBool::new(false),
        }
    }

    /// Re-probe the hardware and publish a fresh capability snapshot
    pub fn probe(&self) -> Arc<CapabilityMap> {
        let fresh = Arc::new(self.prober.probe());
        *self.capabilities.write() = Arc::clone(&fresh);
        fresh
    }

    pub fn capabilities(&self) -> Arc<CapabilityMap> {
        self.capabilities.read().clone()
    }

    pub fn sample(&self) -> SensorSnapshot {
        let caps = self.capabilities();
        self.reader.lock().sample(&caps)
    }

    pub fn apply(&self, request: &ControlRequest) -> ControlResult {
        self.apply_with_cancel(request, &CancelToken::new())
    }

    /// Apply a request; a second request for a class already being written
    /// returns `Busy` without waiting.
    pub fn apply_with_cancel(&self, request: &ControlRequest, cancel: &CancelToken) -> ControlResult {
        let class = request.resource_class();
        let Some(_guard) = InFlight::acquire(&self.in_flight[class.index()]) else {
            debug!(request = %request, "Rejecting request, class busy");
            return ControlResult::from(&LaptopctlError::Busy(class.to_string()));
        };

        let caps = self.capabilities();
        let result = self.writer.apply(&caps, request, cancel);
        match result.error {
            Some(ErrorKind::Cancelled) => {
                // hardware state after a killed write is unknown
                info!(class = %class, "Write cancelled, re-probing capabilities");
                self.probe();
            }
            Some(ErrorKind::ExternalToolMissing) => {
                if !self.tool_missing_reported.swap(true, Ordering::AcqRel) {
                    warn!(
                        message = result.message.as_deref().unwrap_or_default(),
                        "Privilege escalation tool is not installed; hardware controls are read-only"
                    );
                }
            }
            _ => {}
        }
        result
    }

    pub fn is_busy(&self, class: ResourceClass) -> bool {
        self.in_flight[class.index()].load(Ordering::Acquire)
    }
}
