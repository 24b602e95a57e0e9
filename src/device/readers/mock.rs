// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Scripted in-memory backend.
//!
//! Used by the test suite and by `--backend mock` to run the monitor on a
//! machine without GPUs. Each [`MockDevice`] answers with a baseline
//! reading unless its script overrides the outcome of a given query
//! (queries are numbered per device, starting at 1, which in a one-read-
//! per-tick loop equals the tick number). Shared [`MockCounters`] let tests
//! observe how often the backend was queried and released.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::device::{DeviceDescriptor, DeviceHandle, RawTemperatures, TelemetryBackend};
use crate::error::{Error, Result};

/// What a scripted query returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    Reading(RawTemperatures),
    ReadFailed(String),
    Unavailable(String),
}

#[derive(Debug)]
pub struct MockDevice {
    name: String,
    baseline: MockOutcome,
    script: HashMap<usize, MockOutcome>,
    queries: AtomicUsize,
}

impl MockDevice {
    /// A device that always reports the same three temperatures.
    pub fn steady(core: u32, junction: u32, vram: u32) -> Self {
        Self::reporting(RawTemperatures::new(core, junction, vram))
    }

    pub fn reporting(raw: RawTemperatures) -> Self {
        Self {
            name: "Mock GPU".to_string(),
            baseline: MockOutcome::Reading(raw),
            script: HashMap::new(),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Override the outcome of the `query`-th read (1-based).
    pub fn on_query(mut self, query: usize, outcome: MockOutcome) -> Self {
        self.script.insert(query, outcome);
        self
    }

    /// Make the `query`-th read fail transiently.
    pub fn fail_on(self, query: usize) -> Self {
        self.on_query(query, MockOutcome::ReadFailed("device busy".to_string()))
    }

    /// Every read reports the device as gone.
    pub fn unplugged(mut self) -> Self {
        self.baseline = MockOutcome::Unavailable("GPU has fallen off the bus".to_string());
        self
    }

    fn next_outcome(&self) -> MockOutcome {
        let query = self.queries.fetch_add(1, Ordering::SeqCst) + 1;
        self.script
            .get(&query)
            .unwrap_or(&self.baseline)
            .clone()
    }
}

/// Call counters shared between a [`MockBackend`] and its observer.
#[derive(Debug, Clone, Default)]
pub struct MockCounters {
    queries: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl MockCounters {
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct MockBackend {
    devices: Vec<MockDevice>,
    enumeration_error: Option<String>,
    counters: MockCounters,
}

impl MockBackend {
    pub fn with_devices(devices: Vec<MockDevice>) -> Self {
        Self {
            devices,
            enumeration_error: None,
            counters: MockCounters::default(),
        }
    }

    /// `count` devices with plausible, distinct steady readings.
    pub fn demo(count: usize) -> Self {
        let devices = (0..count)
            .map(|i| {
                let offset = (i as u32 % 8) * 3;
                MockDevice::steady(55 + offset, 63 + offset, 58 + offset)
                    .named(format!("Mock GPU {i}"))
            })
            .collect();
        Self::with_devices(devices)
    }

    /// A backend whose enumeration fails, as when the driver refuses access.
    pub fn failing(detail: impl Into<String>) -> Self {
        Self {
            devices: Vec::new(),
            enumeration_error: Some(detail.into()),
            counters: MockCounters::default(),
        }
    }

    pub fn counters(&self) -> MockCounters {
        self.counters.clone()
    }
}

impl TelemetryBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn enumerate(&mut self) -> Result<Vec<DeviceDescriptor>> {
        if let Some(detail) = &self.enumeration_error {
            return Err(Error::initialization(detail.clone()));
        }
        Ok(self
            .devices
            .iter()
            .enumerate()
            .map(|(i, d)| {
                DeviceDescriptor::new(i as u32, d.name.clone())
                    .with_pci_bus_id(format!("0000:{:02x}:00.0", i + 1))
            })
            .collect())
    }

    fn query(&self, device: &DeviceHandle) -> Result<RawTemperatures> {
        self.counters.queries.fetch_add(1, Ordering::SeqCst);
        let index = device.index();
        let mock = self
            .devices
            .get(device.native_id() as usize)
            .ok_or_else(|| Error::unavailable(index, "no such mock device"))?;

        match mock.next_outcome() {
            MockOutcome::Reading(raw) => Ok(raw),
            MockOutcome::ReadFailed(detail) => Err(Error::read_failed(index, detail)),
            MockOutcome::Unavailable(detail) => Err(Error::unavailable(index, detail)),
        }
    }

    fn release(self: Box<Self>) {
        debug!("Releasing mock backend with {} device(s)", self.devices.len());
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
    }
}
