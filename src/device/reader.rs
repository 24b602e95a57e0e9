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

//! Single-shot temperature reads.
//!
//! A [`TemperatureReader`] borrows the handle table and backend of a
//! [`MonitorContext`](crate::MonitorContext) and turns one backend query
//! into a [`TemperatureReading`]. It keeps no state between calls: no
//! caching, no batching and no retries.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::common::config::AppConfig;
use crate::device::{
    DeviceHandle, RawTemperatures, SensorReading, TelemetryBackend, TemperatureReading,
};
use crate::error::{Error, Result};

pub struct TemperatureReader<'ctx> {
    backend: &'ctx dyn TelemetryBackend,
    handles: &'ctx [DeviceHandle],
    max_sane_celsius: u32,
    slow_read_threshold: Duration,
}

impl<'ctx> TemperatureReader<'ctx> {
    pub(crate) fn new(
        backend: &'ctx dyn TelemetryBackend,
        handles: &'ctx [DeviceHandle],
        max_sane_celsius: u32,
        slow_read_threshold: Duration,
    ) -> Self {
        Self {
            backend,
            handles,
            max_sane_celsius,
            slow_read_threshold,
        }
    }

    /// Read all sensors of the device at `index`.
    ///
    /// Out-of-range indices fail with [`Error::InvalidDeviceIndex`] before
    /// the backend is touched. Otherwise exactly one backend query is made.
    pub fn read(&self, index: usize) -> Result<TemperatureReading> {
        let handle = self
            .handles
            .get(index)
            .ok_or(Error::InvalidDeviceIndex {
                index: i64::try_from(index).unwrap_or(i64::MAX),
                count: self.handles.len(),
            })?;

        let started = Instant::now();
        let raw = self.backend.query(handle).map_err(|e| e.with_index(index));
        let elapsed = started.elapsed();

        if elapsed > self.slow_read_threshold {
            warn!(
                "{} read of GPU {index} took {elapsed:?} (threshold {:?})",
                self.backend.name(),
                self.slow_read_threshold
            );
        }

        let reading = validate(raw?, self.max_sane_celsius);
        if !reading.all_valid() {
            debug!("GPU {index}: partial reading {reading:?}");
        }
        Ok(reading)
    }
}

/// Apply the sane range to raw backend values.
///
/// Missing sensors become [`SensorStatus::Unsupported`](crate::device::SensorStatus),
/// implausible values become `OutOfRange`.
pub fn validate(raw: RawTemperatures, max_sane_celsius: u32) -> TemperatureReading {
    TemperatureReading {
        core: classify(raw.core, max_sane_celsius),
        junction: classify(raw.junction, max_sane_celsius),
        vram: classify(raw.vram, max_sane_celsius),
    }
}

fn classify(value: Option<u32>, max_sane_celsius: u32) -> SensorReading {
    match value {
        None => SensorReading::unsupported(),
        Some(c) if (AppConfig::MIN_SANE_CELSIUS..=max_sane_celsius).contains(&c) => {
            SensorReading::valid(c)
        }
        Some(c) => SensorReading::out_of_range(c),
    }
}
