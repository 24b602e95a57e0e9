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

//! The monitoring context: device registry and resource owner.
//!
//! # Example
//!
//! ```rust,no_run
//! use gpumonitor::{MonitorContext, Result};
//!
//! fn main() -> Result<()> {
//!     let mut ctx = MonitorContext::initialize()?;
//!     println!("Found {} GPU(s)", ctx.device_count());
//!
//!     for index in 0..ctx.device_count() {
//!         match ctx.read_temperatures(index) {
//!             Ok(reading) => println!("GPU {index}: {:?}", reading.core.value()),
//!             Err(e) => eprintln!("GPU {index}: {e}"),
//!         }
//!     }
//!
//!     ctx.shutdown();
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::common::config::{AppConfig, MonitorConfig};
use crate::device::reader_factory::open_backend;
use crate::device::{DeviceHandle, TelemetryBackend, TemperatureReader, TemperatureReading};
use crate::error::{Error, Result};

/// Owner of all device handles for one monitoring session.
///
/// The handle table is fixed at [`initialize`](Self::initialize) time (no
/// hot-plug) and released by [`shutdown`](Self::shutdown), which also runs
/// on drop. Every method other than `shutdown` and
/// [`is_active`](Self::is_active) panics once the context is shut down:
/// using a released context is a bug in the caller, not a runtime error.
///
/// # Thread Safety
///
/// `MonitorContext` is `Send + Sync`. Reads take `&self` and can run from
/// several threads at once; `shutdown` takes `&mut self`, so it can never
/// overlap a read or another shutdown.
pub struct MonitorContext {
    backend: Option<Box<dyn TelemetryBackend>>,
    handles: Vec<DeviceHandle>,
    max_sane_celsius: u32,
    slow_read_threshold: Duration,
}

impl MonitorContext {
    /// Open the default backend and enumerate its devices.
    ///
    /// Finding no devices is not an error; check
    /// [`device_count`](Self::device_count).
    ///
    /// # Errors
    ///
    /// [`Error::InitializationFailed`] if no driver interface can be opened.
    pub fn initialize() -> Result<Self> {
        Self::with_config(MonitorConfig::default())
    }

    pub fn with_config(config: MonitorConfig) -> Result<Self> {
        let backend = open_backend(&config)?;
        Self::with_backend(backend, config)
    }

    /// Build a context on an already opened backend.
    ///
    /// The backend is released if enumeration fails.
    pub fn with_backend(mut backend: Box<dyn TelemetryBackend>, config: MonitorConfig) -> Result<Self> {
        let mut descriptors = match backend.enumerate() {
            Ok(descriptors) => descriptors,
            Err(e) => {
                backend.release();
                return Err(match e {
                    Error::InitializationFailed(_) => e,
                    other => Error::initialization(format!("enumeration failed: {other}")),
                });
            }
        };
        if descriptors.len() > AppConfig::MAX_DEVICES {
            warn!(
                "{} backend reported {} devices; ignoring all but the first {}",
                backend.name(),
                descriptors.len(),
                AppConfig::MAX_DEVICES
            );
            descriptors.truncate(AppConfig::MAX_DEVICES);
        }

        let handles: Vec<DeviceHandle> = descriptors
            .into_iter()
            .enumerate()
            .map(|(index, descriptor)| DeviceHandle::new(index, descriptor))
            .collect();
        info!("{} backend ready with {} device(s)", backend.name(), handles.len());

        Ok(Self {
            backend: Some(backend),
            handles,
            max_sane_celsius: config.max_sane_celsius,
            slow_read_threshold: config.slow_read_threshold,
        })
    }

    fn backend(&self) -> &dyn TelemetryBackend {
        match &self.backend {
            Some(backend) => backend.as_ref(),
            None => panic!("MonitorContext used after shutdown"),
        }
    }

    /// Number of devices found at initialization. Constant for the
    /// lifetime of the context.
    pub fn device_count(&self) -> usize {
        self.backend();
        self.handles.len()
    }

    pub fn devices(&self) -> &[DeviceHandle] {
        self.backend();
        &self.handles
    }

    pub fn device(&self, index: usize) -> Option<&DeviceHandle> {
        self.devices().get(index)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend().name()
    }

    pub fn is_active(&self) -> bool {
        self.backend.is_some()
    }

    /// A reader borrowing this context's handles.
    pub fn reader(&self) -> TemperatureReader<'_> {
        TemperatureReader::new(
            self.backend(),
            &self.handles,
            self.max_sane_celsius,
            self.slow_read_threshold,
        )
    }

    /// Read the sensors of device `index` once.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidDeviceIndex`] if `index >= device_count()`; no
    ///   hardware access happens in that case
    /// - [`Error::ReadFailed`] for transient failures (retry next tick)
    /// - [`Error::DeviceUnavailable`] if the device is gone
    pub fn read_temperatures(&self, index: usize) -> Result<TemperatureReading> {
        self.reader().read(index)
    }

    /// Release every device handle and backend resource.
    ///
    /// Idempotent: later calls are no-ops.
    pub fn shutdown(&mut self) {
        if let Some(backend) = self.backend.take() {
            info!(
                "Shutting down {} backend ({} device(s))",
                backend.name(),
                self.handles.len()
            );
            self.handles.clear();
            backend.release();
        } else {
            debug!("MonitorContext already shut down");
        }
    }
}

impl Drop for MonitorContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for MonitorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorContext")
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .field("devices", &self.handles.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::readers::mock::{MockBackend, MockDevice};

    fn mock_context(devices: Vec<MockDevice>) -> (MonitorContext, crate::device::readers::mock::MockCounters) {
        let backend = MockBackend::with_devices(devices);
        let counters = backend.counters();
        let ctx = MonitorContext::with_backend(Box::new(backend), MonitorConfig::default()).unwrap();
        (ctx, counters)
    }

    #[test]
    fn test_context_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MonitorContext>();
    }

    #[test]
    fn test_device_count_is_stable() {
        let (ctx, _) = mock_context(vec![
            MockDevice::steady(65, 72, 58),
            MockDevice::steady(60, 70, 55),
        ]);
        for _ in 0..10 {
            assert_eq!(ctx.device_count(), 2);
        }
        assert_eq!(ctx.device(1).map(|d| d.index()), Some(1));
        assert!(ctx.device(2).is_none());
    }

    #[test]
    fn test_zero_devices_is_not_an_error() {
        let (ctx, _) = mock_context(Vec::new());
        assert_eq!(ctx.device_count(), 0);
        assert!(matches!(
            ctx.read_temperatures(0),
            Err(Error::InvalidDeviceIndex { index: 0, count: 0 })
        ));
    }

    #[test]
    fn test_devices_beyond_limit_are_dropped() {
        let devices = (0..=AppConfig::MAX_DEVICES)
            .map(|_| MockDevice::steady(65, 72, 58))
            .collect();
        let (ctx, _) = mock_context(devices);
        assert_eq!(ctx.device_count(), AppConfig::MAX_DEVICES);
        assert!(ctx.device(AppConfig::MAX_DEVICES).is_none());
        assert!(matches!(
            ctx.read_temperatures(AppConfig::MAX_DEVICES),
            Err(Error::InvalidDeviceIndex { .. })
        ));
    }

    #[test]
    fn test_enumeration_failure_releases_backend() {
        let backend = MockBackend::failing("permission denied");
        let counters = backend.counters();
        let err = MonitorContext::with_backend(Box::new(backend), MonitorConfig::default()).unwrap_err();
        assert_eq!(err, Error::initialization("permission denied"));
        assert_eq!(counters.releases(), 1);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let (mut ctx, counters) = mock_context(vec![MockDevice::steady(65, 72, 58)]);
        ctx.shutdown();
        ctx.shutdown();
        assert!(!ctx.is_active());
        drop(ctx);
        assert_eq!(counters.releases(), 1);
    }

    #[test]
    fn test_drop_releases_backend() {
        let (ctx, counters) = mock_context(vec![MockDevice::steady(65, 72, 58)]);
        drop(ctx);
        assert_eq!(counters.releases(), 1);
    }

    #[test]
    #[should_panic(expected = "used after shutdown")]
    fn test_read_after_shutdown_panics() {
        let (mut ctx, _) = mock_context(vec![MockDevice::steady(65, 72, 58)]);
        ctx.shutdown();
        let _ = ctx.read_temperatures(0);
    }

    #[test]
    fn test_parallel_reads_on_distinct_devices() {
        let (ctx, counters) = mock_context(vec![
            MockDevice::steady(65, 72, 58),
            MockDevice::steady(60, 70, 55),
            MockDevice::steady(61, 71, 56),
            MockDevice::steady(62, 73, 57),
        ]);

        std::thread::scope(|scope| {
            for index in 0..ctx.device_count() {
                let ctx = &ctx;
                scope.spawn(move || {
                    for _ in 0..100 {
                        assert!(ctx.read_temperatures(index).unwrap().all_valid());
                    }
                });
            }
        });
        assert_eq!(counters.queries(), 400);
    }
}
