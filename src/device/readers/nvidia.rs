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

use std::collections::HashMap;
use std::path::PathBuf;

use nvml_wrapper::enum_wrappers::device::TemperatureSensor;
use nvml_wrapper::error::NvmlError;
use nvml_wrapper::Nvml;
use tracing::{debug, info, warn};

use crate::common::config::{AppConfig, MonitorConfig};
#[cfg(unix)]
use crate::device::pci::{bar0_path, sysfs_bus_id, Bar0Sensors};
use crate::device::{DeviceDescriptor, DeviceHandle, RawTemperatures, TelemetryBackend};
use crate::error::{Error, Result};

/// NVML-backed telemetry.
///
/// Core temperature comes from NVML. Junction and VRAM temperatures come
/// from the BAR0 register window of each device when it can be mapped
/// (root only); otherwise those sensors are reported as unsupported.
pub struct NvidiaBackend {
    nvml: Nvml,
    sysfs_root: PathBuf,
    /// Register windows keyed by NVML index, filled during enumeration
    #[cfg(unix)]
    registers: HashMap<u32, Bar0Sensors>,
    #[cfg(not(unix))]
    registers: HashMap<u32, ()>,
}

impl NvidiaBackend {
    pub fn open(config: &MonitorConfig) -> Result<Self> {
        let nvml = Nvml::init().map_err(init_error)?;
        if let Ok(version) = nvml.sys_driver_version() {
            debug!("NVML initialized, driver version {version}");
        }
        Ok(Self {
            nvml,
            sysfs_root: config.sysfs_root.clone(),
            registers: HashMap::new(),
        })
    }

    #[cfg(unix)]
    fn map_registers(&mut self, native_id: u32, bus_id: &str) {
        let path = bar0_path(&self.sysfs_root, bus_id);
        match Bar0Sensors::open(&path) {
            Ok(sensors) => {
                debug!("Mapped thermal registers of GPU {native_id} at {}", path.display());
                self.registers.insert(native_id, sensors);
            }
            Err(e) => {
                // Logged once here; reads simply report the sensors as unsupported
                warn!(
                    "Junction/VRAM sensors unavailable for GPU {native_id} ({}): {e}",
                    path.display()
                );
            }
        }
    }

    #[cfg(not(unix))]
    fn map_registers(&mut self, native_id: u32, _bus_id: &str) {
        debug!("Register access not supported on this platform (GPU {native_id})");
    }

    fn read_registers(&self, native_id: u32) -> (Option<u32>, Option<u32>) {
        #[cfg(unix)]
        if let Some(sensors) = self.registers.get(&native_id) {
            let (junction, vram) = sensors.read();
            return (Some(junction), Some(vram));
        }
        let _ = native_id;
        (None, None)
    }
}

impl TelemetryBackend for NvidiaBackend {
    fn name(&self) -> &'static str {
        "nvml"
    }

    fn enumerate(&mut self) -> Result<Vec<DeviceDescriptor>> {
        let count = self.nvml.device_count().map_err(init_error)?;
        // Add device count validation to prevent unbounded growth
        let count = count.min(AppConfig::MAX_DEVICES as u32);

        let mut devices = Vec::with_capacity(count as usize);
        for i in 0..count {
            let device = match self.nvml.device_by_index(i) {
                Ok(device) => device,
                Err(e) => {
                    warn!("Skipping NVML device {i}: {e}");
                    continue;
                }
            };
            let name = device.name().unwrap_or_else(|_| "Unknown GPU".to_string());
            let bus_id = device
                .pci_info()
                .ok()
                .map(|pci| sysfs_bus_id(pci.domain, pci.bus, pci.device));
            info!("Found {name} at NVML index {i} ({})", bus_id.as_deref().unwrap_or("unknown bus"));

            let mut descriptor = DeviceDescriptor::new(i, name);
            if let Some(bus_id) = bus_id {
                self.map_registers(i, &bus_id);
                descriptor = descriptor.with_pci_bus_id(bus_id);
            }
            devices.push(descriptor);
        }
        Ok(devices)
    }

    fn query(&self, device: &DeviceHandle) -> Result<RawTemperatures> {
        let index = device.index();
        let nvml_device = self
            .nvml
            .device_by_index(device.native_id())
            .map_err(|e| read_error(index, e))?;

        let core = match nvml_device.temperature(TemperatureSensor::Gpu) {
            Ok(t) => Some(t),
            Err(NvmlError::NotSupported) => None,
            Err(e) => return Err(read_error(index, e)),
        };
        let (junction, vram) = self.read_registers(device.native_id());

        Ok(RawTemperatures {
            core,
            junction,
            vram,
        })
    }

    fn release(self: Box<Self>) {
        let NvidiaBackend {
            nvml, registers, ..
        } = *self;
        debug!("Unmapping {} register window(s)", registers.len());
        drop(registers);
        if let Err(e) = nvml.shutdown() {
            warn!("NVML shutdown failed: {e}");
        }
    }
}

#[cfg(not(unix))]
fn sysfs_bus_id(domain: u32, bus: u32, device: u32) -> String {
    format!("{domain:04x}:{bus:02x}:{device:02x}.0")
}

/// Map an NVML failure during initialization or enumeration.
fn init_error(error: NvmlError) -> Error {
    let message = match error {
        NvmlError::LibloadingError(e) => format!("NVML library not found: {e}"),
        NvmlError::DriverNotLoaded => "NVIDIA driver not loaded".to_string(),
        NvmlError::NoPermission => "Insufficient permissions for NVML".to_string(),
        other => format!("NVML Error: {other}"),
    };
    Error::initialization(message)
}

/// Map an NVML failure during a read of device `index`.
fn read_error(index: usize, error: NvmlError) -> Error {
    match error {
        NvmlError::GpuLost | NvmlError::NotFound | NvmlError::Uninitialized => {
            Error::unavailable(index, format!("NVML Error: {error}"))
        }
        other => Error::read_failed(index, format!("NVML Error: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_read_error_classification() {
        assert_eq!(
            read_error(1, NvmlError::GpuLost).kind(),
            ErrorKind::DeviceUnavailable
        );
        assert_eq!(
            read_error(1, NvmlError::NotFound).kind(),
            ErrorKind::DeviceUnavailable
        );
        assert_eq!(read_error(1, NvmlError::Timeout).kind(), ErrorKind::ReadFailed);
        assert_eq!(read_error(1, NvmlError::Unknown).kind(), ErrorKind::ReadFailed);
    }

    #[test]
    fn test_init_error_messages() {
        let err = init_error(NvmlError::NoPermission);
        assert_eq!(
            err,
            Error::initialization("Insufficient permissions for NVML")
        );
        assert_eq!(
            init_error(NvmlError::DriverNotLoaded).kind(),
            ErrorKind::InitializationFailed
        );
    }

    #[test]
    fn test_open_never_panics_without_driver() {
        // Works on hosts with and without an NVIDIA driver
        match NvidiaBackend::open(&MonitorConfig::default()) {
            Ok(backend) => Box::new(backend).release(),
            Err(e) => assert_eq!(e.kind(), ErrorKind::InitializationFailed),
        }
    }
}
