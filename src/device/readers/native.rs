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

//! Backend for an existing `libgpumonitor.so`.
//!
//! Loads the library with `libloading` and drives its four C entry points,
//! exchanging the fixed-layout [`GpuTemperatures`] record.
//!
//! Note: reads are calls into foreign code and cannot be interrupted. The
//! reference library opens `/dev/mem` and maps a page per register on every
//! read, which is fast, but a misbehaving build can block for as long as
//! its driver calls do. Slow reads are still reported by the reader.

use std::ffi::{c_int, c_void};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use libloading::Library;
use tracing::debug;

use crate::common::config::{AppConfig, MonitorConfig};
use crate::device::{DeviceDescriptor, DeviceHandle, RawTemperatures, TelemetryBackend};
use crate::error::{Error, Result};
use crate::ffi::{error_from_status, GpuTemperatures, STATUS_OK};

type InitFn = unsafe extern "C" fn() -> *mut c_void;
type CleanupFn = unsafe extern "C" fn(*mut c_void);
type DeviceCountFn = unsafe extern "C" fn(*mut c_void) -> c_int;
type TemperaturesFn = unsafe extern "C" fn(*mut c_void, c_int, *mut GpuTemperatures) -> c_int;

/// The library's context pointer; null once cleaned up.
struct NativeContext(*mut c_void);

pub struct NativeLibraryBackend {
    path: PathBuf,
    // The reference library writes its last NVML status into the context on
    // every call, so calls are serialized through this lock.
    context: Mutex<NativeContext>,
    cleanup: CleanupFn,
    device_count: DeviceCountFn,
    get_temperatures: TemperaturesFn,
    // Declared last: the function pointers above must not outlive it
    _library: Library,
}

// SAFETY: the raw context pointer is only dereferenced by the library, and
// every call that passes it is made while holding the `context` mutex.
unsafe impl Send for NativeLibraryBackend {}
unsafe impl Sync for NativeLibraryBackend {}

impl NativeLibraryBackend {
    /// Load the library and open its context.
    ///
    /// Tries `config.library_path` first, then the standard search list.
    pub fn open(config: &MonitorConfig) -> Result<Self> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(path) = &config.library_path {
            candidates.push(path.clone());
        }
        candidates.extend(AppConfig::NATIVE_LIBRARY_PATHS.iter().map(PathBuf::from));

        let mut failures = Vec::new();
        for path in &candidates {
            // SAFETY: loading runs the library's initializers; callers opt
            // into this backend explicitly or through auto-detection.
            match unsafe { Self::load(path) } {
                Ok(backend) => return Ok(backend),
                Err(e) => {
                    debug!("Native library: {} - {e}", path.display());
                    failures.push(format!("{}: {e}", path.display()));
                }
            }
        }
        Err(Error::initialization(format!(
            "libgpumonitor.so not usable ({})",
            failures.join("; ")
        )))
    }

    unsafe fn load(path: &Path) -> std::result::Result<Self, String> {
        debug!("Native library: trying to load {}", path.display());
        let library = Library::new(path).map_err(|e| e.to_string())?;

        let init: InitFn = *library
            .get::<InitFn>(b"gpu_monitor_init\0")
            .map_err(|e| e.to_string())?;
        let cleanup: CleanupFn = *library
            .get::<CleanupFn>(b"gpu_monitor_cleanup\0")
            .map_err(|e| e.to_string())?;
        let device_count: DeviceCountFn = *library
            .get::<DeviceCountFn>(b"gpu_monitor_get_device_count\0")
            .map_err(|e| e.to_string())?;
        let get_temperatures: TemperaturesFn = *library
            .get::<TemperaturesFn>(b"gpu_monitor_get_temperatures\0")
            .map_err(|e| e.to_string())?;

        let ctx = init();
        if ctx.is_null() {
            return Err(
                "gpu_monitor_init returned NULL (it needs root, a loaded NVIDIA driver and at least one GPU)"
                    .to_string(),
            );
        }
        debug!("Native library: loaded {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            context: Mutex::new(NativeContext(ctx)),
            cleanup,
            device_count,
            get_temperatures,
            _library: library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn close(&self) {
        if let Ok(mut guard) = self.context.lock() {
            if !guard.0.is_null() {
                // SAFETY: the pointer came from gpu_monitor_init and is
                // nulled right after, so cleanup runs at most once.
                unsafe { (self.cleanup)(guard.0) };
                guard.0 = std::ptr::null_mut();
            }
        }
    }
}

impl TelemetryBackend for NativeLibraryBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn enumerate(&mut self) -> Result<Vec<DeviceDescriptor>> {
        let guard = self
            .context
            .lock()
            .map_err(|_| Error::initialization("native context lock poisoned"))?;
        // SAFETY: live context, call serialized by the guard
        let count = unsafe { (self.device_count)(guard.0) };
        if count < 0 {
            return Err(Error::initialization(format!(
                "gpu_monitor_get_device_count returned {count}"
            )));
        }
        let count = (count as usize).min(AppConfig::MAX_DEVICES);
        Ok((0..count)
            .map(|i| DeviceDescriptor::new(i as u32, format!("GPU {i}")))
            .collect())
    }

    fn query(&self, device: &DeviceHandle) -> Result<RawTemperatures> {
        let index = device.index();
        let guard = self
            .context
            .lock()
            .map_err(|_| Error::read_failed(index, "native context lock poisoned"))?;
        if guard.0.is_null() {
            return Err(Error::unavailable(index, "native context already released"));
        }

        let native_index = c_int::try_from(device.native_id())
            .map_err(|_| Error::unavailable(index, "native index out of range"))?;
        let mut record = GpuTemperatures::default();
        // SAFETY: live context, valid out-pointer, call serialized by the guard
        let status = unsafe { (self.get_temperatures)(guard.0, native_index, &mut record) };
        if status == STATUS_OK {
            Ok(record.to_raw())
        } else {
            Err(error_from_status(index, status, &record))
        }
    }

    fn release(self: Box<Self>) {
        debug!("Releasing native library context ({})", self.path.display());
        self.close();
    }
}

impl Drop for NativeLibraryBackend {
    fn drop(&mut self) {
        self.close();
    }
}
