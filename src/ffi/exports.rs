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

//! C entry points of `libgpumonitor.so`.
//!
//! Symbol names and signatures match the original library, so existing
//! ctypes / cgo callers can load this build unchanged:
//!
//! ```c
//! GpuContext *gpu_monitor_init(void);
//! void gpu_monitor_cleanup(GpuContext *ctx);
//! int gpu_monitor_get_device_count(GpuContext *ctx);
//! int gpu_monitor_get_temperatures(GpuContext *ctx, int device_index,
//!                                  GpuTemperatures *temps);
//! ```
//!
//! The context is always opened with the NVML backend: falling back to the
//! native library backend from inside the native library would load this
//! very file again.
//!
//! The record has no validity flags, so a reading with an unsupported or
//! implausible sensor is not returned as data: the call fails with
//! `STATUS_READ_FAILED` and the message names the offending sensors. This
//! matches the original library, which also failed the whole call when a
//! register value was out of range. [`SENSOR_NOT_AVAILABLE`](super::SENSOR_NOT_AVAILABLE) is therefore
//! never written by these entry points.
//!
//! Calls on one context are safe from several threads except
//! `gpu_monitor_cleanup`, which must run exactly once and after every other
//! call on that context has returned.

use std::ffi::c_int;

use tracing::warn;

use super::{status_code, GpuTemperatures, STATUS_INVALID_ARGUMENT, STATUS_OK};
use crate::common::config::{BackendKind, MonitorConfig};
use crate::context::MonitorContext;
use crate::device::{SensorReading, SensorStatus, TemperatureReading};
use crate::error::Error;

/// Opaque context handed to C callers.
#[repr(C)]
pub struct GpuContext {
    _private: [u8; 0],
}

fn into_handle(ctx: MonitorContext) -> *mut GpuContext {
    Box::into_raw(Box::new(ctx)) as *mut GpuContext
}

/// Open a context, or return NULL if the driver interface is unavailable.
///
/// A context with zero devices is returned as a valid handle; callers
/// check `gpu_monitor_get_device_count`.
#[no_mangle]
pub extern "C" fn gpu_monitor_init() -> *mut GpuContext {
    let config = MonitorConfig::default().backend(BackendKind::Nvml);
    match MonitorContext::with_config(config) {
        Ok(ctx) => into_handle(ctx),
        Err(e) => {
            warn!("gpu_monitor_init: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Release a context. NULL is a no-op.
///
/// # Safety
///
/// `ctx` must be NULL or a pointer returned by [`gpu_monitor_init`] that has
/// not been cleaned up yet, with no other call on it in flight.
#[no_mangle]
pub unsafe extern "C" fn gpu_monitor_cleanup(ctx: *mut GpuContext) {
    if ctx.is_null() {
        return;
    }
    let mut ctx = Box::from_raw(ctx as *mut MonitorContext);
    ctx.shutdown();
}

/// Number of devices, or -1 for a NULL context.
///
/// # Safety
///
/// `ctx` must be NULL or a live pointer returned by [`gpu_monitor_init`].
#[no_mangle]
pub unsafe extern "C" fn gpu_monitor_get_device_count(ctx: *mut GpuContext) -> c_int {
    match (ctx as *const MonitorContext).as_ref() {
        Some(ctx) => c_int::try_from(ctx.device_count()).unwrap_or(c_int::MAX),
        None => -1,
    }
}

/// Fill `temps` for `device_index`. Returns 0 on success.
///
/// On failure the record's message buffer holds a NUL-terminated
/// description and the return value is one of the `STATUS_*` codes.
///
/// # Safety
///
/// `ctx` must be NULL or a live pointer returned by [`gpu_monitor_init`];
/// `temps` must be NULL or point to writable memory for one
/// [`GpuTemperatures`].
#[no_mangle]
pub unsafe extern "C" fn gpu_monitor_get_temperatures(
    ctx: *mut GpuContext,
    device_index: c_int,
    temps: *mut GpuTemperatures,
) -> c_int {
    let Some(temps) = temps.as_mut() else {
        return STATUS_INVALID_ARGUMENT;
    };
    let Some(ctx) = (ctx as *const MonitorContext).as_ref() else {
        temps.set_message("NULL context");
        return STATUS_INVALID_ARGUMENT;
    };
    match read_record(ctx, device_index) {
        Ok(record) => {
            *temps = record;
            STATUS_OK
        }
        Err(e) => {
            *temps = GpuTemperatures::from_error(&e);
            status_code(&e)
        }
    }
}

fn read_record(ctx: &MonitorContext, device_index: c_int) -> Result<GpuTemperatures, Error> {
    let index = usize::try_from(device_index).map_err(|_| Error::InvalidDeviceIndex {
        index: i64::from(device_index),
        count: ctx.device_count(),
    })?;
    let reading = ctx.read_temperatures(index)?;
    match rejected_sensors(&reading) {
        Some(detail) => Err(Error::read_failed(index, detail)),
        None => Ok(GpuTemperatures::from_reading(&reading)),
    }
}

/// Description of every sensor that cannot be reported as a plain number.
fn rejected_sensors(reading: &TemperatureReading) -> Option<String> {
    let describe = |label: &str, sensor: &SensorReading| match sensor.status {
        SensorStatus::Valid => None,
        SensorStatus::Unsupported => Some(format!("{label} temperature unsupported")),
        SensorStatus::OutOfRange => Some(format!(
            "{label} temperature implausible ({} C)",
            sensor.celsius
        )),
    };
    let rejected: Vec<String> = [
        describe("core", &reading.core),
        describe("junction", &reading.junction),
        describe("vram", &reading.vram),
    ]
    .into_iter()
    .flatten()
    .collect();
    (!rejected.is_empty()).then(|| rejected.join("; "))
}
