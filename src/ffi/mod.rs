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

//! The native boundary of `libgpumonitor.so`.
//!
//! [`GpuTemperatures`] is the fixed-layout record exchanged with C callers:
//! three `uint32_t` temperatures followed by a 256 byte, NUL-terminated
//! message buffer. The layout must not change. [`exports`] provides the C
//! entry points backed by [`MonitorContext`](crate::MonitorContext), and
//! the native library backend consumes the same record from an existing
//! library.
//!
//! The record has no validity flags. [`exports`] refuses to hand out a
//! reading with an invalid sensor. [`GpuTemperatures::from_reading`] still
//! encodes one losslessly: an unsupported sensor becomes
//! [`SENSOR_NOT_AVAILABLE`], an implausible value is kept as is, and
//! [`GpuTemperatures::to_raw`] reverses both for the native backend.

pub mod exports;

use std::ffi::c_char;

use crate::common::config::AppConfig;
use crate::device::{RawTemperatures, SensorReading, SensorStatus, TemperatureReading};
use crate::error::{Detail, Error, ErrorKind};

/// Size of [`GpuTemperatures`] in bytes.
pub const RECORD_SIZE: usize = 3 * 4 + AppConfig::MESSAGE_BUFFER_LEN;

/// Temperature value written for an unsupported sensor.
pub const SENSOR_NOT_AVAILABLE: u32 = u32::MAX;

/// Status codes returned by `gpu_monitor_get_temperatures`.
///
/// `-1` is also what the original library returns for every failure, so
/// callers that only test for non-zero keep working.
pub const STATUS_OK: i32 = 0;
pub const STATUS_INVALID_ARGUMENT: i32 = -1;
pub const STATUS_DEVICE_UNAVAILABLE: i32 = -2;
pub const STATUS_READ_FAILED: i32 = -3;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuTemperatures {
    pub gpu_temp: u32,
    pub junction_temp: u32,
    pub vram_temp: u32,
    pub error_message: [c_char; AppConfig::MESSAGE_BUFFER_LEN],
}

const _: () = assert!(std::mem::size_of::<GpuTemperatures>() == RECORD_SIZE);

impl Default for GpuTemperatures {
    fn default() -> Self {
        Self {
            gpu_temp: 0,
            junction_temp: 0,
            vram_temp: 0,
            error_message: [0; AppConfig::MESSAGE_BUFFER_LEN],
        }
    }
}

impl GpuTemperatures {
    pub fn from_reading(reading: &TemperatureReading) -> Self {
        Self {
            gpu_temp: export_sensor(reading.core),
            junction_temp: export_sensor(reading.junction),
            vram_temp: export_sensor(reading.vram),
            ..Self::default()
        }
    }

    pub fn from_error(error: &Error) -> Self {
        let mut record = Self::default();
        record.set_message(error.bounded_message().as_str());
        record
    }

    /// Copy `message` into the buffer, truncated and NUL-terminated.
    pub fn set_message(&mut self, message: &str) {
        let message = Detail::new(message);
        self.error_message = [0; AppConfig::MESSAGE_BUFFER_LEN];
        for (dst, &src) in self.error_message.iter_mut().zip(message.as_str().as_bytes()) {
            *dst = src as c_char;
        }
    }

    /// The message up to the first NUL, lossily decoded.
    pub fn message(&self) -> String {
        let bytes: Vec<u8> = self
            .error_message
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn to_raw(&self) -> RawTemperatures {
        RawTemperatures {
            core: import_sensor(self.gpu_temp),
            junction: import_sensor(self.junction_temp),
            vram: import_sensor(self.vram_temp),
        }
    }

    /// Native-endian byte image, identical to the in-memory layout.
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];
        bytes[0..4].copy_from_slice(&self.gpu_temp.to_ne_bytes());
        bytes[4..8].copy_from_slice(&self.junction_temp.to_ne_bytes());
        bytes[8..12].copy_from_slice(&self.vram_temp.to_ne_bytes());
        for (dst, &src) in bytes[12..].iter_mut().zip(self.error_message.iter()) {
            *dst = src as u8;
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8; RECORD_SIZE]) -> Self {
        let word = |at: usize| u32::from_ne_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let mut record = Self {
            gpu_temp: word(0),
            junction_temp: word(4),
            vram_temp: word(8),
            ..Self::default()
        };
        for (dst, &src) in record.error_message.iter_mut().zip(bytes[12..].iter()) {
            *dst = src as c_char;
        }
        record
    }
}

fn export_sensor(sensor: SensorReading) -> u32 {
    match sensor.status {
        SensorStatus::Unsupported => SENSOR_NOT_AVAILABLE,
        SensorStatus::Valid | SensorStatus::OutOfRange => sensor.celsius,
    }
}

fn import_sensor(value: u32) -> Option<u32> {
    (value != SENSOR_NOT_AVAILABLE).then_some(value)
}

/// Status code for a failed read.
pub fn status_code(error: &Error) -> i32 {
    match error.kind() {
        ErrorKind::InitializationFailed | ErrorKind::InvalidDeviceIndex => STATUS_INVALID_ARGUMENT,
        ErrorKind::DeviceUnavailable => STATUS_DEVICE_UNAVAILABLE,
        ErrorKind::ReadFailed => STATUS_READ_FAILED,
    }
}

/// Error for a non-zero status returned by a native library.
pub fn error_from_status(index: usize, status: i32, record: &GpuTemperatures) -> Error {
    let message = record.message();
    let detail = if message.is_empty() {
        format!("gpu_monitor_get_temperatures returned {status}")
    } else {
        message
    };
    match status {
        STATUS_DEVICE_UNAVAILABLE => Error::unavailable(index, detail),
        _ => Error::read_failed(index, detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        assert_eq!(RECORD_SIZE, 268);
        assert_eq!(std::mem::align_of::<GpuTemperatures>(), 4);
        assert_eq!(std::mem::offset_of!(GpuTemperatures, junction_temp), 4);
        assert_eq!(std::mem::offset_of!(GpuTemperatures, vram_temp), 8);
        assert_eq!(std::mem::offset_of!(GpuTemperatures, error_message), 12);
    }

    #[test]
    fn test_byte_image_matches_memory() {
        let mut record = GpuTemperatures::from_reading(&TemperatureReading::new(65, 72, 58));
        record.set_message("ok");
        // SAFETY: GpuTemperatures is repr(C) plain data without padding
        let in_memory: [u8; RECORD_SIZE] = unsafe { std::mem::transmute(record) };
        assert_eq!(record.to_bytes(), in_memory);
    }

    #[test]
    fn test_message_is_nul_terminated_and_bounded() {
        let mut record = GpuTemperatures::default();
        record.set_message(&"m".repeat(1000));
        assert_eq!(record.error_message[AppConfig::MESSAGE_BUFFER_LEN - 1], 0);
        assert_eq!(record.message().len(), AppConfig::MESSAGE_BUFFER_LEN - 1);

        record.set_message("short");
        assert_eq!(record.message(), "short");
    }

    #[test]
    fn test_unsupported_sensor_uses_sentinel() {
        let mut reading = TemperatureReading::new(65, 72, 58);
        reading.junction = SensorReading::unsupported();
        reading.vram = SensorReading::out_of_range(255);

        let record = GpuTemperatures::from_reading(&reading);
        assert_eq!(record.junction_temp, SENSOR_NOT_AVAILABLE);
        assert_eq!(record.vram_temp, 255);

        let raw = record.to_raw();
        assert_eq!(raw.core, Some(65));
        assert_eq!(raw.junction, None);
        assert_eq!(raw.vram, Some(255));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(status_code(&Error::InvalidDeviceIndex { index: 5, count: 2 }), -1);
        assert_eq!(status_code(&Error::unavailable(0, "gone")), -2);
        assert_eq!(status_code(&Error::read_failed(0, "busy")), -3);
    }

    #[test]
    fn test_error_from_status_uses_message() {
        let mut record = GpuTemperatures::default();
        let err = error_from_status(1, -1, &record);
        assert_eq!(
            err,
            Error::read_failed(1, "gpu_monitor_get_temperatures returned -1")
        );

        record.set_message("GPU lost");
        let err = error_from_status(1, STATUS_DEVICE_UNAVAILABLE, &record);
        assert_eq!(err, Error::unavailable(1, "GPU lost"));
    }
}
