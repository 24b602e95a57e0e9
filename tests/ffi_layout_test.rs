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

//! Layout and round-trip checks of the native `GpuTemperatures` record.

use gpumonitor::device::{SensorReading, TemperatureReading};
use gpumonitor::ffi::{GpuTemperatures, RECORD_SIZE, SENSOR_NOT_AVAILABLE};
use gpumonitor::Error;

#[test]
fn test_record_is_268_bytes() {
    assert_eq!(std::mem::size_of::<GpuTemperatures>(), 268);
    assert_eq!(RECORD_SIZE, 268);
}

#[test]
fn test_byte_round_trip_keeps_values_and_message() {
    let mut record = GpuTemperatures::from_reading(&TemperatureReading::new(65, 72, 58));
    record.set_message("Failed to get GPU temperature: GPU is lost");

    let bytes = record.to_bytes();
    assert_eq!(&bytes[0..4], &65u32.to_ne_bytes());
    assert_eq!(&bytes[4..8], &72u32.to_ne_bytes());
    assert_eq!(&bytes[8..12], &58u32.to_ne_bytes());
    assert_eq!(bytes[12], b'F');

    let decoded = GpuTemperatures::from_bytes(&bytes);
    assert_eq!(decoded, record);
    assert_eq!(decoded.message(), "Failed to get GPU temperature: GPU is lost");
}

#[test]
fn test_error_record_has_bounded_message() {
    let long = "x".repeat(4096);
    let record = GpuTemperatures::from_error(&Error::read_failed(0, long));
    let bytes = record.to_bytes();

    assert_eq!(bytes[RECORD_SIZE - 1], 0);
    assert_eq!(record.message().len(), 255);
    assert_eq!((record.gpu_temp, record.junction_temp, record.vram_temp), (0, 0, 0));
}

#[test]
fn test_sentinel_survives_round_trip() {
    let mut reading = TemperatureReading::new(65, 72, 58);
    reading.vram = SensorReading::unsupported();

    let record = GpuTemperatures::from_bytes(&GpuTemperatures::from_reading(&reading).to_bytes());
    assert_eq!(record.vram_temp, SENSOR_NOT_AVAILABLE);
    assert_eq!(record.to_raw().vram, None);
    assert_eq!(record.to_raw().core, Some(65));
}
