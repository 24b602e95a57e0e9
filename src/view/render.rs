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

//! Output of the monitoring driver.
//!
//! Every function writes to a caller supplied `Write` so the driver can
//! target stdout while tests capture into a `Vec<u8>`.

use std::io::{self, Write};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::device::{DeviceHandle, SensorReading, SensorStatus, TemperatureReading};
use crate::error::{Error, ErrorKind};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const PERMISSION_HINT: &str =
    "Make sure the NVIDIA driver is loaded and run with sudo so the driver and GPU registers are accessible.";

pub fn print_device_count<W: Write>(out: &mut W, count: usize) -> io::Result<()> {
    writeln!(out, "Found {count} GPU(s)")
}

pub fn print_no_devices<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "No GPUs detected")
}

pub fn print_initialization_failure<W: Write>(out: &mut W, error: &Error) -> io::Result<()> {
    writeln!(out, "Failed to initialize GPU monitor: {error}")?;
    writeln!(out, "{PERMISSION_HINT}")
}

pub fn print_stopped<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "\nMonitoring stopped by user")
}

pub fn print_tick_header<W: Write>(out: &mut W, at: DateTime<Local>) -> io::Result<()> {
    writeln!(out, "\n[{}]", at.format(TIMESTAMP_FORMAT))
}

fn format_sensor(sensor: &SensorReading) -> String {
    match sensor.status {
        SensorStatus::Valid => format!("{}°C", sensor.celsius),
        SensorStatus::Unsupported => "N/A".to_string(),
        SensorStatus::OutOfRange => format!("N/A (implausible value {})", sensor.celsius),
    }
}

pub fn print_reading<W: Write>(
    out: &mut W,
    index: usize,
    reading: &TemperatureReading,
) -> io::Result<()> {
    writeln!(out, "\nGPU {index}:")?;
    writeln!(out, "  Core Temperature:     {}", format_sensor(&reading.core))?;
    writeln!(out, "  Junction Temperature: {}", format_sensor(&reading.junction))?;
    writeln!(out, "  VRAM Temperature:     {}", format_sensor(&reading.vram))
}

pub fn print_read_failure<W: Write>(out: &mut W, index: usize, error: &Error) -> io::Result<()> {
    writeln!(out, "Failed to get temperatures for GPU {index}: {error}")
}

pub fn print_device_list<W: Write>(out: &mut W, devices: &[DeviceHandle]) -> io::Result<()> {
    for device in devices {
        writeln!(
            out,
            "GPU {}: {} ({})",
            device.index(),
            device.name(),
            device.pci_bus_id().unwrap_or("unknown bus id")
        )?;
    }
    Ok(())
}

/// One JSON line per device per polling pass.
#[derive(Debug, Serialize)]
pub struct JsonSample<'a> {
    pub timestamp: String,
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    #[serde(flatten)]
    pub outcome: JsonOutcome<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum JsonOutcome<'a> {
    Reading {
        core: &'a SensorReading,
        junction: &'a SensorReading,
        vram: &'a SensorReading,
    },
    Failure {
        error: JsonError,
    },
}

#[derive(Debug, Serialize)]
pub struct JsonError {
    pub kind: &'static str,
    pub message: String,
}

fn kind_tag(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::InitializationFailed => "initialization_failed",
        ErrorKind::InvalidDeviceIndex => "invalid_device_index",
        ErrorKind::DeviceUnavailable => "device_unavailable",
        ErrorKind::ReadFailed => "read_failed",
    }
}

/// Writes one polling pass in the selected format.
pub struct SampleWriter {
    format: OutputFormat,
    timestamp: DateTime<Local>,
}

impl SampleWriter {
    pub fn new(format: OutputFormat, timestamp: DateTime<Local>) -> Self {
        Self { format, timestamp }
    }

    pub fn begin<W: Write>(&self, out: &mut W) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => print_tick_header(out, self.timestamp),
            OutputFormat::Json => Ok(()),
        }
    }

    pub fn write_result<W: Write>(
        &self,
        out: &mut W,
        device: &DeviceHandle,
        result: &Result<TemperatureReading, Error>,
    ) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => match result {
                Ok(reading) => print_reading(out, device.index(), reading),
                Err(e) => print_read_failure(out, device.index(), e),
            },
            OutputFormat::Json => {
                let outcome = match result {
                    Ok(reading) => JsonOutcome::Reading {
                        core: &reading.core,
                        junction: &reading.junction,
                        vram: &reading.vram,
                    },
                    Err(e) => JsonOutcome::Failure {
                        error: JsonError {
                            kind: kind_tag(e.kind()),
                            message: e.to_string(),
                        },
                    },
                };
                let sample = JsonSample {
                    timestamp: self.timestamp.to_rfc3339(),
                    index: device.index(),
                    name: Some(device.name()),
                    outcome,
                };
                let line = serde_json::to_string(&sample).map_err(io::Error::other)?;
                writeln!(out, "{line}")
            }
        }
    }
}

/// Device listing in the selected format.
pub fn print_devices<W: Write>(
    out: &mut W,
    format: OutputFormat,
    devices: &[DeviceHandle],
) -> io::Result<()> {
    match format {
        OutputFormat::Text => print_device_list(out, devices),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(devices).map_err(io::Error::other)?;
            writeln!(out, "{json}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceDescriptor;

    fn render(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn device(index: usize) -> DeviceHandle {
        DeviceHandle::new(
            index,
            DeviceDescriptor::new(index as u32, "NVIDIA RTX 4090").with_pci_bus_id("0000:01:00.0"),
        )
    }

    #[test]
    fn test_reading_lines() {
        let text = render(|out| print_reading(out, 0, &TemperatureReading::new(65, 72, 58)));
        assert_eq!(
            text,
            "\nGPU 0:\n  Core Temperature:     65°C\n  Junction Temperature: 72°C\n  VRAM Temperature:     58°C\n"
        );
    }

    #[test]
    fn test_invalid_sensors_are_not_printed_as_values() {
        let mut reading = TemperatureReading::new(65, 72, 58);
        reading.junction = SensorReading::unsupported();
        reading.vram = SensorReading::out_of_range(255);

        let text = render(|out| print_reading(out, 1, &reading));
        assert!(text.contains("Junction Temperature: N/A\n"));
        assert!(text.contains("VRAM Temperature:     N/A (implausible value 255)"));
        assert!(!text.contains("255°C"));
    }

    #[test]
    fn test_read_failure_line() {
        let text = render(|out| print_read_failure(out, 1, &Error::read_failed(1, "device busy")));
        assert_eq!(
            text,
            "Failed to get temperatures for GPU 1: Read failed for device 1: device busy\n"
        );
    }

    #[test]
    fn test_initialization_failure_has_hint() {
        let text = render(|out| {
            print_initialization_failure(out, &Error::initialization("Insufficient permissions for NVML"))
        });
        assert!(text.contains("Insufficient permissions for NVML"));
        assert!(text.contains("sudo"));
    }

    #[test]
    fn test_json_sample() {
        let writer = SampleWriter::new(OutputFormat::Json, Local::now());
        let text = render(|out| {
            writer.write_result(out, &device(0), &Ok(TemperatureReading::new(65, 72, 58)))
        });
        let value: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(value["index"], 0);
        assert_eq!(value["name"], "NVIDIA RTX 4090");
        assert_eq!(value["core"]["celsius"], 65);
        assert_eq!(value["junction"]["status"], "valid");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_json_failure() {
        let writer = SampleWriter::new(OutputFormat::Json, Local::now());
        let text = render(|out| {
            writer.write_result(out, &device(1), &Err(Error::unavailable(1, "GPU lost")))
        });
        let value: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(value["error"]["kind"], "device_unavailable");
        assert!(value.get("core").is_none());
    }

    #[test]
    fn test_device_list() {
        let text = render(|out| print_devices(out, OutputFormat::Text, &[device(0)]));
        assert_eq!(text, "GPU 0: NVIDIA RTX 4090 (0000:01:00.0)\n");

        let json = render(|out| print_devices(out, OutputFormat::Json, &[device(0)]));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["pci_bus_id"], "0000:01:00.0");
        assert!(value[0].get("native_id").is_none());
    }
}
