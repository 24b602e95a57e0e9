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

//! Example demonstrating the gpumonitor library API.
//!
//! Opens the default backend, prints the detected GPUs and three polling
//! passes, then releases everything. Without GPUs (or without root) it
//! falls back to the mock backend so the flow can still be followed.
//!
//! Run with: `cargo run --example library_usage`

use std::thread;
use std::time::Duration;

use gpumonitor::prelude::*;

fn open() -> Result<MonitorContext> {
    match MonitorContext::initialize() {
        Ok(ctx) if ctx.device_count() > 0 => Ok(ctx),
        Ok(_) => {
            println!("No GPUs detected, using the mock backend.\n");
            MonitorContext::with_config(MonitorConfig::new().backend(BackendKind::Mock))
        }
        Err(e) => {
            println!("{e}\nUsing the mock backend.\n");
            MonitorContext::with_config(MonitorConfig::new().backend(BackendKind::Mock))
        }
    }
}

fn show(sensor: &SensorReading) -> String {
    match sensor.value() {
        Some(celsius) => format!("{celsius}°C"),
        None => format!("n/a ({:?})", sensor.status),
    }
}

fn main() -> Result<()> {
    println!("=== gpumonitor Library Usage Example ===\n");

    let mut ctx = open()?;
    println!("Backend: {}", ctx.backend_name());
    println!("Found {} GPU(s):", ctx.device_count());
    for device in ctx.devices() {
        println!(
            "  [{}] {} ({})",
            device.index(),
            device.name(),
            device.pci_bus_id().unwrap_or("unknown bus id")
        );
    }

    for pass in 1..=3 {
        println!("\n--- Pass {pass} ---");
        for index in 0..ctx.device_count() {
            match ctx.read_temperatures(index) {
                Ok(reading) => println!(
                    "  GPU {index}: core {} / junction {} / vram {}",
                    show(&reading.core),
                    show(&reading.junction),
                    show(&reading.vram)
                ),
                Err(e) if e.is_retryable() => println!("  GPU {index}: {e} (will retry)"),
                Err(e) => println!("  GPU {index}: {e}"),
            }
        }
        thread::sleep(Duration::from_secs(1));
    }

    // Out-of-range indices never reach the hardware
    if let Err(e) = ctx.read_temperatures(ctx.device_count()) {
        println!("\nReading past the last device: {e}");
    }

    ctx.shutdown();
    println!("\n=== Example Complete ===");
    Ok(())
}
