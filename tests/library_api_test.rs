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

//! Integration tests for the gpumonitor library API.

use gpumonitor::device::readers::mock::{MockBackend, MockDevice, MockOutcome};
use gpumonitor::prelude::*;

fn mock_context(devices: Vec<MockDevice>) -> MonitorContext {
    MonitorContext::with_backend(Box::new(MockBackend::with_devices(devices)), MonitorConfig::default())
        .expect("mock backend should initialize")
}

#[test]
fn test_initialize_does_not_panic() {
    // Succeeds on GPU hosts, fails with InitializationFailed elsewhere
    match MonitorContext::initialize() {
        Ok(mut ctx) => {
            println!("Found {} GPU(s)", ctx.device_count());
            ctx.shutdown();
        }
        Err(e) => assert_eq!(e.kind(), ErrorKind::InitializationFailed),
    }
}

#[test]
fn test_mock_backend_from_config() {
    let ctx = MonitorContext::with_config(MonitorConfig::new().backend(BackendKind::Mock).mock_devices(3))
        .expect("mock backend should initialize");
    assert_eq!(ctx.backend_name(), "mock");
    assert_eq!(ctx.device_count(), 3);
    for index in 0..3 {
        assert!(ctx.read_temperatures(index).unwrap().all_valid());
    }
}

#[test]
fn test_out_of_range_index_never_queries_backend() {
    let backend = MockBackend::with_devices(vec![MockDevice::steady(65, 72, 58)]);
    let counters = backend.counters();
    let ctx = MonitorContext::with_backend(Box::new(backend), MonitorConfig::default()).unwrap();

    for index in [1, 2, 100, usize::MAX] {
        let err = ctx.read_temperatures(index).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDeviceIndex);
        assert!(!err.is_retryable());
    }
    assert_eq!(counters.queries(), 0);
}

#[test]
fn test_error_kinds_from_backend() {
    let ctx = mock_context(vec![
        MockDevice::steady(65, 72, 58).fail_on(1),
        MockDevice::steady(60, 70, 55).unplugged(),
    ]);

    let err = ctx.read_temperatures(0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReadFailed);
    assert!(err.is_retryable());
    assert!(ctx.read_temperatures(0).is_ok());

    let err = ctx.read_temperatures(1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceUnavailable);
    assert!(!err.is_retryable());
}

#[test]
fn test_unsupported_and_implausible_sensors() {
    let ctx = mock_context(vec![MockDevice::reporting(RawTemperatures {
        core: Some(65),
        junction: None,
        vram: Some(255),
    })]);

    let reading = ctx.read_temperatures(0).unwrap();
    assert_eq!(reading.core.value(), Some(65));
    assert_eq!(reading.junction.status, SensorStatus::Unsupported);
    assert_eq!(reading.vram.status, SensorStatus::OutOfRange);
    assert_eq!(reading.vram.value(), None);
    assert!(!reading.all_valid());
}

#[test]
fn test_scripted_outcomes_follow_query_order() {
    let ctx = mock_context(vec![MockDevice::steady(65, 72, 58)
        .on_query(2, MockOutcome::Reading(RawTemperatures::new(80, 90, 70)))
        .on_query(3, MockOutcome::Unavailable("GPU lost".to_string()))]);

    assert_eq!(ctx.read_temperatures(0).unwrap(), TemperatureReading::new(65, 72, 58));
    assert_eq!(ctx.read_temperatures(0).unwrap(), TemperatureReading::new(80, 90, 70));
    assert_eq!(
        ctx.read_temperatures(0).unwrap_err(),
        Error::unavailable(0, "GPU lost")
    );
    assert_eq!(ctx.read_temperatures(0).unwrap(), TemperatureReading::new(65, 72, 58));
}

#[test]
fn test_device_metadata() {
    let ctx = mock_context(vec![
        MockDevice::steady(65, 72, 58).named("NVIDIA A100"),
        MockDevice::steady(60, 70, 55).named("NVIDIA H100"),
    ]);
    let names: Vec<&str> = ctx.devices().iter().map(|d| d.name()).collect();
    assert_eq!(names, ["NVIDIA A100", "NVIDIA H100"]);
    assert_eq!(ctx.device(1).and_then(|d| d.pci_bus_id()), Some("0000:02:00.0"));
}

#[test]
fn test_shutdown_twice_releases_once() {
    let backend = MockBackend::with_devices(vec![MockDevice::steady(65, 72, 58)]);
    let counters = backend.counters();
    let mut ctx = MonitorContext::with_backend(Box::new(backend), MonitorConfig::default()).unwrap();

    ctx.shutdown();
    ctx.shutdown();
    drop(ctx);
    assert_eq!(counters.releases(), 1);
}

#[test]
fn test_concurrent_reads_share_context() {
    let ctx = mock_context((0..8).map(|i| MockDevice::steady(50 + i, 60 + i, 55 + i)).collect());

    std::thread::scope(|scope| {
        for index in 0..ctx.device_count() {
            let ctx = &ctx;
            scope.spawn(move || {
                let expected = index as u32;
                for _ in 0..50 {
                    let reading = ctx.read_temperatures(index).unwrap();
                    assert_eq!(reading.core.value(), Some(50 + expected));
                }
            });
        }
    });
}
