use tracing::{debug, info};

use crate::common::config::{BackendKind, MonitorConfig};
use crate::device::readers::{mock::MockBackend, native::NativeLibraryBackend, nvidia::NvidiaBackend};
use crate::device::traits::TelemetryBackend;
use crate::error::{Error, Result};

/// Open the backend selected by `config`.
///
/// `Auto` tries NVML first and falls back to an existing
/// `libgpumonitor.so`; if neither opens, the error names both causes.
pub fn open_backend(config: &MonitorConfig) -> Result<Box<dyn TelemetryBackend>> {
    match config.backend {
        BackendKind::Nvml => Ok(Box::new(NvidiaBackend::open(config)?)),
        BackendKind::Native => Ok(Box::new(NativeLibraryBackend::open(config)?)),
        BackendKind::Mock => Ok(Box::new(MockBackend::demo(config.mock_devices))),
        BackendKind::Auto => {
            let nvml_error = match NvidiaBackend::open(config) {
                Ok(backend) => {
                    info!("Using NVML backend");
                    return Ok(Box::new(backend));
                }
                Err(e) => e,
            };
            debug!("NVML backend unavailable: {nvml_error}");

            match NativeLibraryBackend::open(config) {
                Ok(backend) => {
                    info!("Using native library backend ({})", backend.path().display());
                    Ok(Box::new(backend))
                }
                Err(native_error) => Err(Error::initialization(format!(
                    "no telemetry backend available. nvml: {}; native: {}",
                    detail_of(&nvml_error),
                    detail_of(&native_error)
                ))),
            }
        }
    }
}

fn detail_of(error: &Error) -> String {
    match error {
        Error::InitializationFailed(detail) => detail.to_string(),
        other => other.to_string(),
    }
}
