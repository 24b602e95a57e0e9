// Telemetry backends and the temperature reading path

#[cfg(unix)]
pub mod pci;
pub mod reader;
pub mod reader_factory;
pub mod readers;
pub mod traits;
pub mod types;

pub use reader::{validate, TemperatureReader};
pub use reader_factory::open_backend;
pub use traits::TelemetryBackend;
pub use types::{
    DeviceDescriptor, DeviceHandle, RawTemperatures, SensorReading, SensorStatus,
    TemperatureReading,
};
