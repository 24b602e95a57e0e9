use serde::{Deserialize, Serialize};

/// A device as reported by a backend during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub native_id: u32,             // Backend-specific id (NVML index, library index, ...)
    pub name: String,               // Marketing name if the backend knows it
    pub pci_bus_id: Option<String>, // "dddd:bb:dd.f" when known
}

impl DeviceDescriptor {
    pub fn new(native_id: u32, name: impl Into<String>) -> Self {
        Self {
            native_id,
            name: name.into(),
            pci_bus_id: None,
        }
    }

    pub fn with_pci_bus_id(mut self, bus_id: impl Into<String>) -> Self {
        self.pci_bus_id = Some(bus_id.into());
        self
    }
}

/// A handle to one enumerated device.
///
/// Handles are created by [`MonitorContext`](crate::MonitorContext) at
/// initialization and owned by it; the dense `index` is what callers use to
/// address a device. The native id is opaque outside the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceHandle {
    index: usize,
    #[serde(skip)]
    native_id: u32,
    name: String,
    pci_bus_id: Option<String>,
}

impl DeviceHandle {
    pub(crate) fn new(index: usize, descriptor: DeviceDescriptor) -> Self {
        Self {
            index,
            native_id: descriptor.native_id,
            name: descriptor.name,
            pci_bus_id: descriptor.pci_bus_id,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn native_id(&self) -> u32 {
        self.native_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pci_bus_id(&self) -> Option<&str> {
        self.pci_bus_id.as_deref()
    }
}

/// Raw per-sensor values as a backend produced them.
///
/// `None` means the device does not have the sensor. Values are not yet
/// checked against the sane range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawTemperatures {
    pub core: Option<u32>,
    pub junction: Option<u32>,
    pub vram: Option<u32>,
}

impl RawTemperatures {
    pub fn new(core: u32, junction: u32, vram: u32) -> Self {
        Self {
            core: Some(core),
            junction: Some(junction),
            vram: Some(vram),
        }
    }
}

/// Validity of one sensor value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStatus {
    Valid,
    /// The device does not report this sensor.
    Unsupported,
    /// The sensor answered with a physically implausible value.
    OutOfRange,
}

/// One temperature in degrees Celsius with its validity flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorReading {
    pub celsius: u32,
    pub status: SensorStatus,
}

impl SensorReading {
    pub fn valid(celsius: u32) -> Self {
        Self {
            celsius,
            status: SensorStatus::Valid,
        }
    }

    pub fn unsupported() -> Self {
        Self {
            celsius: 0,
            status: SensorStatus::Unsupported,
        }
    }

    pub fn out_of_range(celsius: u32) -> Self {
        Self {
            celsius,
            status: SensorStatus::OutOfRange,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == SensorStatus::Valid
    }

    /// The temperature, only when it is a trustworthy measurement.
    pub fn value(&self) -> Option<u32> {
        self.is_valid().then_some(self.celsius)
    }
}

/// A single poll of one device's temperature sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub core: SensorReading,     // Overall GPU core temperature
    pub junction: SensorReading, // Hotspot temperature
    pub vram: SensorReading,     // Memory temperature
}

impl TemperatureReading {
    /// Build a reading where all three sensors are valid.
    pub fn new(core: u32, junction: u32, vram: u32) -> Self {
        Self {
            core: SensorReading::valid(core),
            junction: SensorReading::valid(junction),
            vram: SensorReading::valid(vram),
        }
    }

    pub fn all_valid(&self) -> bool {
        self.core.is_valid() && self.junction.is_valid() && self.vram.is_valid()
    }
}
