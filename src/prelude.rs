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

//! The gpumonitor prelude.
//!
//! Convenient re-exports for library users:
//!
//! ```rust
//! use gpumonitor::prelude::*;
//! ```

// Context and configuration
pub use crate::common::config::{BackendKind, MonitorConfig};
pub use crate::context::MonitorContext;

// Error types
pub use crate::error::{Error, ErrorKind, Result};

// Readings
pub use crate::device::{DeviceHandle, SensorReading, SensorStatus, TemperatureReading};

// Traits for advanced usage
pub use crate::device::{DeviceDescriptor, RawTemperatures, TelemetryBackend};
