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

use crate::device::{DeviceDescriptor, DeviceHandle, RawTemperatures};
use crate::error::Result;

/// A source of GPU temperature telemetry.
///
/// A backend is opened by its constructor (failing with
/// [`Error::InitializationFailed`](crate::Error::InitializationFailed)),
/// enumerated once, queried any number of times and released exactly once.
/// Queries for different devices must not share mutable state, so that
/// concurrent reads through `&self` are safe.
pub trait TelemetryBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// List the devices present right now. Called once per context.
    fn enumerate(&mut self) -> Result<Vec<DeviceDescriptor>>;

    /// Perform exactly one sensor query against one device.
    ///
    /// Errors returned here should carry `device.index()`.
    fn query(&self, device: &DeviceHandle) -> Result<RawTemperatures>;

    /// Release every resource held by the backend.
    fn release(self: Box<Self>);
}
