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

//! GPU core, junction (hotspot) and VRAM temperature monitoring for
//! NVIDIA devices.
//!
//! The library is built both as an `rlib` for Rust callers and as
//! `libgpumonitor.so`, a drop-in replacement for the C library of the same
//! name (see [`ffi::exports`]).
//!
//! ```rust,no_run
//! use gpumonitor::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let ctx = MonitorContext::initialize()?;
//!     for device in ctx.devices() {
//!         let reading = ctx.read_temperatures(device.index())?;
//!         println!("{}: core {:?}", device.name(), reading.core.value());
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod context;
pub mod device;
pub mod error;
pub mod ffi;
pub mod prelude;
pub mod utils;
pub mod view;

// Re-export just the config module from common for library users
pub mod common {
    pub mod config;
}

pub use common::config::{AppConfig, BackendKind, MonitorConfig};
pub use context::MonitorContext;
pub use error::{Detail, Error, ErrorKind, Result};
