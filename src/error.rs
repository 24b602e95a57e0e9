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

//! Error types for the gpumonitor library.
//!
//! Every failure the monitoring core can report falls into one of four
//! kinds. Each error carries a human-readable [`Detail`] whose length is
//! bounded by the message buffer of the native record
//! ([`AppConfig::MESSAGE_BUFFER_LEN`](crate::common::config::AppConfig)),
//! so callers never have to deal with unbounded diagnostics.
//!
//! # Example
//!
//! ```rust,no_run
//! use gpumonitor::{Error, ErrorKind, MonitorContext};
//!
//! let ctx = MonitorContext::initialize()?;
//! match ctx.read_temperatures(0) {
//!     Ok(reading) => println!("{reading:?}"),
//!     Err(e) if e.is_retryable() => eprintln!("transient: {e}"),
//!     Err(e) => eprintln!("giving up on GPU 0: {e}"),
//! }
//! # Ok::<(), Error>(())
//! ```

use std::fmt;

use thiserror::Error;

use crate::common::config::AppConfig;

/// The main error type for gpumonitor operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The driver or hardware interface could not be opened.
    ///
    /// Typical causes are missing permissions, a missing kernel module or
    /// no supported hardware. Fatal to startup and never retried.
    #[error("Initialization failed: {0}")]
    InitializationFailed(Detail),

    /// The caller asked for a device index outside `0..device_count`.
    ///
    /// This is a bug in the calling code. No hardware is touched.
    #[error("Invalid device index {index} (device count: {count})")]
    InvalidDeviceIndex { index: i64, count: usize },

    /// The device was present at enumeration but can no longer be reached.
    ///
    /// The caller may skip this device on subsequent polls.
    #[error("Device {index} unavailable: {detail}")]
    DeviceUnavailable { index: usize, detail: Detail },

    /// A transient failure while reading a present device.
    ///
    /// Expected to resolve on its own; retry on the next poll tick.
    #[error("Read failed for device {index}: {detail}")]
    ReadFailed { index: usize, detail: Detail },
}

/// The closed set of failure kinds, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InitializationFailed,
    InvalidDeviceIndex,
    DeviceUnavailable,
    ReadFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InitializationFailed => write!(f, "initialization failed"),
            ErrorKind::InvalidDeviceIndex => write!(f, "invalid device index"),
            ErrorKind::DeviceUnavailable => write!(f, "device unavailable"),
            ErrorKind::ReadFailed => write!(f, "read failed"),
        }
    }
}

impl Error {
    pub fn initialization(detail: impl Into<String>) -> Self {
        Error::InitializationFailed(Detail::new(detail))
    }

    pub fn unavailable(index: usize, detail: impl Into<String>) -> Self {
        Error::DeviceUnavailable {
            index,
            detail: Detail::new(detail),
        }
    }

    pub fn read_failed(index: usize, detail: impl Into<String>) -> Self {
        Error::ReadFailed {
            index,
            detail: Detail::new(detail),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InitializationFailed(_) => ErrorKind::InitializationFailed,
            Error::InvalidDeviceIndex { .. } => ErrorKind::InvalidDeviceIndex,
            Error::DeviceUnavailable { .. } => ErrorKind::DeviceUnavailable,
            Error::ReadFailed { .. } => ErrorKind::ReadFailed,
        }
    }

    /// Whether retrying on a later poll tick can succeed.
    ///
    /// Only [`Error::ReadFailed`] is transient. A vanished device is not
    /// retried by default, though callers may query it again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ReadFailed { .. })
    }

    /// The rendered error message, bounded like every [`Detail`].
    ///
    /// This is the text written into the native record's message buffer.
    pub fn bounded_message(&self) -> Detail {
        Detail::new(self.to_string())
    }

    /// Re-target a per-device error at another index.
    ///
    /// Backends address devices by their own ids; the context rewrites
    /// the index to the dense one the caller used.
    pub(crate) fn with_index(self, index: usize) -> Self {
        match self {
            Error::DeviceUnavailable { detail, .. } => Error::DeviceUnavailable { index, detail },
            Error::ReadFailed { detail, .. } => Error::ReadFailed { index, detail },
            other => other,
        }
    }
}

/// A diagnostic message bounded to the native message buffer.
///
/// The buffer holds [`AppConfig::MESSAGE_BUFFER_LEN`] bytes including the
/// terminating NUL, so at most `MESSAGE_BUFFER_LEN - 1` bytes of text are
/// kept. Truncation never splits a UTF-8 character.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Detail(String);

impl Detail {
    pub const MAX_LEN: usize = AppConfig::MESSAGE_BUFFER_LEN - 1;

    pub fn new(message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.len() > Self::MAX_LEN {
            let mut end = Self::MAX_LEN;
            while !message.is_char_boundary(end) {
                end -= 1;
            }
            message.truncate(end);
        }
        Detail(message)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Detail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Detail {
    fn from(value: &str) -> Self {
        Detail::new(value)
    }
}

impl From<String> for Detail {
    fn from(value: String) -> Self {
        Detail::new(value)
    }
}

/// A specialized Result type for gpumonitor operations.
pub type Result<T> = std::result::Result<T, Error>;
