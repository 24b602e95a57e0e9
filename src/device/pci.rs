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

//! Memory-mapped access to NVIDIA BAR0 thermal registers.
//!
//! NVML only exposes the core temperature. The hotspot (junction) and
//! memory temperatures are read straight from two registers in the
//! device's first PCI BAR, which sysfs exposes as
//! `/sys/bus/pci/devices/<bus id>/resource0`. Opening that file requires
//! root.
//!
//! A [`Bar0Sensors`] maps the two pages holding the registers once, at
//! enumeration time, and unmaps them on drop. Each read is then a single
//! volatile 32-bit load, so it cannot block.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::ptr;

/// Hotspot temperature register, degrees in bits 8..16.
pub const HOTSPOT_REGISTER_OFFSET: u64 = 0x0002_046C;
/// Memory temperature register, 1/32 degree units in bits 0..12.
pub const VRAM_REGISTER_OFFSET: u64 = 0x0000_E2A8;

pub fn decode_hotspot(reg: u32) -> u32 {
    (reg >> 8) & 0xff
}

pub fn decode_vram(reg: u32) -> u32 {
    (reg & 0x0fff) / 0x20
}

/// Sysfs spelling of a PCI location: `dddd:bb:dd.0`.
pub fn sysfs_bus_id(domain: u32, bus: u32, device: u32) -> String {
    format!("{domain:04x}:{bus:02x}:{device:02x}.0")
}

pub fn bar0_path(sysfs_root: &Path, bus_id: &str) -> PathBuf {
    sysfs_root.join(bus_id).join("resource0")
}

fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

/// One mapped page containing a 32-bit register.
#[derive(Debug)]
pub struct RegisterWindow {
    base: *mut libc::c_void,
    len: usize,
    offset_in_page: usize,
}

// SAFETY: the mapping is read-only and only accessed through volatile
// loads; it is unmapped exactly once, in Drop, which requires ownership.
unsafe impl Send for RegisterWindow {}
unsafe impl Sync for RegisterWindow {}

impl RegisterWindow {
    /// Map the page of `file` that contains `offset`.
    pub fn map(file: &File, offset: u64) -> io::Result<Self> {
        let page = page_size();
        let page_base = offset & !(page as u64 - 1);
        let offset_in_page = (offset - page_base) as usize;
        if offset_in_page + 4 > page {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("register at {offset:#x} straddles a page boundary"),
            ));
        }

        // SAFETY: fresh read-only shared mapping of a file we hold open;
        // the kernel validates fd, length and page-aligned offset.
        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                page,
                libc::PROT_READ,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                page_base as libc::off_t,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            base,
            len: page,
            offset_in_page,
        })
    }

    pub fn read_u32(&self) -> u32 {
        // SAFETY: map() checked that the 4 bytes lie inside the mapping,
        // and mmap returns page-aligned memory so the load is aligned
        // whenever the register offset is.
        unsafe {
            let addr = (self.base as *const u8).add(self.offset_in_page) as *const u32;
            ptr::read_volatile(addr)
        }
    }
}

impl Drop for RegisterWindow {
    fn drop(&mut self) {
        // SAFETY: base/len are exactly what mmap returned
        unsafe {
            libc::munmap(self.base, self.len);
        }
    }
}

/// The junction and VRAM registers of one device.
#[derive(Debug)]
pub struct Bar0Sensors {
    hotspot: RegisterWindow,
    vram: RegisterWindow,
}

impl Bar0Sensors {
    pub fn open(resource: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_SYNC)
            .open(resource)?;
        // Mappings outlive the descriptor, so the file is closed on return
        Ok(Self {
            hotspot: RegisterWindow::map(&file, HOTSPOT_REGISTER_OFFSET)?,
            vram: RegisterWindow::map(&file, VRAM_REGISTER_OFFSET)?,
        })
    }

    /// Decoded `(junction, vram)` temperatures in degrees Celsius.
    pub fn read(&self) -> (u32, u32) {
        (
            decode_hotspot(self.hotspot.read_u32()),
            decode_vram(self.vram.read_u32()),
        )
    }
}
