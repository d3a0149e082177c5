// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Windows implementation of the arena backing store: a committed private
// read/write region from VirtualAlloc, sized to a page multiple.  Released
// only when the owning handle drops.

use std::io;
use std::ptr;

use windows_sys::Win32::System::Memory::{
    VirtualAlloc, VirtualFree, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_READWRITE,
};
use windows_sys::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

/// The system page size.
pub fn page_size() -> usize {
    let mut info: SYSTEM_INFO = unsafe { std::mem::zeroed() };
    unsafe { GetSystemInfo(&mut info) };
    info.dwPageSize as usize
}

/// A private virtual-memory reservation.
pub struct PlatformMap {
    mem: *mut u8,
    size: usize, // mapped size, a page multiple
}

// Safety: the region is process-private and the pointer is stable for the
// lifetime of the handle.
unsafe impl Send for PlatformMap {}
unsafe impl Sync for PlatformMap {}

impl PlatformMap {
    /// Reserve at least `size` bytes of zero-initialised read/write memory.
    /// The actual reservation is rounded up to the page size.
    pub fn reserve(size: usize) -> io::Result<Self> {
        if size == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "size is 0"));
        }
        let page = page_size();
        let size = size
            .checked_add(page - 1)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "size overflows"))?
            / page
            * page;

        let mem = unsafe {
            VirtualAlloc(
                ptr::null(),
                size,
                MEM_RESERVE | MEM_COMMIT,
                PAGE_READWRITE,
            )
        };
        if mem.is_null() {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            mem: mem as *mut u8,
            size,
        })
    }

    /// Mutable pointer to the start of the reservation.
    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.mem
    }

    /// Mapped size (page-rounded).
    pub fn mapped_size(&self) -> usize {
        self.size
    }
}

impl Drop for PlatformMap {
    fn drop(&mut self) {
        if !self.mem.is_null() {
            unsafe { VirtualFree(self.mem as *mut core::ffi::c_void, 0, MEM_RELEASE) };
        }
    }
}
