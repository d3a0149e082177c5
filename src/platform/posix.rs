// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// POSIX implementation of the arena backing store: a private anonymous
// read/write mapping, sized to a page multiple.  Physical residency grows
// lazily as pages are first touched; the mapping is released only when the
// owning handle drops.

use std::io;
use std::ptr;

/// The system page size.  Falls back to 4 KiB if sysconf refuses to answer.
pub fn page_size() -> usize {
    let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if sz <= 0 {
        4096
    } else {
        sz as usize
    }
}

/// A private anonymous virtual-memory reservation.
pub struct PlatformMap {
    mem: *mut u8,
    size: usize, // mapped size, a page multiple
}

// Safety: the mapping is process-private and the pointer is stable for the
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
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if mem == libc::MAP_FAILED {
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
            unsafe { libc::munmap(self.mem as *mut libc::c_void, self.size) };
        }
    }
}
