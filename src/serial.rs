// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Serial engine: one arena behind one mutex.  Every allocate and release
// takes the lock around its whole critical section; there is no lock
// nesting and no other synchronisation.

use std::io;
use std::ptr;
use std::ptr::NonNull;
use std::sync::Mutex;

use crate::arena::Arena;

/// Default reservation for the single arena: 1 GiB.
pub const REGION_SIZE: usize = 1 << 30;

pub struct SerialHeap {
    arena: Mutex<Arena>,
}

impl SerialHeap {
    /// Build a heap over the default 1 GiB reservation.
    pub fn new() -> io::Result<Self> {
        Self::with_region_size(REGION_SIZE)
    }

    /// Build a heap over a caller-chosen reservation size (page-rounded).
    pub fn with_region_size(region_size: usize) -> io::Result<Self> {
        Ok(Self {
            arena: Mutex::new(Arena::new(region_size)?),
        })
    }

    /// Serve a 16-byte-aligned block of at least `align_up(n)` usable bytes.
    /// Null when `n` is zero or the arena is exhausted.
    pub fn allocate(&self, n: usize) -> *mut u8 {
        if n == 0 {
            return ptr::null_mut();
        }
        match self.arena.lock().unwrap().allocate(n) {
            Some(p) => p.as_ptr(),
            None => ptr::null_mut(),
        }
    }

    /// Return a block obtained from [`allocate`](Self::allocate).  Null is a
    /// no-op.
    pub fn release(&self, p: *mut u8) {
        if let Some(p) = NonNull::new(p) {
            self.arena.lock().unwrap().release(p);
        }
    }

    /// Explored bytes in the arena; zero once everything has been released.
    pub fn bump_offset(&self) -> usize {
        self.arena.lock().unwrap().bump_offset()
    }

    /// Number of chunks on the arena's free list.
    pub fn free_list_len(&self) -> usize {
        self.arena.lock().unwrap().free_list_len()
    }

    /// Full arena walk; see [`Arena::check_consistency`].
    pub fn check_consistency(&self) -> io::Result<()> {
        self.arena.lock().unwrap().check_consistency()
    }
}
