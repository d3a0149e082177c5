// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// parmalloc: a heap allocator serving variable-sized blocks out of large
// anonymous virtual-memory reservations.  Chunks carry in-band boundary-tag
// metadata (header word, footer mirror while free), placement is first-fit
// with splitting and bidirectional coalescing, and the arena grows and
// shrinks through a bump frontier.
//
// Two engines share the chunk machinery:
//   serial    — one arena, one mutex (the `serial_heap` feature routes the
//               process-global API through it)
//   parallel  — one arena per hardware context plus a per-thread
//               small-object cache in front of the free lists (default)

pub mod chunk;

mod free_list;
mod platform;

pub mod arena;
pub use arena::Arena;

pub mod tcache;
pub use tcache::{ThreadCache, TCACHE_BINS, TCACHE_MAX_PER_BIN};

pub mod serial;
pub use serial::SerialHeap;

pub mod parallel;
pub use parallel::{ParallelHeap, MAX_ARENAS};

use std::ptr;
use std::sync::OnceLock;

#[cfg(feature = "serial_heap")]
fn global_heap() -> Option<&'static SerialHeap> {
    static HEAP: OnceLock<Option<SerialHeap>> = OnceLock::new();
    HEAP.get_or_init(|| match SerialHeap::new() {
        Ok(heap) => Some(heap),
        Err(e) => {
            log::warn!("heap initialisation failed: {e}");
            None
        }
    })
    .as_ref()
}

#[cfg(not(feature = "serial_heap"))]
fn global_heap() -> Option<&'static ParallelHeap> {
    static HEAP: OnceLock<Option<ParallelHeap>> = OnceLock::new();
    HEAP.get_or_init(|| match ParallelHeap::new() {
        Ok(heap) => Some(heap),
        Err(e) => {
            log::warn!("heap initialisation failed: {e}");
            None
        }
    })
    .as_ref()
}

/// Serve a 16-byte-aligned block of at least `align_up(n)` usable
/// uninitialised bytes from the process-global heap.  Returns null when `n`
/// is zero, the heap failed to initialise, or the request cannot be
/// satisfied.
pub fn allocate(n: usize) -> *mut u8 {
    match global_heap() {
        Some(heap) => heap.allocate(n),
        None => ptr::null_mut(),
    }
}

/// Return a block previously obtained from [`allocate`] to the process-global
/// heap.  Null is a no-op; anything else must be a live allocate result.
pub fn release(p: *mut u8) {
    if let Some(heap) = global_heap() {
        heap.release(p);
    }
}
