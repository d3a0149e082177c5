// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Per-thread small-object cache.
//
// Each thread owns 64 bins, one per 16-byte usable-size step; each bin is a
// singly-linked LIFO stack of at most 32 chunks, threaded through the first
// payload word.  Cached chunks keep FREE = 0, so from the owning arena's
// point of view they are still in use: coalescing can never reach them and
// their neighbours' PREV_IN_USE bits stay set.
//
// Bins never migrate between threads; a thread that exits forfeits whatever
// it cached.  Caches are keyed by heap instance so that a block cached
// against one heap can never resurface from another.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ptr;
use std::ptr::NonNull;

use crate::chunk::{Chunk, CHUNK_ALIGN, HEADER_SIZE};

/// Number of size-class bins per thread.
pub const TCACHE_BINS: usize = 64;

/// Per-bin stack depth limit; releases past it fall through to the arena.
pub const TCACHE_MAX_PER_BIN: usize = 32;

#[derive(Clone, Copy)]
struct Bin {
    head: *mut u8, // chunk header address, or null
    count: u32,
}

const EMPTY_BIN: Bin = Bin {
    head: ptr::null_mut(),
    count: 0,
};

pub struct ThreadCache {
    bins: [Bin; TCACHE_BINS],
}

impl ThreadCache {
    pub fn new() -> Self {
        Self {
            bins: [EMPTY_BIN; TCACHE_BINS],
        }
    }

    /// Bin for a chunk with `usable` payload bytes, or `None` when the size
    /// is outside the cached range.
    fn bin_index(usable: usize) -> Option<usize> {
        let idx = (usable / CHUNK_ALIGN).checked_sub(1)?;
        if idx < TCACHE_BINS {
            Some(idx)
        } else {
            None
        }
    }

    /// Pop a cached block able to hold a request whose total chunk size is
    /// `need`.  No header rewrite: the chunk never stopped being in use.
    pub fn pop(&mut self, need: usize) -> Option<NonNull<u8>> {
        let idx = Self::bin_index(need - HEADER_SIZE)?;
        let bin = &mut self.bins[idx];
        let head = NonNull::new(bin.head)?;
        let ch = Chunk::at(head.as_ptr());
        bin.head = ch.link_fd();
        bin.count -= 1;
        NonNull::new(ch.payload())
    }

    /// Try to cache a released block.  Returns false when the block's size
    /// class is uncached or its bin is full; the caller then takes the arena
    /// path.  FREE bits and footers are left untouched.
    pub fn push(&mut self, payload: NonNull<u8>) -> bool {
        let ch = Chunk::from_payload(payload.as_ptr());
        let idx = match Self::bin_index(ch.size() - HEADER_SIZE) {
            Some(idx) => idx,
            None => return false,
        };
        let bin = &mut self.bins[idx];
        if bin.count as usize >= TCACHE_MAX_PER_BIN {
            return false;
        }
        ch.set_link_fd(bin.head);
        bin.head = ch.addr();
        bin.count += 1;
        true
    }

    /// Pop everything, returning the payload pointers.  Used to drain a
    /// thread's bins back through the arena release path.
    pub fn drain(&mut self) -> Vec<NonNull<u8>> {
        let mut out = Vec::new();
        for bin in &mut self.bins {
            let mut cursor = bin.head;
            while let Some(head) = NonNull::new(cursor) {
                let ch = Chunk::at(head.as_ptr());
                cursor = ch.link_fd();
                if let Some(p) = NonNull::new(ch.payload()) {
                    out.push(p);
                }
            }
            *bin = EMPTY_BIN;
        }
        out
    }

    /// Total blocks currently cached across all bins.
    pub fn cached_blocks(&self) -> usize {
        self.bins.iter().map(|b| b.count as usize).sum()
    }

    /// Blocks cached in the bin serving `usable` payload bytes.
    pub fn bin_len(&self, usable: usize) -> usize {
        match Self::bin_index(usable) {
            Some(idx) => self.bins[idx].count as usize,
            None => 0,
        }
    }
}

impl Default for ThreadCache {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static CACHES: RefCell<HashMap<u64, ThreadCache>> = RefCell::new(HashMap::new());
}

/// Run `f` against the calling thread's cache for the heap identified by
/// `heap_id`, creating it on first use.
pub(crate) fn with_cache<R>(heap_id: u64, f: impl FnOnce(&mut ThreadCache) -> R) -> R {
    CACHES.with(|caches| {
        let mut caches = caches.borrow_mut();
        f(caches.entry(heap_id).or_default())
    })
}
