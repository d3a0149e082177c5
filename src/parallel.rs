// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Parallel engine: a fixed registry of independent arenas, one mutex each,
// with the per-thread cache in front of them.
//
// A thread binds to arena `thread_slot mod arena_count` on first use and
// keeps that binding for life.  Both allocate and release dispatch by the
// calling thread's bound arena; a block released on a thread other than the
// one that allocated it therefore enters the releasing thread's cache or
// free list, and never coalesces (its neighbours belong to its home arena).
// A single call takes at most one arena lock, and none on a cache hit.

use std::cell::Cell;
use std::io;
use std::ptr;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use crate::arena::Arena;
use crate::chunk;
use crate::tcache;

/// Default reservation per arena: 64 MiB.
pub const REGION_SIZE: usize = 64 << 20;

/// Registry capacity; arena counts are clamped to this.
pub const MAX_ARENAS: usize = 64;

// Monotonic ids: one per heap instance (keys the thread caches), one per
// thread that ever touches a parallel heap (drives arena binding).
static NEXT_HEAP_ID: AtomicU64 = AtomicU64::new(0);
static NEXT_THREAD_SLOT: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static THREAD_SLOT: Cell<Option<usize>> = Cell::new(None);
}

/// The calling thread's slot number, assigned on first use and cached in
/// thread-local state for the rest of the thread's lifetime.
fn thread_slot() -> usize {
    THREAD_SLOT.with(|slot| match slot.get() {
        Some(s) => s,
        None => {
            let s = NEXT_THREAD_SLOT.fetch_add(1, Ordering::Relaxed);
            slot.set(Some(s));
            s
        }
    })
}

pub struct ParallelHeap {
    id: u64,
    arenas: Vec<Mutex<Arena>>,
}

impl ParallelHeap {
    /// Build a heap with one arena per hardware context (clamped to
    /// [`MAX_ARENAS`]), each over the default 64 MiB reservation.
    pub fn new() -> io::Result<Self> {
        let n = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_arenas(n, REGION_SIZE)
    }

    /// Build a heap with a caller-chosen arena count and per-arena
    /// reservation size.  The count is clamped to `1..=MAX_ARENAS`.
    pub fn with_arenas(arena_count: usize, region_size: usize) -> io::Result<Self> {
        let count = arena_count.clamp(1, MAX_ARENAS);
        let mut arenas = Vec::with_capacity(count);
        for _ in 0..count {
            arenas.push(Mutex::new(Arena::new(region_size)?));
        }
        log::debug!("parallel heap: {count} arenas of {region_size} bytes");
        Ok(Self {
            id: NEXT_HEAP_ID.fetch_add(1, Ordering::Relaxed),
            arenas,
        })
    }

    pub fn arena_count(&self) -> usize {
        self.arenas.len()
    }

    fn bound_arena(&self) -> &Mutex<Arena> {
        &self.arenas[thread_slot() % self.arenas.len()]
    }

    /// Serve a 16-byte-aligned block of at least `align_up(n)` usable bytes:
    /// thread cache first, then the bound arena.  Null when `n` is zero or
    /// the arena is exhausted.
    pub fn allocate(&self, n: usize) -> *mut u8 {
        if n == 0 {
            return ptr::null_mut();
        }
        let need = match chunk::request_size(n) {
            Some(need) => need,
            None => return ptr::null_mut(),
        };
        if let Some(p) = tcache::with_cache(self.id, |tc| tc.pop(need)) {
            return p.as_ptr();
        }
        match self.bound_arena().lock().unwrap().allocate(n) {
            Some(p) => p.as_ptr(),
            None => ptr::null_mut(),
        }
    }

    /// Return a block obtained from [`allocate`](Self::allocate): into the
    /// thread cache when its size class fits and the bin has room, otherwise
    /// through the bound arena.  Null is a no-op.
    pub fn release(&self, p: *mut u8) {
        let p = match NonNull::new(p) {
            Some(p) => p,
            None => return,
        };
        if tcache::with_cache(self.id, |tc| tc.push(p)) {
            return;
        }
        self.bound_arena().lock().unwrap().release(p);
    }

    /// Push every block cached by the calling thread back through the arena
    /// release path, so quiescent arenas can fully retract their frontiers.
    pub fn flush_thread_cache(&self) {
        let blocks = tcache::with_cache(self.id, |tc| tc.drain());
        if blocks.is_empty() {
            return;
        }
        let mut arena = self.bound_arena().lock().unwrap();
        for p in blocks {
            arena.release(p);
        }
    }

    /// Blocks currently sitting in the calling thread's cache for this heap.
    pub fn thread_cache_len(&self) -> usize {
        tcache::with_cache(self.id, |tc| tc.cached_blocks())
    }

    /// Explored bytes per arena, in registry order.
    pub fn bump_offsets(&self) -> Vec<usize> {
        self.arenas
            .iter()
            .map(|a| a.lock().unwrap().bump_offset())
            .collect()
    }

    /// Walk every arena; see [`Arena::check_consistency`].
    pub fn check_consistency(&self) -> io::Result<()> {
        for arena in &self.arenas {
            arena.lock().unwrap().check_consistency()?;
        }
        Ok(())
    }
}
