// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// A single allocation arena: one contiguous virtual reservation, a bump
// frontier separating the chunk-partitioned region from raw unexplored
// bytes, and a first-fit free list.
//
// Layout of the reservation:
//
//   [ 8 pad bytes ][ chunk | chunk | ... | chunk ][ unexplored ... ]
//   ^ map base     ^ base                         ^ bump           ^ end
//
// The first header sits one word before a 16-byte boundary so every payload
// lands on a 16-byte boundary; chunk sizes are multiples of 16, so every
// subsequent header does too.
//
// Frontier invariant: the chunk immediately below `bump`, if any, is in use.
// Carves are born in use, and a release that would leave a free chunk
// touching the frontier retracts the frontier into it instead of linking it.

use std::io;
use std::ptr::NonNull;

use crate::chunk::{self, Chunk, CHUNK_ALIGN, HEADER_SIZE, MIN_CHUNK_SIZE};
use crate::free_list::FreeList;
use crate::platform::PlatformMap;

pub struct Arena {
    map: PlatformMap,
    base: *mut u8,
    bump: *mut u8,
    end: *mut u8,
    free: FreeList,
}

// Safety: the arena exclusively owns its reservation; it is handed between
// threads only behind a mutex.
unsafe impl Send for Arena {}

impl Arena {
    /// Reserve a fresh arena of (at least) `region_size` bytes.
    pub fn new(region_size: usize) -> io::Result<Self> {
        let map = PlatformMap::reserve(region_size)?;
        let mem = map.as_mut_ptr();
        let base = mem.wrapping_add(CHUNK_ALIGN - HEADER_SIZE);
        let end = mem.wrapping_add(map.mapped_size());
        log::debug!(
            "arena reserved: {} bytes at {:p}",
            map.mapped_size(),
            mem
        );
        Ok(Self {
            map,
            base,
            bump: base,
            end,
            free: FreeList::new(),
        })
    }

    /// Serve a block of at least `align_up(n)` usable bytes, `n >= 1`.
    /// Returns `None` when neither the free list nor the remaining frontier
    /// can hold the request.
    pub fn allocate(&mut self, n: usize) -> Option<NonNull<u8>> {
        let need = chunk::request_size(n)?;

        if let Some(ch) = self.free.first_fit(need) {
            self.free.unlink(ch);
            self.place(ch, need);
            return NonNull::new(ch.payload());
        }

        self.carve_from_top(need)
    }

    /// Mark a free-list hit in use, splitting off the tail when the
    /// remainder is big enough to stand as a chunk of its own.
    fn place(&mut self, ch: Chunk, need: usize) {
        let total = ch.size();

        // A chunk that was freed into this arena's list by a cross-bound
        // thread lies in another arena's reservation.  Its neighbours are
        // not ours to touch, so it is handed out whole.
        if !self.contains(ch.addr()) {
            ch.write_header(total, false);
            return;
        }

        if total >= need + MIN_CHUNK_SIZE {
            let rem = Chunk::at(ch.addr().wrapping_add(need));
            rem.init_header(total - need, true, true);
            rem.write_footer();
            self.free.push_front(rem);
            ch.write_header(need, false);
        } else {
            ch.write_header(total, false);
            if let Some(next) = ch.next_below(self.bump) {
                next.set_prev_in_use(true);
            }
        }
    }

    /// Carve a fresh chunk at the bump frontier.
    fn carve_from_top(&mut self, need: usize) -> Option<NonNull<u8>> {
        let avail = self.end as usize - self.bump as usize;
        if need > avail {
            return None;
        }
        let ch = Chunk::at(self.bump);
        self.bump = self.bump.wrapping_add(need);
        // The chunk left of the frontier is always in use, so PREV_IN_USE
        // can be set without looking at it.
        ch.init_header(need, false, true);
        NonNull::new(ch.payload())
    }

    /// Return a block to the arena: coalesce with free neighbours, then
    /// either retract the frontier or link the result.
    pub fn release(&mut self, payload: NonNull<u8>) {
        let mut ch = Chunk::from_payload(payload.as_ptr());
        ch.write_header(ch.size(), true);
        ch.write_footer();

        // Cross-bound free: the block lives in another arena's reservation,
        // so neighbour inspection and the frontier check do not apply.  It
        // joins this arena's list uncoalesced.
        if !self.contains(ch.addr()) {
            self.free.push_front(ch);
            return;
        }

        if let Some(next) = ch.next_below(self.bump) {
            if next.is_free() {
                self.free.unlink(next);
                ch.write_header(ch.size() + next.size(), true);
                ch.write_footer();
            }
        }

        if !ch.prev_in_use() {
            if let Some(prev) = ch.prev_if_free() {
                self.free.unlink(prev);
                prev.write_header(prev.size() + ch.size(), true);
                prev.write_footer();
                ch = prev;
            }
        }

        // Frontier retraction.  The early return matters: once the frontier
        // moves down there is no successor left to update.
        let chunk_end = ch.addr().wrapping_add(ch.size());
        if chunk_end == self.bump {
            self.bump = ch.addr();
            return;
        }

        if let Some(next) = ch.next_below(self.bump) {
            next.set_prev_in_use(false);
        }
        self.free.push_front(ch);
    }

    /// Whether `addr` lies inside this arena's reservation.
    pub fn contains(&self, addr: *mut u8) -> bool {
        let a = addr as usize;
        a >= self.map.as_mut_ptr() as usize && a < self.end as usize
    }

    /// Bytes currently explored: `bump - base`.  Zero at quiescence.
    pub fn bump_offset(&self) -> usize {
        self.bump as usize - self.base as usize
    }

    /// Bytes servable by this arena in total: `end - base`.
    pub fn capacity(&self) -> usize {
        self.end as usize - self.base as usize
    }

    /// Number of chunks on the free list.
    pub fn free_list_len(&self) -> usize {
        self.free.len()
    }

    /// Walk the explored region and cross-check it against the free list.
    ///
    /// Verifies the partition (chunk sizes sum exactly to the bump), the
    /// per-chunk size constraints, header/footer mirroring, the
    /// PREV_IN_USE/FREE agreement between neighbours, the no-adjacent-frees
    /// rule, the frontier invariant, and free-list set equality.  Only valid
    /// for arenas that have seen no cross-bound frees.
    pub fn check_consistency(&self) -> io::Result<()> {
        fn corrupt(msg: String) -> io::Error {
            io::Error::new(io::ErrorKind::InvalidData, msg)
        }

        let mut free_below = 0usize;
        let mut prev_free: Option<bool> = None;
        let mut cursor = self.base;

        while (cursor as usize) < (self.bump as usize) {
            let ch = Chunk::at(cursor);
            let size = ch.size();
            if size < MIN_CHUNK_SIZE || size % CHUNK_ALIGN != 0 {
                return Err(corrupt(format!("bad chunk size {size} at {cursor:p}")));
            }
            match prev_free {
                None => {
                    if !ch.prev_in_use() {
                        return Err(corrupt(format!(
                            "first chunk at {cursor:p} claims a free predecessor"
                        )));
                    }
                }
                Some(pf) => {
                    if ch.prev_in_use() != !pf {
                        return Err(corrupt(format!(
                            "PREV_IN_USE disagrees with left neighbour at {cursor:p}"
                        )));
                    }
                    if pf && ch.is_free() {
                        return Err(corrupt(format!("adjacent free chunks at {cursor:p}")));
                    }
                }
            }
            if ch.is_free() {
                let footer =
                    unsafe { *(cursor.add(size - HEADER_SIZE) as *const usize) };
                if footer != ch.header_word() {
                    return Err(corrupt(format!(
                        "footer does not mirror header at {cursor:p}"
                    )));
                }
                if cursor.wrapping_add(size) == self.bump {
                    return Err(corrupt(format!(
                        "free chunk at {cursor:p} touches the frontier"
                    )));
                }
                if !self.free.contains(ch) {
                    return Err(corrupt(format!(
                        "free chunk at {cursor:p} missing from the free list"
                    )));
                }
                free_below += 1;
            }
            prev_free = Some(ch.is_free());
            cursor = cursor.wrapping_add(size);
        }

        if cursor != self.bump {
            return Err(corrupt(format!(
                "chunk sizes sum to {:p}, bump is {:p}",
                cursor, self.bump
            )));
        }

        let mut listed = 0usize;
        for ch in self.free.iter() {
            if !ch.is_free() {
                return Err(corrupt(format!(
                    "in-use chunk at {:p} on the free list",
                    ch.addr()
                )));
            }
            if !self.contains(ch.addr()) {
                return Err(corrupt(format!(
                    "foreign chunk at {:p} on the free list",
                    ch.addr()
                )));
            }
            listed += 1;
        }
        if listed != free_below {
            return Err(corrupt(format!(
                "free list holds {listed} chunks, walk found {free_below}"
            )));
        }

        Ok(())
    }
}
