// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Bit-exact checks of the chunk header/footer encoding and the pointer
// walks built on top of it.  Chunks are fabricated inside an aligned
// buffer, headers one word before a 16-byte boundary, exactly as an arena
// lays them out.

use parmalloc::chunk::{
    align_up, request_size, Chunk, CHUNK_ALIGN, FREE_BIT, HEADER_SIZE, MIN_CHUNK_SIZE,
    PREV_IN_USE_BIT, SIZE_MASK,
};

#[repr(align(16))]
struct AlignedBuf([u8; 512]);

fn fresh_buf() -> Box<AlignedBuf> {
    Box::new(AlignedBuf([0u8; 512]))
}

/// Header slot for the first chunk: one word before the first 16-byte
/// boundary past the buffer start.
fn first_header(buf: &mut AlignedBuf) -> *mut u8 {
    unsafe { buf.0.as_mut_ptr().add(CHUNK_ALIGN - HEADER_SIZE) }
}

#[test]
fn header_word_packs_size_and_flags() {
    let mut buf = fresh_buf();
    let ch = Chunk::at(first_header(&mut buf));

    ch.init_header(48, false, true);
    let word = ch.header_word();
    assert_eq!(word & SIZE_MASK, 48);
    assert_eq!(word & FREE_BIT, 0);
    assert_ne!(word & PREV_IN_USE_BIT, 0);
    // bits 2-3 reserved zero
    assert_eq!(word & 0b1100, 0);

    ch.init_header(64, true, false);
    let word = ch.header_word();
    assert_eq!(word & SIZE_MASK, 64);
    assert_ne!(word & FREE_BIT, 0);
    assert_eq!(word & PREV_IN_USE_BIT, 0);

    assert_eq!(ch.size(), 64);
    assert!(ch.is_free());
    assert!(!ch.prev_in_use());
}

#[test]
fn write_header_preserves_prev_in_use() {
    let mut buf = fresh_buf();
    let ch = Chunk::at(first_header(&mut buf));

    ch.init_header(32, false, true);
    ch.write_header(48, true);
    assert_eq!(ch.size(), 48);
    assert!(ch.is_free());
    assert!(ch.prev_in_use());

    ch.set_prev_in_use(false);
    assert!(!ch.prev_in_use());
    assert_eq!(ch.size(), 48);
    assert!(ch.is_free());

    ch.set_prev_in_use(true);
    assert!(ch.prev_in_use());
}

#[test]
fn payload_sits_one_word_in_and_is_aligned() {
    let mut buf = fresh_buf();
    let hdr = first_header(&mut buf);
    let ch = Chunk::at(hdr);

    assert_eq!(ch.payload() as usize, hdr as usize + HEADER_SIZE);
    assert_eq!(ch.payload() as usize % CHUNK_ALIGN, 0);
    assert_eq!(Chunk::from_payload(ch.payload()), ch);
}

#[test]
fn footer_mirrors_header() {
    let mut buf = fresh_buf();
    let hdr = first_header(&mut buf);
    let ch = Chunk::at(hdr);

    ch.init_header(96, true, true);
    ch.write_footer();

    let footer = unsafe { *(hdr.add(96 - HEADER_SIZE) as *const usize) };
    assert_eq!(footer, ch.header_word());
}

#[test]
fn next_below_respects_the_frontier() {
    let mut buf = fresh_buf();
    let hdr = first_header(&mut buf);
    let a = Chunk::at(hdr);
    a.init_header(64, false, true);
    let b = Chunk::at(unsafe { hdr.add(64) });
    b.init_header(32, false, false);

    let bump = unsafe { hdr.add(96) };
    assert_eq!(a.next_below(bump), Some(b));
    assert_eq!(b.next_below(bump), None);

    // With the frontier right after `a`, it has no successor either.
    let bump = unsafe { hdr.add(64) };
    assert_eq!(a.next_below(bump), None);
}

#[test]
fn prev_if_free_walks_through_the_footer() {
    let mut buf = fresh_buf();
    let hdr = first_header(&mut buf);

    let a = Chunk::at(hdr);
    a.init_header(64, true, true);
    a.write_footer();
    let b = Chunk::at(unsafe { hdr.add(64) });
    b.init_header(32, false, false);

    assert_eq!(b.prev_if_free(), Some(a));

    // An in-use left neighbour leaves no footer to follow.
    a.init_header(64, false, true);
    a.write_footer();
    assert_eq!(b.prev_if_free(), None);
}

#[test]
fn intrusive_links_occupy_the_first_two_payload_words() {
    let mut buf = fresh_buf();
    let hdr = first_header(&mut buf);
    let ch = Chunk::at(hdr);
    ch.init_header(64, true, true);

    let fd = 0x1000 as *mut u8;
    let bk = 0x2000 as *mut u8;
    ch.set_link_fd(fd);
    ch.set_link_bk(bk);

    let payload = ch.payload();
    let raw_fd = unsafe { *(payload as *const usize) };
    let raw_bk = unsafe { *(payload.add(HEADER_SIZE) as *const usize) };
    assert_eq!(raw_fd, fd as usize);
    assert_eq!(raw_bk, bk as usize);
    assert_eq!(ch.link_fd(), fd);
    assert_eq!(ch.link_bk(), bk);
}

#[test]
fn request_size_rounds_payload_then_adds_header() {
    assert_eq!(request_size(1), Some(32));
    assert_eq!(request_size(16), Some(32));
    assert_eq!(request_size(17), Some(48));
    assert_eq!(request_size(64), Some(80));
    assert_eq!(request_size(1024), Some(1040));
    assert_eq!(request_size(usize::MAX), None);
}

#[test]
fn minimum_chunk_holds_header_links_and_footer() {
    assert_eq!(MIN_CHUNK_SIZE % CHUNK_ALIGN, 0);
    assert!(MIN_CHUNK_SIZE >= HEADER_SIZE + 2 * HEADER_SIZE + HEADER_SIZE);
    // 64-bit target: 8 + 16 + 8 rounded up.
    assert_eq!(MIN_CHUNK_SIZE, 32);
}

#[test]
fn align_up_is_a_16_byte_ceiling() {
    assert_eq!(align_up(0), 0);
    assert_eq!(align_up(1), 16);
    assert_eq!(align_up(16), 16);
    assert_eq!(align_up(17), 32);
    assert_eq!(align_up(1000), 1008);
}
