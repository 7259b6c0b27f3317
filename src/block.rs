//! Block header model.
//!
//! A block is a contiguous byte range: a fixed-size [`BlockHeader`] followed
//! by a data payload. This module only knows the shape of that header and
//! how to convert between a header pointer and the user-visible data
//! pointer; it has no opinion on free-list order, splitting, or where the
//! memory came from — that's [`crate::freelist`] and [`crate::heap`].

use std::mem;
use std::ptr::{self, NonNull};

/// The header every block begins with.
///
/// `next`/`prev` are only meaningful while the block is linked into the
/// free list; a live block's `next`/`prev` are never inspected. A block
/// carries no record of which region it was carved from — teardown
/// unmaps by walking [`crate::heap::Heap::regions`], a registry kept
/// independently of the free list, so no per-block tag is needed.
#[repr(C)]
pub struct BlockHeader {
    /// Total bytes of the block, header included.
    pub size: usize,
    /// Self-pointer to the first byte after this header. Redundant with
    /// `header_ptr + HEADER_SIZE`, but it turns the user-pointer <->
    /// header-pointer conversion into a single dereference instead of a
    /// pointer-arithmetic call site at every use.
    pub data: *mut u8,
    /// Free-list successor. Null when not linked (including: while live).
    pub next: *mut BlockHeader,
    /// Free-list predecessor. Null when not linked (including: while live).
    pub prev: *mut BlockHeader,
}

/// Size of [`BlockHeader`], i.e. the number of bytes every block spends on
/// bookkeeping before its payload starts.
pub const HEADER_SIZE: usize = mem::size_of::<BlockHeader>();

/// The smallest block that can usefully exist: a header plus one payload
/// byte. No block may ever be smaller than this.
pub const MIN_BLOCK: usize = HEADER_SIZE + 1;

/// Write a fresh [`BlockHeader`] at `base`, covering `size` total bytes
/// (header included), and return a pointer to it.
///
/// # Safety
/// `base` must be valid for writes of at least `size` bytes, and `size`
/// must be at least [`HEADER_SIZE`].
pub unsafe fn init_at(base: NonNull<u8>, size: usize) -> NonNull<BlockHeader> {
    debug_assert!(size >= HEADER_SIZE);

    let header = base.cast::<BlockHeader>();
    // SAFETY: `base` is writable for `size >= HEADER_SIZE` bytes per the
    // caller's contract.
    unsafe {
        ptr::write(
            header.as_ptr(),
            BlockHeader {
                size,
                data: data_ptr(header),
                next: ptr::null_mut(),
                prev: ptr::null_mut(),
            },
        );
    }
    header
}

/// The payload pointer for a block header at `header`.
pub fn data_ptr(header: NonNull<BlockHeader>) -> *mut u8 {
    // SAFETY: offsetting by a fixed, in-bounds-for-the-allocation amount;
    // the caller-side invariant that `header` points to a real block of at
    // least `HEADER_SIZE` bytes makes this pointer (not a dereference)
    // well-defined.
    unsafe { header.as_ptr().cast::<u8>().add(HEADER_SIZE) }
}

/// Convert a user-visible payload pointer back to its owning header.
///
/// # Safety
/// `data` must be a pointer previously returned as the payload of a block
/// created by [`init_at`] (directly, i.e. not an interior pointer).
pub unsafe fn header_of(data: NonNull<u8>) -> NonNull<BlockHeader> {
    // SAFETY: the caller guarantees `data` is `block_base + HEADER_SIZE`
    // for some live block; subtracting `HEADER_SIZE` recovers `block_base`.
    unsafe { NonNull::new_unchecked(data.as_ptr().sub(HEADER_SIZE).cast()) }
}

/// The payload capacity of a block, i.e. `size - HEADER_SIZE`.
pub fn payload_size(header: &BlockHeader) -> usize {
    header.size - HEADER_SIZE
}
