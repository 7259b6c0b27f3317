//! Heap state and lifecycle.
//!
//! This module owns the process-wide [`Heap`] descriptor and the two
//! operations that grow the address space it manages: [`init`] (first use)
//! and [`expand`] (no free block large enough). [`teardown`] is the
//! matching shrink-to-nothing operation, invoked once [`crate::freelist`]
//! reports every byte free.
//!
//! The heap descriptor itself always lives at offset 0 of the first region
//! it ever mapped; every other region it owns is tracked via the linked
//! list of [`RegionHeader`]s, which exists so [`teardown`] can unmap whole
//! regions rather than trusting free-block extents that coalescing may
//! have merged across region boundaries.

use crate::block::{self, BlockHeader, MIN_BLOCK};
use crate::debug::trace;
use crate::error::HeapError;
use crate::region;
use std::mem;
use std::ptr::NonNull;

/// Bytes mapped for the heap's first region on first use.
pub const INIT_SIZE: usize = 16 * 1024 * 1024;

/// A node in the heap's region registry.
///
/// One of these precedes every block-bearing range of mapped memory,
/// including the heap's first region (where it sits right after the
/// [`Heap`] descriptor). It is never itself exposed as allocatable memory.
#[repr(C)]
pub struct RegionHeader {
    /// The address `mmap` returned for this region — the value `munmap`
    /// must be called with, not necessarily this header's own address
    /// (for the first region, the mapping base is the [`Heap`] descriptor,
    /// which precedes this header).
    pub base: *mut u8,
    /// Total bytes mapped for this region (the value passed to `munmap`).
    pub len: usize,
    /// Next region in the registry, or null.
    pub next: *mut RegionHeader,
}

/// Size of [`RegionHeader`].
pub const REGION_HEADER_SIZE: usize = mem::size_of::<RegionHeader>();

/// The process-wide heap descriptor.
///
/// Exactly one instance exists at a time, guarded by [`crate::lock`]; it
/// lives inside the memory it describes.
#[repr(C)]
pub struct Heap {
    /// Sum of the `len` of every region currently mapped for this heap,
    /// this descriptor's own region included.
    pub size: usize,
    /// Self-pointer to this descriptor (== the base of region 0).
    pub start: *mut u8,
    /// Head of the address-sorted free list, or null if nothing is free.
    pub free_head: *mut BlockHeader,
    /// Head of the region registry (see [`RegionHeader`]).
    pub regions: *mut RegionHeader,
}

/// Size of the [`Heap`] descriptor.
pub const HEAP_HEADER_SIZE: usize = mem::size_of::<Heap>();

impl Heap {
    /// Total header overhead currently reserved across every region: the
    /// heap descriptor itself plus one [`RegionHeader`] per mapped region.
    ///
    /// `sum(free) + sum(live)` must always equal `heap.size -
    /// overhead()`: every region (not only the first) reserves a small
    /// header for the region registry, so the header overhead is the sum
    /// across all of them, not a single fixed constant.
    pub fn overhead(&self) -> usize {
        let mut total = HEAP_HEADER_SIZE;
        let mut region = self.regions;
        while let Some(r) = NonNull::new(region) {
            // SAFETY: the region registry only ever contains pointers this
            // module wrote, into memory it mapped and has not yet unmapped.
            let r = unsafe { r.as_ref() };
            total += REGION_HEADER_SIZE;
            region = r.next;
        }
        total
    }

    /// Bytes usable for blocks: `size - overhead()`.
    pub fn usable(&self) -> usize {
        self.size - self.overhead()
    }
}

/// Map the heap's first region and place the descriptor, the region-0
/// header, and the single initial block inside it.
///
/// Returns a pointer to the freshly created [`Heap`], or
/// [`HeapError::MapFailed`] if the underlying `mmap` failed, leaving
/// nothing initialized.
pub fn init() -> Result<NonNull<Heap>, HeapError> {
    let len = INIT_SIZE;
    let base = region::map(len).ok_or(HeapError::MapFailed)?;

    let heap_ptr = base.cast::<Heap>();
    let region_ptr = unsafe { NonNull::new_unchecked(base.as_ptr().add(HEAP_HEADER_SIZE).cast::<RegionHeader>()) };
    let block_base = unsafe {
        NonNull::new_unchecked(
            base.as_ptr()
                .add(HEAP_HEADER_SIZE + REGION_HEADER_SIZE)
                .cast::<u8>(),
        )
    };
    let block_size = len - HEAP_HEADER_SIZE - REGION_HEADER_SIZE;

    // SAFETY: `region_ptr` is writable for `REGION_HEADER_SIZE` bytes — it
    // is `HEAP_HEADER_SIZE` bytes into a freshly mapped region of `len >=
    // HEAP_HEADER_SIZE + REGION_HEADER_SIZE + MIN_BLOCK` bytes (`INIT_SIZE`
    // is far larger than any of this crate's headers).
    unsafe {
        std::ptr::write(
            region_ptr.as_ptr(),
            RegionHeader {
                base: base.as_ptr(),
                len,
                next: std::ptr::null_mut(),
            },
        );
    }

    // SAFETY: `block_base` is writable for `block_size >= MIN_BLOCK` bytes
    // by the same reasoning.
    let block = unsafe { block::init_at(block_base, block_size) };

    // SAFETY: `heap_ptr` is the mapping base, writable for `HEAP_HEADER_SIZE`
    // bytes.
    unsafe {
        std::ptr::write(
            heap_ptr.as_ptr(),
            Heap {
                size: len,
                start: base.as_ptr(),
                free_head: block.as_ptr(),
                regions: region_ptr.as_ptr(),
            },
        );
    }

    Ok(heap_ptr)
}

/// Map a new region of `max(n, INIT_SIZE)` bytes (header included),
/// register it, and return the single free block it contains.
///
/// The caller is responsible for linking the returned block into the free
/// list — this function only grows the address space and the region
/// registry. Returns [`HeapError::SizeOverflow`] if `max(n, INIT_SIZE) +
/// REGION_HEADER_SIZE` would overflow `usize` (before any syscall is
/// attempted), or [`HeapError::MapFailed`] on OS-level failure; either way
/// the heap's existing state is left untouched.
pub fn expand(heap: &mut Heap, n: usize) -> Result<NonNull<BlockHeader>, HeapError> {
    let len = n.max(INIT_SIZE).checked_add(REGION_HEADER_SIZE).ok_or_else(|| {
        trace!("heap::expand({n}): max(n, INIT_SIZE) + REGION_HEADER_SIZE overflows usize");
        HeapError::SizeOverflow
    })?;
    let base = region::map(len).ok_or_else(|| {
        trace!("heap::expand({n}): mmap of {len} bytes failed");
        HeapError::MapFailed
    })?;

    let region_ptr = base.cast::<RegionHeader>();
    let block_base = unsafe {
        NonNull::new_unchecked(base.as_ptr().add(REGION_HEADER_SIZE))
    };
    let block_size = len - REGION_HEADER_SIZE;

    // SAFETY: `region_ptr` is the mapping base, writable for
    // `REGION_HEADER_SIZE` bytes.
    unsafe {
        std::ptr::write(
            region_ptr.as_ptr(),
            RegionHeader {
                base: base.as_ptr(),
                len,
                next: heap.regions,
            },
        );
    }
    heap.regions = region_ptr.as_ptr();
    heap.size += len;

    // SAFETY: `block_base` is writable for `block_size >= MIN_BLOCK` bytes:
    // `len` is at least `n + REGION_HEADER_SIZE`, and `n` already accounts
    // for a block header (the caller's contract), or `len` is at least
    // `INIT_SIZE + REGION_HEADER_SIZE` otherwise.
    debug_assert!(block_size >= MIN_BLOCK);
    let block = unsafe { block::init_at(block_base, block_size) };
    Ok(block)
}

/// Unmap every region this heap owns.
///
/// Walks the region registry and unmaps by region rather than by
/// individual free block: the heap descriptor's own region (which
/// contains `heap` itself) is unmapped last, since reading `heap.regions`
/// requires the descriptor to still be mapped.
///
/// # Safety
/// `heap` must be the sole, fully assembled process-wide heap, with every
/// block in it currently free (callers must have already verified this —
/// this function does not check).
pub unsafe fn teardown(heap: NonNull<Heap>) {
    // SAFETY: caller guarantees `heap` points at a live, fully-free heap.
    let heap_ref = unsafe { heap.as_ref() };
    let own_base = heap_ref.start;
    let own_len = {
        // the region registry's *last* node is region 0, since `expand`
        // always pushes new regions to the front; walk to find it (and
        // unmap every other region along the way).
        let mut region = heap_ref.regions;
        let mut own_len = None;
        loop {
            let Some(r) = NonNull::new(region) else {
                break;
            };
            // SAFETY: still-mapped registry entry.
            let r_ref = unsafe { r.as_ref() };
            let next = r_ref.next;
            if r_ref.base == own_base {
                own_len = Some(r_ref.len);
            } else {
                let base = unsafe { NonNull::new_unchecked(r_ref.base) };
                region::unmap(base, r_ref.len);
            }
            region = next;
        }
        own_len.ok_or(HeapError::RegionNotFound)
    };

    // An internal consistency failure, never expected in practice: the
    // registry is populated by `init`/`expand` alongside `heap.start` and
    // nothing else mutates it. If it somehow happened, `spec.md` §7's
    // policy for internal teardown failures applies — ignore it and still
    // clear the descriptor so the next allocation can reinitialize; any
    // leaked region is silent, the same as an unmap failure would be.
    let own_len = own_len.unwrap_or_else(|err| {
        trace!("heap::teardown: {err:?}, falling back to heap.size as the unmap length");
        heap_ref.size
    });

    let base = unsafe { NonNull::new_unchecked(own_base) };
    region::unmap(base, own_len);
}
