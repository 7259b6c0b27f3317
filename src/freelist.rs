//! Free-list maintenance.
//!
//! The free list is an intrusive, address-sorted, doubly linked list
//! threaded through [`BlockHeader::next`]/[`BlockHeader::prev`], rooted at
//! [`crate::heap::Heap::free_head`]. Every operation here assumes the
//! memory mutex (`crate::lock`) is already held; none of them take it
//! themselves.

use crate::block::{self, BlockHeader, MIN_BLOCK};
use crate::error::HeapError;
use crate::heap::{self, Heap};
use std::ptr::{self, NonNull};

/// Scan the free list for the first block whose size is at least `n`.
///
/// On a miss, this grows the heap (`crate::heap::expand`) and links the
/// new region's block into the free list before re-scanning for the fit.
/// Returns `Err` only if expansion itself fails (OS out of memory).
///
/// This is first-fit, not best-fit: the first sufficiently large block
/// wins, regardless of whether a tighter fit exists further down the list.
pub fn find_fit(heap: &mut Heap, n: usize) -> Result<NonNull<BlockHeader>, HeapError> {
    if let Some(block) = scan(heap, n) {
        return Ok(block);
    }

    let expanded = heap::expand(heap, n)?;
    // SAFETY: `expanded` was just created by `heap::expand` and is not yet
    // linked anywhere.
    unsafe { insert(heap, expanded) };

    // `insert` unconditionally coalesces. Repeated anonymous `mmap`s with a
    // null hint often land adjacent to an existing mapping, so the region
    // `expand` just mapped may well be address-adjacent to an existing free
    // block that sorts before it — in which case `coalesce` folds `expanded`
    // into that predecessor (`predecessor.size += expanded.size;
    // predecessor.next = expanded.next`) and leaves `expanded`'s own
    // `size`/`next`/`prev` stale. Trusting the pre-coalesce `expanded`
    // pointer here would hand the caller a block whose header no longer
    // describes a freestanding range and leave the predecessor still
    // claiming bytes that are about to become live. Re-scan the free list
    // instead: expansion grew it by at least `n` contiguous bytes, and
    // coalescing only ever grows a block's reported size, so some block of
    // size >= n is guaranteed to be found, freshly merged or not.
    Ok(scan(heap, n).expect("heap::expand always inserts a block of size >= n"))
}

fn scan(heap: &Heap, n: usize) -> Option<NonNull<BlockHeader>> {
    let mut cursor = heap.free_head;
    while let Some(candidate) = NonNull::new(cursor) {
        // SAFETY: every pointer reachable from `free_head` is a live block
        // header in memory this heap still owns.
        let candidate_ref = unsafe { candidate.as_ref() };
        if candidate_ref.size >= n {
            return Some(candidate);
        }
        cursor = candidate_ref.next;
    }
    None
}

/// Splice a free block into the list at its address-sorted position, then
/// coalesce it with any address-adjacent neighbors.
///
/// The insertion point is always the true address-sorted position,
/// including the tail when every existing block sorts before `block` —
/// there is no special-casing of "nothing smaller" as "insert after
/// head", which would silently misorder the list in that case.
///
/// # Safety
/// `block` must not currently be linked into any free list, and must
/// point at a live block header this heap owns.
pub unsafe fn insert(heap: &mut Heap, block: NonNull<BlockHeader>) {
    let address = block.as_ptr() as usize;

    let mut prev: Option<NonNull<BlockHeader>> = None;
    let mut cursor = heap.free_head;
    while let Some(candidate) = NonNull::new(cursor) {
        if candidate.as_ptr() as usize > address {
            break;
        }
        prev = Some(candidate);
        // SAFETY: see `find_fit`.
        cursor = unsafe { candidate.as_ref().next };
    }
    let successor = cursor; // null means "insert at the tail"

    // SAFETY: `block` is not yet linked (caller's contract), so writing its
    // links is not observed by anyone else yet.
    unsafe {
        let block_mut = &mut *block.as_ptr();
        block_mut.next = successor;
        block_mut.prev = prev.map_or(ptr::null_mut(), |p| p.as_ptr());
    }

    match prev {
        // SAFETY: `p` is a live free-list node.
        Some(mut p) => unsafe { p.as_mut().next = block.as_ptr() },
        None => heap.free_head = block.as_ptr(),
    }
    if let Some(mut successor) = NonNull::new(successor) {
        // SAFETY: `successor` is a live free-list node.
        unsafe { successor.as_mut().prev = block.as_ptr() };
    }

    // SAFETY: `block` and its new neighbors are all live free-list nodes
    // owned by `heap`.
    unsafe { coalesce(heap) };
}

/// Unlink `block` from the free list without coalescing.
///
/// Patches neighbor pointers and updates `free_head` when removing the
/// head; the removed block's `next`/`prev` are cleared to null.
///
/// # Safety
/// `block` must currently be linked into `heap`'s free list.
pub unsafe fn remove(heap: &mut Heap, mut block: NonNull<BlockHeader>) {
    // SAFETY: `block` is linked into the free list (caller's contract), so
    // its `prev`/`next` point at live nodes or are null.
    let (prev, next) = unsafe { (block.as_ref().prev, block.as_ref().next) };

    match NonNull::new(prev) {
        // SAFETY: live free-list node.
        Some(mut p) => unsafe { p.as_mut().next = next },
        None => heap.free_head = next,
    }
    if let Some(mut n) = NonNull::new(next) {
        // SAFETY: live free-list node.
        unsafe { n.as_mut().prev = prev };
    }

    // SAFETY: `block` is a valid, now fully unlinked header.
    unsafe {
        block.as_mut().next = ptr::null_mut();
        block.as_mut().prev = ptr::null_mut();
    }
}

/// Walk the free list from the head, folding every address-adjacent
/// successor into its predecessor.
///
/// Runs in a single forward pass because absorbing a neighbor can only
/// unlock its own successor, never an earlier block. Cross-region
/// coalescing (merging two blocks that happen to be address-adjacent but
/// came from different `mmap` calls) is sound without any per-block
/// bookkeeping because teardown never trusts free-block extents in the
/// first place — it unmaps by walking `crate::heap::Heap::regions`, a
/// registry kept independently of the free list.
///
/// # Safety
/// Every node reachable from `heap.free_head` must be a live, correctly
/// linked free-list node.
pub unsafe fn coalesce(heap: &mut Heap) {
    let mut cursor = heap.free_head;
    while let Some(mut current) = NonNull::new(cursor) {
        loop {
            // SAFETY: `current` is a live free-list node.
            let current_ref = unsafe { current.as_ref() };
            let Some(next) = NonNull::new(current_ref.next) else {
                break;
            };
            let current_end = current.as_ptr() as usize + current_ref.size;
            if current_end != next.as_ptr() as usize {
                break;
            }

            // SAFETY: `next` is a live free-list node, address-adjacent to
            // `current`.
            let next_ref = unsafe { next.as_ref() };
            let merged_size = current_ref.size + next_ref.size;
            let next_next = next_ref.next;

            // SAFETY: `current` is a live, mutable free-list node.
            unsafe {
                current.as_mut().size = merged_size;
                current.as_mut().next = next_next;
            }
            if let Some(mut nn) = NonNull::new(next_next) {
                // SAFETY: live free-list node.
                unsafe { nn.as_mut().prev = current.as_ptr() };
            }
        }
        // SAFETY: `current` is still a live free-list node.
        cursor = unsafe { current.as_ref().next };
    }
}

/// Split `block` into a left block of size `t` (header included) and a
/// right remainder, if both halves would be at least [`MIN_BLOCK`].
///
/// The right half is spliced in between `block` and `block`'s previous
/// next-neighbor, using `block`'s *current* `next` pointer directly
/// rather than a full ordered re-insertion — the address ordering is
/// known by construction (`block < right < block.next`). `block` itself
/// is left in whatever list position it already occupied; only its
/// `size` shrinks to `t`.
///
/// Returns `true` if the split was performed, `false` if `block` was left
/// intact because one of the two halves would be smaller than
/// [`MIN_BLOCK`].
///
/// # Safety
/// `block` must point at a live, linked (or about-to-be-linked) header
/// whose `size` is exactly the block's current total size.
pub unsafe fn split(mut block: NonNull<BlockHeader>, t: usize) -> bool {
    // SAFETY: caller's contract.
    let (size, old_next) = unsafe { (block.as_ref().size, block.as_ref().next) };

    if t < MIN_BLOCK || size - t < MIN_BLOCK {
        return false;
    }

    let right_base = unsafe {
        NonNull::new_unchecked(block.as_ptr().cast::<u8>().add(t))
    };
    let right_size = size - t;
    // SAFETY: `right_base` lies `t` bytes into `block`'s `size >= t +
    // MIN_BLOCK` bytes, so it is writable for `right_size >= MIN_BLOCK`
    // bytes.
    let right = unsafe { block::init_at(right_base, right_size) };

    // SAFETY: `right` was just created; writing its links before anyone
    // else observes it is sound.
    unsafe {
        (*right.as_ptr()).next = old_next;
        (*right.as_ptr()).prev = block.as_ptr();
    }
    if let Some(mut next) = NonNull::new(old_next) {
        // SAFETY: live free-list node.
        unsafe { next.as_mut().prev = right.as_ptr() };
    }
    // SAFETY: `block` is a live header.
    unsafe {
        block.as_mut().next = right.as_ptr();
        block.as_mut().size = t;
    }

    true
}

/// Sum of the `size` of every block currently on the free list.
pub fn total_free(heap: &Heap) -> usize {
    let mut total = 0;
    let mut cursor = heap.free_head;
    while let Some(candidate) = NonNull::new(cursor) {
        // SAFETY: live free-list node.
        let candidate_ref = unsafe { candidate.as_ref() };
        total += candidate_ref.size;
        cursor = candidate_ref.next;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::{HEAP_HEADER_SIZE, REGION_HEADER_SIZE};

    /// Build a `Heap` over a leaked, zeroed buffer with a single free block
    /// spanning it, bypassing `mmap` for fast, deterministic unit tests.
    fn test_heap(len: usize) -> (Box<[u8]>, NonNull<Heap>) {
        let mut buf = vec![0u8; len].into_boxed_slice();
        let base = unsafe { NonNull::new_unchecked(buf.as_mut_ptr()) };

        let heap_ptr = base.cast::<Heap>();
        let region_ptr = unsafe {
            NonNull::new_unchecked(base.as_ptr().add(HEAP_HEADER_SIZE).cast())
        };
        let block_base = unsafe {
            NonNull::new_unchecked(base.as_ptr().add(HEAP_HEADER_SIZE + REGION_HEADER_SIZE))
        };
        let block_size = len - HEAP_HEADER_SIZE - REGION_HEADER_SIZE;

        unsafe {
            ptr::write(
                region_ptr.as_ptr(),
                crate::heap::RegionHeader {
                    base: base.as_ptr(),
                    len,
                    next: ptr::null_mut(),
                },
            );
        }
        let block = unsafe { block::init_at(block_base, block_size) };
        unsafe {
            ptr::write(
                heap_ptr.as_ptr(),
                Heap {
                    size: len,
                    start: base.as_ptr(),
                    free_head: block.as_ptr(),
                    regions: region_ptr.as_ptr(),
                },
            );
        }
        (buf, heap_ptr)
    }

    #[test]
    fn find_fit_locates_the_only_block() {
        let (_buf, mut heap) = test_heap(4096);
        let heap_ref = unsafe { heap.as_mut() };
        let found = find_fit(heap_ref, 32).expect("the sole block is large enough");
        assert_eq!(unsafe { found.as_ref().size }, heap_ref.usable());
    }

    /// Reproduces the scenario where a freshly inserted block is
    /// address-adjacent to an existing free predecessor: `insert`'s
    /// unconditional `coalesce` absorbs it, leaving the block's own header
    /// stale. A caller that trusted the pre-coalesce pointer (rather than
    /// re-scanning, as `find_fit` now does) would hand out memory that a
    /// free block still claims.
    #[test]
    fn insert_into_an_adjacent_predecessor_leaves_a_stale_pointer_behind() {
        let (_buf, mut heap) = test_heap(4096);
        let heap_ref = unsafe { heap.as_mut() };
        let whole = NonNull::new(heap_ref.free_head).unwrap();
        let whole_size = unsafe { whole.as_ref().size };

        // Carve the single free block into two address-adjacent halves,
        // the same shape `heap::expand` produces when a new mapping lands
        // right after an already-free block: `lower` (== `whole`, shrunk
        // to size 64) stays linked; `upper` is unlinked so it can be
        // reinserted "fresh", mimicking `find_fit`'s post-expansion
        // `insert` call.
        assert!(unsafe { split(whole, 64) });
        let upper = NonNull::new(unsafe { whole.as_ref().next }).unwrap();
        let upper_size = unsafe { upper.as_ref().size };
        unsafe { remove(heap_ref, upper) };

        unsafe { insert(heap_ref, upper) };

        // `lower` absorbed `upper`; one block remains, spanning both.
        let only = NonNull::new(heap_ref.free_head).unwrap();
        assert_eq!(only, whole, "the lower-addressed survivor keeps its own header");
        assert_eq!(unsafe { only.as_ref().size }, whole_size);
        assert!(unsafe { only.as_ref().next }.is_null());

        // `upper`'s own header is now stale: coalesce never rewrites the
        // absorbed block, so trusting it directly would see the wrong
        // size (and, post-`remove`, dangling `next`/`prev`).
        assert_eq!(unsafe { upper.as_ref().size }, upper_size);
        assert_ne!(unsafe { upper.as_ref().size }, whole_size);

        // `scan` (what `find_fit` re-runs after `insert`) finds the
        // up-to-date merged block instead.
        let found = scan(heap_ref, upper_size).expect("the merged block satisfies the request");
        assert_eq!(found, only);
    }

    #[test]
    fn split_shrinks_left_and_links_right_between_neighbors() {
        let (_buf, mut heap) = test_heap(4096);
        let heap_ref = unsafe { heap.as_mut() };
        let block = NonNull::new(heap_ref.free_head).unwrap();
        let original_size = unsafe { block.as_ref().size };

        assert!(unsafe { split(block, 64) });
        assert_eq!(unsafe { block.as_ref().size }, 64);

        let right = NonNull::new(unsafe { block.as_ref().next }).unwrap();
        assert_eq!(unsafe { right.as_ref().size }, original_size - 64);
        assert_eq!(unsafe { right.as_ref().prev }, block.as_ptr());
    }

    #[test]
    fn split_refuses_when_remainder_too_small() {
        let (_buf, mut heap) = test_heap(4096);
        let heap_ref = unsafe { heap.as_mut() };
        let block = NonNull::new(heap_ref.free_head).unwrap();
        let original_size = unsafe { block.as_ref().size };

        assert!(!unsafe { split(block, original_size - 1) });
        assert_eq!(unsafe { block.as_ref().size }, original_size);
    }

    #[test]
    fn insert_sorts_by_address_and_coalesces() {
        let (_buf, mut heap) = test_heap(4096);
        let heap_ref = unsafe { heap.as_mut() };
        let whole = NonNull::new(heap_ref.free_head).unwrap();
        let whole_size = unsafe { whole.as_ref().size };

        assert!(unsafe { split(whole, 64) });
        let right = NonNull::new(unsafe { whole.as_ref().next } ).unwrap();
        let right_size = unsafe { right.as_ref().size };

        // remove both, then reinsert in reverse order: coalescing must
        // still produce a single block of the original size.
        unsafe {
            remove(heap_ref, whole);
            remove(heap_ref, right);
            insert(heap_ref, right);
            insert(heap_ref, whole);
        }

        let only = NonNull::new(heap_ref.free_head).unwrap();
        assert_eq!(unsafe { only.as_ref().size }, whole_size);
        assert!(unsafe { only.as_ref().next }.is_null());
        let _ = right_size;
    }

    #[test]
    fn remove_clears_links_and_updates_head() {
        let (_buf, mut heap) = test_heap(4096);
        let heap_ref = unsafe { heap.as_mut() };
        let block = NonNull::new(heap_ref.free_head).unwrap();

        unsafe { remove(heap_ref, block) };
        assert!(heap_ref.free_head.is_null());
        assert!(unsafe { block.as_ref().next }.is_null());
        assert!(unsafe { block.as_ref().prev }.is_null());
    }

    #[test]
    fn total_free_sums_every_block() {
        let (_buf, mut heap) = test_heap(4096);
        let heap_ref = unsafe { heap.as_mut() };
        let whole = NonNull::new(heap_ref.free_head).unwrap();
        let whole_size = unsafe { whole.as_ref().size };

        assert!(unsafe { split(whole, 64) });
        assert_eq!(total_free(heap_ref), whole_size);
    }
}
