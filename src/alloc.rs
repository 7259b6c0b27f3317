//! Allocation front-end.
//!
//! The four public operations, built from the components below them:
//! [`allocate`], [`zero_allocate`], [`reallocate`], [`release`]. Each one
//! takes the memory mutex at the boundary and releases it on every exit
//! path; none of them call [`crate::debug::trace`] while still holding
//! it, to avoid a lock-order inversion against the trace mutex.

use crate::block::{self, HEADER_SIZE};
use crate::debug::trace;
use crate::freelist;
use crate::heap;
use crate::lock::{self, HeapHandle};
use crate::{arith, fill};
use std::ptr::{self, NonNull};

/// Allocate `n` bytes. Returns a pointer to at least `n` writable bytes,
/// or null.
///
/// Fails with null if `n == 0`. Otherwise: ensure the heap is
/// initialized, compute `req = n + header_size`, find a fitting block
/// (failing with null if none can be found or created), split it if it's
/// larger than `req` needs, remove it from the free list, and return a
/// pointer to its payload.
pub fn allocate(n: usize) -> *mut u8 {
    if n == 0 {
        return ptr::null_mut();
    }
    let Some(req) = n.checked_add(HEADER_SIZE) else {
        trace!("allocate({n}): request overflows usize once the header is added");
        return ptr::null_mut();
    };

    let mut guard = lock::lock();
    let handle = match *guard {
        Some(handle) => handle,
        None => match heap::init() {
            Ok(heap_ptr) => {
                let handle = HeapHandle(heap_ptr);
                *guard = Some(handle);
                handle
            }
            Err(err) => {
                drop(guard);
                trace!("allocate({n}): heap initialization failed ({err:?})");
                return ptr::null_mut();
            }
        },
    };

    // SAFETY: `handle` was just produced by `heap::init` or was already
    // installed by a previous call; in both cases it points at a live
    // heap descriptor, and we hold the only lock that permits mutation.
    let heap_ref = unsafe { &mut *handle.0.as_ptr() };

    let chosen = match freelist::find_fit(heap_ref, req) {
        Ok(chosen) => chosen,
        Err(err) => {
            drop(guard);
            trace!("allocate({n}): out of memory ({err:?})");
            return ptr::null_mut();
        }
    };

    // SAFETY: `chosen` is a live block this heap owns.
    let chosen_size = unsafe { chosen.as_ref().size };
    if req < chosen_size {
        // SAFETY: `chosen` is linked into the free list with a known
        // `size`; splitting it in place is the documented operation.
        unsafe { freelist::split(chosen, req) };
    }
    // SAFETY: `chosen` is currently linked into `heap_ref`'s free list.
    unsafe { freelist::remove(heap_ref, chosen) };

    let data = block::data_ptr(chosen);
    drop(guard);
    trace!("allocate({n}) -> {data:p}");
    data
}

/// Allocate `count * size` zeroed bytes. Returns null on a zero factor,
/// on overflow, or on allocation failure.
pub fn zero_allocate(count: usize, size: usize) -> *mut u8 {
    let total = arith::checked_product(count, size);
    if total == 0 {
        trace!("zero_allocate({count}, {size}): refused (zero factor or overflow)");
        return ptr::null_mut();
    }

    let ptr = allocate(total);
    if !ptr.is_null() {
        // SAFETY: `allocate` just returned a pointer valid for `total`
        // writable bytes.
        unsafe { fill::byte_fill(ptr, 0, total) };
    }
    ptr
}

/// Resize (in place or by moving) the allocation at `p` to `n` bytes.
///
/// - `n == 0 && p != null` -> `release(p)`; return null.
/// - `p == null` -> return `allocate(n)`.
/// - otherwise: allocate `n`; on failure return null (old block remains
///   live); copy `min(n, old_payload)` bytes; release `p`; return the new
///   pointer.
///
/// The copy length uses the *payload* size of the old block, not its
/// total size — using the total size would overread the old block by one
/// header's worth of bytes.
pub fn reallocate(p: *mut u8, n: usize) -> *mut u8 {
    if n == 0 {
        if !p.is_null() {
            release(p);
        }
        return ptr::null_mut();
    }
    let Some(old_data) = NonNull::new(p) else {
        return allocate(n);
    };

    let new_ptr = allocate(n);
    if new_ptr.is_null() {
        trace!("reallocate({p:p}, {n}): allocation failed, old block kept live");
        return ptr::null_mut();
    }

    // SAFETY: `old_data` is a live payload pointer this allocator
    // previously handed out (caller's contract: passing any other pointer
    // is undefined behavior this allocator does not detect).
    let old_header = unsafe { block::header_of(old_data) };
    // SAFETY: `old_header` is a live header.
    let old_payload = block::payload_size(unsafe { old_header.as_ref() });
    let copy_len = n.min(old_payload);

    // SAFETY: `new_ptr` is writable for `n >= copy_len` bytes; `old_data`
    // is readable for `old_payload >= copy_len` bytes; the two ranges
    // cannot overlap since `new_ptr` was freshly allocated before `p` is
    // released.
    unsafe { fill::byte_copy(new_ptr, old_data.as_ptr(), copy_len) };

    release(p);
    trace!("reallocate({p:p}, {n}) -> {new_ptr:p}");
    new_ptr
}

/// Release the allocation at `p` back to the free list, coalescing with
/// neighbors, and tearing the heap down if it is now entirely free.
///
/// A null `p` is a no-op. Otherwise `p` is converted back to its header,
/// inserted into the free list (which also coalesces), and the total free
/// byte count is compared against the heap's usable capacity; if they
/// match, every region is torn down and the heap reverts to
/// uninitialized.
pub fn release(p: *mut u8) {
    let Some(data) = NonNull::new(p) else {
        return;
    };

    let mut guard = lock::lock();
    let Some(handle) = *guard else {
        // Releasing into a heap that doesn't exist is an invalid release:
        // undefined behavior the allocator does not detect or recover
        // from. Trace it and return rather than dereference a header that
        // was never created.
        drop(guard);
        trace!("release({p:p}): no heap is initialized (invalid release)");
        return;
    };

    // SAFETY: `handle` points at a live heap descriptor, and we hold the
    // only lock permitting mutation.
    let heap_ref = unsafe { &mut *handle.0.as_ptr() };
    // SAFETY: caller's contract — `data` was previously handed out by this
    // allocator and has not already been released.
    let header = unsafe { block::header_of(data) };
    // SAFETY: `header` is not currently linked into any free list — it
    // was live (the caller's contract for what may be passed to
    // `release`).
    unsafe { freelist::insert(heap_ref, header) };

    let free_total = freelist::total_free(heap_ref);
    if free_total == heap_ref.usable() {
        let heap_ptr = handle.0;
        // SAFETY: every block is free (just checked), so it is sound to
        // unmap every region.
        unsafe { heap::teardown(heap_ptr) };
        *guard = None;
    }

    drop(guard);
    trace!("release({p:p})");
}
