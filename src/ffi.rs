//! C ABI surface.
//!
//! These are the symbols an external `LD_PRELOAD`-style shim — outside
//! this crate's scope — redirects a process's standard allocation calls
//! to. Each one is a thin wrapper around the corresponding function in
//! [`crate::alloc`]; none of them add any behavior of their own beyond
//! the pointer-width/type conversions C ABI compatibility requires.

use crate::alloc;
use crate::block;
use crate::stats::{self, Stats};
use std::os::raw::c_void;
use std::ptr::NonNull;

/// `malloc(size)`. See [`crate::alloc::allocate`].
///
/// # Safety
/// Caller-facing precondition is the same as the platform `malloc`: no
/// additional ones beyond the ABI itself.
#[no_mangle]
pub unsafe extern "C" fn malloc(size: usize) -> *mut c_void {
    alloc::allocate(size).cast()
}

/// `calloc(nmemb, size)`. See [`crate::alloc::zero_allocate`].
///
/// # Safety
/// Same as [`malloc`].
#[no_mangle]
pub unsafe extern "C" fn calloc(nmemb: usize, size: usize) -> *mut c_void {
    alloc::zero_allocate(nmemb, size).cast()
}

/// `realloc(ptr, size)`. See [`crate::alloc::reallocate`].
///
/// # Safety
/// `ptr` must be null or a pointer previously returned by `malloc`,
/// `calloc`, or `realloc` from this allocator, and not already freed.
#[no_mangle]
pub unsafe extern "C" fn realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    alloc::reallocate(ptr.cast(), size).cast()
}

/// `free(ptr)`. See [`crate::alloc::release`].
///
/// # Safety
/// `ptr` must be null or a pointer previously returned by `malloc`,
/// `calloc`, or `realloc` from this allocator, and not already freed
/// (double-free is undefined behavior this allocator does not detect).
#[no_mangle]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
    alloc::release(ptr.cast())
}

/// Return the usable payload size of a live allocation, or `0` if `ptr`
/// is null. A read-only companion symbol present in every mainstream
/// malloc replacement (glibc, jemalloc, mimalloc).
///
/// # Safety
/// `ptr` must be null or a pointer previously returned by `malloc`,
/// `calloc`, or `realloc` from this allocator, and not already freed.
#[no_mangle]
pub unsafe extern "C" fn malloc_usable_size(ptr: *mut c_void) -> usize {
    let Some(data) = NonNull::new(ptr.cast::<u8>()) else {
        return 0;
    };
    // SAFETY: caller's contract above.
    let header = unsafe { block::header_of(data) };
    // SAFETY: `header` is a live block header.
    block::payload_size(unsafe { header.as_ref() })
}

/// Write a point-in-time heap snapshot into `*out`.
///
/// Returns `true` and populates `*out` if a heap currently exists;
/// returns `false` and leaves `*out` untouched otherwise (including when
/// `out` itself is null).
///
/// # Safety
/// `out`, if non-null, must be valid for writes of `size_of::<Stats>()`
/// bytes.
#[no_mangle]
pub unsafe extern "C" fn mapalloc_stats(out: *mut Stats) -> bool {
    let Some(snapshot) = stats::snapshot() else {
        return false;
    };
    if out.is_null() {
        return false;
    }
    // SAFETY: caller's contract above.
    unsafe { out.write(snapshot) };
    true
}
