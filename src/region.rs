//! Raw region provider.
//!
//! This module is the only place in the crate that talks to the operating
//! system. It wraps the two primitives the rest of the allocator is built
//! on: an anonymous, private, read/write mapping and its inverse. Neither
//! wrapper does anything beyond the syscall itself — no bookkeeping, no
//! logging, no fallback strategy. Everything above this module treats a
//! region as an opaque `(base, len)` pair.

use std::ptr;

/// Request an anonymous private read/write mapping of exactly `len` bytes.
///
/// Returns the mapping's base address, or `None` if the kernel refused the
/// request (typically because the process is out of address space or the
/// system is out of memory). `len` is passed to `mmap` unmodified; callers
/// are responsible for any page-size rounding they care about — this
/// wrapper makes no assumption about the page size.
pub fn map(len: usize) -> Option<ptr::NonNull<u8>> {
    if len == 0 {
        return None;
    }

    // SAFETY: the arguments are constants/`len`; `mmap` with `MAP_ANONYMOUS`
    // ignores `fd` and `offset`, both of which are set to the conventional
    // "no file backing" values (-1 and 0).
    let addr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };

    if addr == libc::MAP_FAILED {
        None
    } else {
        // SAFETY: `mmap` returned neither `MAP_FAILED` nor (per POSIX, for a
        // non-zero length) a null pointer.
        Some(unsafe { ptr::NonNull::new_unchecked(addr.cast()) })
    }
}

/// Release the mapping at `base` of length `len` back to the OS.
///
/// Returns `true` on success. Returns `false` without calling into the OS
/// at all if `len == 0` — there is nothing to unmap, and a zero-length
/// `munmap` is itself a documented `EINVAL` on Linux.
pub fn unmap(base: ptr::NonNull<u8>, len: usize) -> bool {
    if len == 0 {
        return false;
    }

    // SAFETY: the caller guarantees that `base..base+len` is a region this
    // module previously handed back from `map`, still mapped, and not
    // referenced afterwards.
    let result = unsafe { libc::munmap(base.as_ptr().cast(), len) };
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_then_unmap_round_trips() {
        let region = map(4096).expect("mmap of one page should succeed");
        unsafe {
            region.as_ptr().write(0x42);
            assert_eq!(region.as_ptr().read(), 0x42);
        }
        assert!(unmap(region, 4096));
    }

    #[test]
    fn zero_length_map_is_refused() {
        assert!(map(0).is_none());
    }

    #[test]
    fn zero_length_unmap_is_refused_without_syscall() {
        let region = map(4096).expect("mmap of one page should succeed");
        assert!(!unmap(region, 0));
        assert!(unmap(region, 4096));
    }
}
