//! Naïve byte fill / byte copy.
//!
//! This allocator must not depend on any heap facility other than the two
//! OS mapping primitives it is built on. That rules out the usual
//! C-library `memset`/`memcpy`: on most platforms they are themselves free
//! to probe CPU features at runtime, or — worse — to be provided by the
//! very `libc` this crate may end up standing in for once loaded in its
//! place. These two functions are therefore written as straight-line byte
//! loops over raw pointers; slower than an intrinsic memcpy, but with no
//! hidden dependency on anything this crate doesn't itself control.

use std::ptr;

/// Write `value` to each of the `len` bytes starting at `dst`.
///
/// # Safety
/// `dst` must be valid for writes of `len` bytes.
pub unsafe fn byte_fill(dst: *mut u8, value: u8, len: usize) {
    for i in 0..len {
        // SAFETY: `i < len` and the caller guarantees `dst..dst+len` is
        // writable.
        unsafe { ptr::write(dst.add(i), value) };
    }
}

/// Copy `len` bytes from `src` to `dst`.
///
/// The two ranges must not overlap; the allocator only ever uses this to
/// move a live payload into a freshly allocated block, which by
/// construction never aliases the source.
///
/// # Safety
/// `src` must be valid for reads of `len` bytes, `dst` valid for writes of
/// `len` bytes, and the two ranges must not overlap.
pub unsafe fn byte_copy(dst: *mut u8, src: *const u8, len: usize) {
    for i in 0..len {
        // SAFETY: `i < len`; caller guarantees both ranges are valid and
        // disjoint.
        unsafe {
            let byte = ptr::read(src.add(i));
            ptr::write(dst.add(i), byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_writes_every_byte() {
        let mut buf = [0xFFu8; 16];
        unsafe { byte_fill(buf.as_mut_ptr(), 0, 16) };
        assert_eq!(buf, [0u8; 16]);
    }

    #[test]
    fn fill_respects_length() {
        let mut buf = [0xFFu8; 8];
        unsafe { byte_fill(buf.as_mut_ptr(), 0, 4) };
        assert_eq!(&buf[..4], &[0, 0, 0, 0]);
        assert_eq!(&buf[4..], &[0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn copy_moves_bytes_verbatim() {
        let src = *b"hello, world!!!!";
        let mut dst = [0u8; 16];
        unsafe { byte_copy(dst.as_mut_ptr(), src.as_ptr(), 16) };
        assert_eq!(dst, src);
    }

    #[test]
    fn copy_truncates_to_requested_length() {
        let src = *b"0123456789ABCDEF";
        let mut dst = [0xAAu8; 16];
        unsafe { byte_copy(dst.as_mut_ptr(), src.as_ptr(), 4) };
        assert_eq!(&dst[..4], b"0123");
        assert_eq!(&dst[4..], [0xAA; 12]);
    }
}
