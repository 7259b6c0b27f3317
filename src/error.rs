//! Internal diagnostic error type.
//!
//! Nothing in the public ABI ever returns this type — every public
//! operation reports failure solely by returning null, matching the C
//! `malloc` family's own contract. `heap::init`/`heap::expand`/
//! `freelist::find_fit` return it internally so [`crate::alloc`] can trace
//! *why* an allocation failed before collapsing the result to null at the
//! public boundary; tests use it the same way to distinguish failure
//! causes.

/// Why a heap-growing operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
    /// The OS refused the underlying `mmap` call.
    MapFailed,
    /// The region size computed for an expansion would overflow `usize`
    /// before `mmap` is even attempted (a caller-supplied request large
    /// enough that adding the region header overflows).
    SizeOverflow,
    /// The heap exists but no region registry entry could be found for an
    /// address that should have had one (an internal consistency failure,
    /// never expected to occur — see `crate::heap::teardown`).
    RegionNotFound,
}
