//! Shared test helper: serializing access to the process-wide heap.
//!
//! Exactly one heap descriptor exists per process. `cargo test` runs
//! test functions across multiple threads by default, so two
//! tests racing on `allocate`/`release` would otherwise observe a heap
//! that also contains the other test's live blocks, making scenario
//! assertions like "the free list now contains exactly one block" flaky
//! for reasons that have nothing to do with the allocator itself.
//! [`serial`] is the same trick the crate's own memory mutex already
//! uses, applied at test granularity instead of call granularity: hold it
//! for a whole test, not just one operation.
//!
//! `#[doc(hidden)]` and unconditionally compiled (not `#[cfg(test)]`) so
//! that both this crate's unit tests and `tests/*.rs` integration tests —
//! which are compiled as separate crates and cannot see `#[cfg(test)]`
//! items — can depend on it.

use std::sync::{Mutex, MutexGuard};

static TEST_LOCK: Mutex<()> = Mutex::new(());

/// Acquire the test-serialization lock for the duration of the returned
/// guard's scope.
#[doc(hidden)]
pub fn serial() -> MutexGuard<'static, ()> {
    TEST_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
