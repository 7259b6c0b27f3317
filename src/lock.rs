//! Concurrency envelope.
//!
//! A single process-wide mutex (the memory mutex) guards all public entry
//! points and all mutations of the heap descriptor and free list; no
//! operation is reentrant on it. This module owns that mutex and the
//! `Option<Heap>` singleton it guards; every other module that touches
//! the heap does so only while holding the guard this module hands out.

use crate::heap::Heap;
use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard};

/// A `NonNull<Heap>` wrapped so it can sit inside a `Mutex` (raw pointers
/// are not `Send` by default).
///
/// # Safety
/// Every thread that dereferences the wrapped pointer does so only while
/// holding `HEAP`'s lock (the type is private to this module precisely so
/// that nothing can do otherwise), so there is never more than one thread
/// touching the pointee at a time.
#[derive(Clone, Copy)]
pub struct HeapHandle(pub NonNull<Heap>);
unsafe impl Send for HeapHandle {}

/// The sole process-wide heap, behind the sole process-wide lock. `None`
/// means "not yet initialized, or torn down after becoming entirely
/// free"; the next allocation after a teardown reinitializes from
/// scratch.
static HEAP: Mutex<Option<HeapHandle>> = Mutex::new(None);

/// Acquire the memory mutex.
///
/// A poisoned mutex (a previous holder panicked while it was locked) is
/// recovered rather than propagated: no public operation here has a
/// panicking failure mode, so a panic under this lock is always an
/// internal bug the process cannot meaningfully keep running past
/// anyway, and refusing every subsequent caller via poison would only
/// make such a bug harder to observe.
pub fn lock() -> MutexGuard<'static, Option<HeapHandle>> {
    HEAP.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
