//! Read-only heap introspection.
//!
//! A single point-in-time snapshot of the heap's aggregate state,
//! assembled from fields that already exist rather than from any
//! sampling or counting done on the allocation hot path. This is the
//! `mallinfo`/`malloc_stats`-style companion every real malloc
//! replacement ships — a one-shot read, not a profiling subsystem.

use crate::freelist;
use crate::lock;
use std::ptr::NonNull;

/// A snapshot of the heap's aggregate state at the moment it was taken.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Stats {
    /// Sum of the lengths of every region currently mapped for the heap.
    pub heap_size: usize,
    /// Sum of the sizes of every currently free block.
    pub free_bytes: usize,
    /// Number of regions currently mapped for the heap.
    pub region_count: usize,
}

/// Take a snapshot of the heap's current state under the memory mutex.
///
/// Returns `None` if no heap is currently initialized — nothing has been
/// allocated yet, or the heap was torn down after becoming entirely free.
pub fn snapshot() -> Option<Stats> {
    let guard = lock::lock();
    let handle = (*guard)?;

    // SAFETY: `handle` points at a live heap descriptor, and holding the
    // memory mutex is this module's only access discipline for it.
    let heap_ref = unsafe { handle.0.as_ref() };

    let mut region_count = 0;
    let mut region = heap_ref.regions;
    while let Some(r) = NonNull::new(region) {
        region_count += 1;
        // SAFETY: every node reachable from `heap.regions` is a live
        // registry entry this heap owns.
        region = unsafe { r.as_ref().next };
    }

    Some(Stats {
        heap_size: heap_ref.size,
        free_bytes: freelist::total_free(heap_ref),
        region_count,
    })
}
