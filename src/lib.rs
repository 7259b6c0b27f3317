//! A region-based general-purpose allocator built directly on `mmap`/`munmap`.
//!
//! This crate replaces the four standard C allocation primitives —
//! `malloc`, `calloc`, `realloc`, `free` — using nothing but two anonymous
//! private memory-mapping primitives as its only source of raw memory. It
//! is meant to be loaded in place of the platform allocator (for example
//! via an `LD_PRELOAD` shim, which is intentionally outside this crate's
//! scope — see below), not used as a Rust `#[global_allocator]`: its public
//! contract is the C `malloc` family's (`calloc(nmemb, size)`, `realloc`
//! returning the old pointer unmoved-or-moved, `free` never failing), not
//! `core::alloc::GlobalAlloc`'s `Layout`-based one.
//!
//! # Usage
//! As a Rust library, call the four free functions directly:
//! ```
//! let p = mapalloc::allocate(128);
//! assert!(!p.is_null());
//! mapalloc::release(p);
//! ```
//! As a drop-in C allocator, build this crate as a `cdylib` (already
//! configured in `Cargo.toml`) and point an allocator-interposition
//! mechanism at the resulting shared object; it exports `malloc`,
//! `calloc`, `realloc`, and `free` as `#[no_mangle] extern "C"` symbols
//! (see [`ffi`]).
//!
//! # Design
//! The allocator amortizes the cost of `mmap`/`munmap` — expensive system
//! calls — by acquiring memory in large regions ([`heap::INIT_SIZE`], 16
//! MiB by default) and subdividing each region into blocks on demand. A
//! single process-wide [`heap::Heap`] descriptor tracks every region the
//! allocator currently owns; blocks are threaded into an address-sorted,
//! intrusive, doubly linked free list ([`freelist`]) that is split when a
//! request only needs part of a free block, and coalesced whenever two
//! free blocks become address-adjacent. Everything is serialized behind a
//! single process-wide mutex ([`lock`]) — there are no thread-local
//! caches, size-class bins, or lock-free fast paths.
//!
//! When the heap becomes entirely free, every region it owns is unmapped
//! and the heap descriptor itself disappears; the next allocation
//! reinitializes from scratch. This crate deliberately does not implement:
//! best-fit/buddy/segregated-free-list strategies, alignment guarantees
//! beyond what [`block::BlockHeader`]'s own layout produces, relocating
//! defragmentation, or fork/exec safety of the internal lock.
//!
//! Out of scope (external collaborators, not provided by this crate): the
//! dynamic-loader shim that redirects standard allocation symbols to the
//! [`ffi`] exports, build glue, and any statistics/profiling subsystem
//! beyond the one-shot, read-only [`stats::snapshot`].

#[cfg(not(unix))]
compile_error!("mapalloc calls mmap/munmap directly and only supports unix targets");

pub mod alloc;
pub mod arith;
pub mod block;
pub mod debug;
pub mod error;
pub mod ffi;
pub mod fill;
pub mod freelist;
pub mod heap;
pub mod lock;
pub mod region;
pub mod stats;

#[doc(hidden)]
pub mod test_support;

pub use alloc::{allocate, reallocate, release, zero_allocate};
pub use stats::{snapshot, Stats};
