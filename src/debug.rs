//! Debug sink.
//!
//! A single environment variable, `MEMORY_DEBUG`, gates an optional trace
//! to stderr; the literal value `yes` enables it, anything else
//! (including unset) disables it. The hard requirement this module exists
//! to satisfy: the trace must never be able to recurse into the
//! allocator. `eprintln!` goes through the host's formatted-output
//! machinery, which this crate does not control and which may itself
//! allocate — and once this crate is loaded in place of the system
//! allocator, "may allocate" means "may call straight back into
//! `mapalloc`".
//!
//! The guard against that is a non-blocking try-acquire on a dedicated
//! trace mutex, plus an in-scope "currently tracing" flag checked in
//! addition to the try-lock result. The two are partially redundant
//! against each other (a non-reentrant `std::sync::Mutex::try_lock`
//! already refuses a same-thread re-entry without blocking) but both are
//! kept so that recursion is refused if either mechanism's guarantee ever
//! turns out to be weaker than expected on some platform.
//!
//! This sink is never called from the data-mutating paths' error handling
//! directly inline with the memory mutex still held, to avoid a
//! lock-order inversion — callers in `alloc.rs` trace only after
//! releasing the memory mutex.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// `None` until the first trace attempt; afterwards, whether
/// `MEMORY_DEBUG=yes` was set. Guarded by the trace mutex itself, so the
/// environment is consulted once, lazily, under that mutex rather than
/// through a separate lazy-init primitive.
static TRACE_STATE: Mutex<Option<bool>> = Mutex::new(None);

/// Set for the duration of an in-progress trace; checked in addition to
/// the try-lock so that a reentrant call is refused even if some future
/// platform's mutex implementation tolerates same-thread re-acquisition.
static TRACING: AtomicBool = AtomicBool::new(false);

/// Emit a trace line if tracing is enabled and this call is not reentrant.
///
/// Silently does nothing if: tracing is disabled, the trace mutex is
/// already held (by this thread or another), or the "currently tracing"
/// flag is already set.
pub fn trace(args: std::fmt::Arguments<'_>) {
    let Ok(mut state) = TRACE_STATE.try_lock() else {
        return;
    };
    if TRACING.swap(true, Ordering::AcqRel) {
        // Reached only if some future platform's `try_lock` tolerates
        // same-thread re-entry; restore the flag and bail out anyway.
        TRACING.store(false, Ordering::Release);
        return;
    }

    let enabled = *state.get_or_insert_with(|| {
        cfg!(feature = "force_trace")
            || std::env::var("MEMORY_DEBUG").is_ok_and(|v| v == "yes")
    });
    if enabled {
        eprintln!("[mapalloc] {args}");
    }

    TRACING.store(false, Ordering::Release);
}

/// Emit a trace line built from a `format!`-style argument list.
///
/// Thin wrapper so call sites read like `trace!("allocate({n}) -> {p:p}")`
/// instead of spelling out `format_args!` at every call site.
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::debug::trace(::std::format_args!($($arg)*))
    };
}
pub(crate) use trace;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_does_not_panic_when_disabled() {
        // SAFETY net: this only verifies the call doesn't panic/deadlock;
        // actual stderr output depends on the process environment and is
        // exercised by the integration tests instead.
        trace!("unit test trace line, n={}", 42);
    }

    #[test]
    fn concurrent_trace_attempts_never_deadlock() {
        std::thread::scope(|scope| {
            for i in 0..8 {
                scope.spawn(move || trace!("concurrent trace {i}"));
            }
        });
    }
}
