//! Process-wide cancellation flag.
//!
//! The ctrlc handler sets it; the mover and rollback loops poll it between
//! entries, never in the middle of a filesystem call.

use std::sync::atomic::{AtomicBool, Ordering};

static REQUESTED: AtomicBool = AtomicBool::new(false);

/// Ask running operations to stop at the next entry boundary (idempotent).
#[inline]
pub fn request() {
    REQUESTED.store(true, Ordering::Relaxed);
}

#[inline]
pub fn is_requested() -> bool {
    REQUESTED.load(Ordering::Relaxed)
}

/// Clear the flag so a later operation in the same process can run.
#[inline]
pub fn reset() {
    REQUESTED.store(false, Ordering::Relaxed);
}
