//! Stack growth for the recursive tree walks
//!
//! Lowering and the assigned-locals scan recurse once per nesting level.
//! Rayon workers and test threads run on 2 MiB stacks, so each level checks
//! the remaining stack and continues on a heap-allocated segment when it
//! runs low.

/// Remaining stack below which a new segment is allocated
const RED_ZONE: usize = 128 * 1024;

/// Size of each new segment
const SEGMENT: usize = 2 * 1024 * 1024;

#[inline]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT, f)
}
