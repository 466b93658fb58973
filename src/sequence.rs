//! Atomic sequence counters padded to a full cache line.
//!
//! Every contended coordination variable in the pipeline (the publication
//! cursor, the shared claim counter, each consumer's progress sequence) is
//! the same primitive: a 64-bit monotonic counter read and written by
//! different cores. If two of those counters share a cache line, every
//! store by one thread invalidates the line under the other ("false
//! sharing") and throughput collapses even though the threads never touch
//! the same variable.
//!
//! `AtomicSequence` prevents that by construction: the counter is aligned
//! to a cache-line boundary and the remainder of the line is filled with
//! explicit padding, so no two sequences, and no sequence and unrelated
//! data, can ever cohabit a line.

use std::sync::atomic::{AtomicI64, Ordering};

/// A position in the event stream.
pub type Sequence = i64;

/// Cursor value before anything has been published.
pub const INITIAL_CURSOR_VALUE: Sequence = -1;
/// The first sequence a producer can claim.
pub const FIRST_SEQUENCE_VALUE: Sequence = 0;

/// Size of a cache line on the targets we care about (in bytes).
const CACHE_LINE_SIZE: usize = 64;
/// Bytes needed to fill the rest of the line after the atomic value.
const CACHE_LINE_PADDING: usize = CACHE_LINE_SIZE - std::mem::size_of::<AtomicI64>();

/// A monotonic sequence counter occupying its own cache line.
///
/// Loads are `Acquire`, stores are `Release`: a slot write that happens
/// before a `set` is visible to any thread whose `get` observes the new
/// value. `compare_and_set` is `AcqRel` on success and `Acquire` on
/// failure, which is what the multi-producer claim loop needs.
#[repr(align(64))]
#[derive(Debug)]
pub struct AtomicSequence {
    value: AtomicI64,
    _padding: [u8; CACHE_LINE_PADDING],
}

impl AtomicSequence {
    /// Create a sequence with the given initial value.
    pub fn new(initial_value: Sequence) -> Self {
        AtomicSequence {
            value: AtomicI64::new(initial_value),
            _padding: [0u8; CACHE_LINE_PADDING],
        }
    }

    /// Current value of the sequence.
    pub fn get(&self) -> Sequence {
        self.value.load(Ordering::Acquire)
    }

    /// Publish a new value for the sequence.
    pub fn set(&self, new_value: Sequence) {
        self.value.store(new_value, Ordering::Release);
    }

    /// Replace `current` with `new` if the sequence still holds `current`.
    pub fn compare_and_set(&self, current: Sequence, new: Sequence) -> bool {
        self.value
            .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for AtomicSequence {
    fn default() -> Self {
        Self::new(INITIAL_CURSOR_VALUE)
    }
}

impl From<i64> for AtomicSequence {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl PartialEq for AtomicSequence {
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_get_set() {
        let sequence = AtomicSequence::new(0);
        assert_eq!(sequence.get(), 0);
        sequence.set(42);
        assert_eq!(sequence.get(), 42);
    }

    #[test]
    fn test_default_is_initial_cursor() {
        assert_eq!(AtomicSequence::default().get(), INITIAL_CURSOR_VALUE);
        assert_eq!(AtomicSequence::from(7).get(), 7);
    }

    #[test]
    fn test_compare_and_set() {
        let sequence = AtomicSequence::new(5);
        assert!(sequence.compare_and_set(5, 6));
        assert_eq!(sequence.get(), 6);
        assert!(!sequence.compare_and_set(5, 7));
        assert_eq!(sequence.get(), 6);
    }

    #[test]
    fn test_layout_fills_cache_line() {
        assert_eq!(std::mem::size_of::<AtomicSequence>(), CACHE_LINE_SIZE);
        assert_eq!(std::mem::align_of::<AtomicSequence>(), CACHE_LINE_SIZE);
    }

    #[test]
    fn test_concurrent_compare_and_set() {
        let sequence = Arc::new(AtomicSequence::new(0));
        let mut handles = vec![];
        for _ in 0..4 {
            let sequence = sequence.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    loop {
                        let current = sequence.get();
                        if sequence.compare_and_set(current, current + 1) {
                            break;
                        }
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(sequence.get(), 4000);
    }
}
