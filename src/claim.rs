//! Claim strategies: how producers reserve ring slots and publish them.
//!
//! All three strategies share the gating rule (a batch ending at sequence
//! `s` may be claimed once `s - capacity <= min(gating)`) and differ in
//! how they coordinate between producers and in what the cursor means:
//!
//! - [`SingleProducerClaim`]: no producer-side synchronization at all; the
//!   cursor is the published high-water mark.
//! - [`MultiProducerClaim`]: claims race on a shared counter; publications
//!   serialize in claim order, so the cursor stays contiguous.
//! - [`MultiProducerScanClaim`]: claims race on a shared counter and
//!   publications land independently in a per-slot availability buffer; the
//!   cursor only tracks the highest published sequence and consumers
//!   establish contiguity with [`ClaimStrategy::highest_published`].

use std::cell::Cell;
use std::hint;
use std::sync::Arc;

use crate::sequence::{AtomicSequence, Sequence, INITIAL_CURSOR_VALUE};
use crate::traits::ClaimStrategy;
use crate::utils::{AvailableSequenceBuffer, Utils};

/// Race a shared claim counter forward by `delta`, spinning while the
/// candidate batch would lap the slowest gating sequence. The room check is
/// re-run after every failed CAS, so a claim only commits against a state
/// it was verified for.
fn claim_with_gate(
    claimed: &AtomicSequence,
    delta: Sequence,
    buffer_size: i64,
    gating_sequences: &[Arc<AtomicSequence>],
) -> Sequence {
    loop {
        let current = claimed.get();
        let next = current + delta;
        let wrap_point = next - buffer_size;
        if wrap_point > Utils::get_minimum_sequence(gating_sequences) {
            hint::spin_loop();
            continue;
        }
        if claimed.compare_and_set(current, next) {
            return next;
        }
        hint::spin_loop();
    }
}

/// Claim strategy for exactly one producer thread.
///
/// Keeps the next sequence and a cache of the slowest gating sequence in
/// plain cells, so a claim in the common case is two reads and an add. The
/// gating set is only re-read when the cached minimum no longer proves
/// room.
///
/// Sharing this strategy between concurrently claiming threads silently
/// corrupts the sequence stream; nothing detects the misuse. Callers that
/// need more than one producer pick one of the multi-producer strategies.
pub struct SingleProducerClaim {
    buffer_size: i64,
    next: Cell<Sequence>,
    cached_min_gating: Cell<Sequence>,
}

// SAFETY: the single-producer contract above: only one thread claims and
// publishes, so the cells have one writer. The strategy still has to cross
// thread boundaries inside a shared sequencer.
unsafe impl Sync for SingleProducerClaim {}

impl ClaimStrategy for SingleProducerClaim {
    fn with_capacity(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size as i64,
            next: Cell::new(INITIAL_CURSOR_VALUE),
            cached_min_gating: Cell::new(INITIAL_CURSOR_VALUE),
        }
    }

    fn claim(&self, delta: Sequence, gating_sequences: &[Arc<AtomicSequence>]) -> Sequence {
        let end = self.next.get() + delta;
        let wrap_point = end - self.buffer_size;

        if wrap_point > self.cached_min_gating.get() {
            let mut min_sequence = Utils::get_minimum_sequence(gating_sequences);
            while wrap_point > min_sequence {
                hint::spin_loop();
                min_sequence = Utils::get_minimum_sequence(gating_sequences);
            }
            self.cached_min_gating.set(min_sequence);
        }

        self.next.set(end);
        end
    }

    fn publish(&self, sequence: Sequence, _delta: Sequence, cursor: &AtomicSequence) {
        cursor.set(sequence);
    }

    fn highest_published(&self, _low: Sequence, high: Sequence) -> Sequence {
        high
    }
}

/// Multi-producer claim strategy that publishes in claim order.
///
/// Claims race on the shared `claimed` counter; a publication spins until
/// every earlier batch has been published and then advances the cursor
/// itself. The cursor therefore remains an authoritative contiguous
/// high-water mark and consumers need no availability scan. The cost is
/// head-of-line blocking: a producer that is slow to fill its batch stalls
/// every publication claimed after it.
pub struct MultiProducerClaim {
    buffer_size: i64,
    claimed: AtomicSequence,
}

impl ClaimStrategy for MultiProducerClaim {
    fn with_capacity(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size as i64,
            claimed: AtomicSequence::default(),
        }
    }

    fn claim(&self, delta: Sequence, gating_sequences: &[Arc<AtomicSequence>]) -> Sequence {
        claim_with_gate(&self.claimed, delta, self.buffer_size, gating_sequences)
    }

    fn publish(&self, sequence: Sequence, delta: Sequence, cursor: &AtomicSequence) {
        let predecessor = sequence - delta;
        while cursor.get() != predecessor {
            hint::spin_loop();
        }
        cursor.set(sequence);
    }

    fn highest_published(&self, _low: Sequence, high: Sequence) -> Sequence {
        high
    }
}

/// Multi-producer claim strategy whose publications never wait on each
/// other.
///
/// Each published slot records its wrap round in the availability buffer;
/// the cursor is then advanced to the published sequence if it is behind,
/// but a cursor value alone no longer implies that every lower sequence is
/// published. Consumers narrow what the barrier hands them through
/// [`ClaimStrategy::highest_published`], paying an O(batch) scan for the
/// freedom producers gain.
pub struct MultiProducerScanClaim {
    buffer_size: i64,
    claimed: AtomicSequence,
    available: AvailableSequenceBuffer,
}

impl ClaimStrategy for MultiProducerScanClaim {
    fn with_capacity(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size as i64,
            claimed: AtomicSequence::default(),
            available: AvailableSequenceBuffer::new(buffer_size as i64),
        }
    }

    fn claim(&self, delta: Sequence, gating_sequences: &[Arc<AtomicSequence>]) -> Sequence {
        claim_with_gate(&self.claimed, delta, self.buffer_size, gating_sequences)
    }

    fn publish(&self, sequence: Sequence, delta: Sequence, cursor: &AtomicSequence) {
        for published in (sequence - delta + 1)..=sequence {
            self.available.set(published);
        }

        // Keep the cursor converging on the highest published sequence so
        // barrier waits make progress; contiguity still comes from the
        // availability scan alone.
        let mut current = cursor.get();
        while sequence > current {
            if cursor.compare_and_set(current, sequence) {
                break;
            }
            current = cursor.get();
        }
    }

    fn highest_published(&self, low: Sequence, high: Sequence) -> Sequence {
        self.available.highest_published(low, high)
    }
}
