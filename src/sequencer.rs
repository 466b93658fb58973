//! The sequencer façade: one object composing ring storage, cursor, claim
//! strategy and wait strategy.
//!
//! # Overview
//! A [`Sequencer`] is the single shared object of a pipeline. Producers and
//! consumers hold `&Sequencer` (or an `Arc`) and coordinate exclusively
//! through sequence numbers:
//!
//! 1. **Producers** call [`Sequencer::claim`] to reserve a batch of slots,
//!    fill the slots through [`Sequencer::get_mut`], and make them visible
//!    with [`Sequencer::publish`].
//! 2. **Consumers** create a barrier with [`Sequencer::new_barrier`], wait
//!    on it for the next sequence they need, and read the slots up to what
//!    the barrier (narrowed by
//!    [`Sequencer::get_highest_published_sequence`] for the scan claim
//!    strategy) reports available.
//! 3. Each consumer advances its own [`AtomicSequence`], which the
//!    producers observe as a gating sequence so the ring never laps an
//!    unfinished reader.
//!
//! The claim strategy decides how many producers may share the sequencer
//! and what the cursor means; the wait strategy decides how consumers
//! spend their time while waiting. Both are chosen at construction and
//! monomorphized, so the hot path carries no dynamic dispatch.
//!
//! # Usage
//! ```rust
//! use ringflow::{
//!     BusySpinWaitStrategy, SequenceBarrier, Sequencer, SingleProducerClaim,
//! };
//!
//! let sequencer: Sequencer<i64, SingleProducerClaim, BusySpinWaitStrategy> =
//!     Sequencer::new(8)?;
//!
//! let barrier = sequencer.new_barrier(&[]);
//! let end = sequencer.claim(2)?;
//! for sequence in end - 1..=end {
//!     // SAFETY: the batch [end - 1, end] was claimed above and is not
//!     // yet published.
//!     unsafe { *sequencer.get_mut(sequence) = sequence * 10 };
//! }
//! sequencer.publish(end, 2);
//!
//! assert_eq!(barrier.wait_for(1), Ok(1));
//! // SAFETY: sequence 1 was published above.
//! assert_eq!(unsafe { *sequencer.get(1) }, 10);
//! # Ok::<(), ringflow::RingflowError>(())
//! ```

use std::sync::Arc;

use crate::barrier::ProcessingSequenceBarrier;
use crate::error::{Result, RingflowError};
use crate::ringbuffer::RingBuffer;
use crate::sequence::{AtomicSequence, Sequence};
use crate::traits::{ClaimStrategy, WaitingStrategy};

pub struct Sequencer<T, C: ClaimStrategy, W: WaitingStrategy> {
    ring: RingBuffer<T>,
    cursor: Arc<AtomicSequence>,
    claim_strategy: C,
    waiting_strategy: Arc<W>,
    gating_sequences: Vec<Arc<AtomicSequence>>,
}

impl<T: Default, C: ClaimStrategy, W: WaitingStrategy> Sequencer<T, C, W> {
    /// Build a sequencer over `capacity` slots.
    ///
    /// Fails with [`RingflowError::InvalidCapacity`] unless `capacity` is a
    /// power of two (capacity 1 is allowed). All storage, from the slots to
    /// the claim bookkeeping, is allocated here; nothing allocates per event.
    pub fn new(capacity: usize) -> Result<Self> {
        if !capacity.is_power_of_two() {
            return Err(RingflowError::InvalidCapacity(capacity));
        }
        Ok(Self {
            ring: RingBuffer::new(capacity),
            cursor: Arc::new(AtomicSequence::default()),
            claim_strategy: C::with_capacity(capacity),
            waiting_strategy: Arc::new(W::default()),
            gating_sequences: Vec::new(),
        })
    }

    /// Replace the set of consumer sequences producers must not lap.
    ///
    /// Must be called before producers start claiming; taking `&mut self`
    /// keeps registration and concurrent use from overlapping.
    pub fn set_gating_sequences(&mut self, sequences: Vec<Arc<AtomicSequence>>) {
        self.gating_sequences = sequences;
    }

    /// Create a barrier observing the cursor and the given upstream
    /// consumer sequences (empty for consumers fed directly by producers).
    pub fn new_barrier(&self, dependencies: &[Arc<AtomicSequence>]) -> ProcessingSequenceBarrier<W> {
        let mut view = Vec::with_capacity(dependencies.len() + 1);
        view.push(self.cursor.clone());
        view.extend(dependencies.iter().cloned());
        ProcessingSequenceBarrier::new(view, self.waiting_strategy.clone())
    }

    /// Reserve `delta` slots; returns the last sequence of the batch.
    ///
    /// Spins until the batch no longer laps the slowest gating sequence;
    /// there is no timeout on claiming. Fails only with
    /// [`RingflowError::InvalidBatch`] when `delta` is zero or larger than
    /// the ring.
    pub fn claim(&self, delta: Sequence) -> Result<Sequence> {
        if delta < 1 || delta > self.ring.capacity() as i64 {
            return Err(RingflowError::InvalidBatch {
                delta,
                capacity: self.ring.capacity(),
            });
        }
        Ok(self.claim_strategy.claim(delta, &self.gating_sequences))
    }

    /// Announce that the claimed batch ending at `sequence` is filled.
    ///
    /// Must be called exactly once per successful claim, with the same
    /// `sequence` and `delta` the claim returned and was given; the
    /// protocol does not detect violations.
    pub fn publish(&self, sequence: Sequence, delta: Sequence) {
        self.claim_strategy.publish(sequence, delta, &self.cursor);
        self.waiting_strategy.signal_all_when_blocking();
    }

    /// Largest sequence in `[low, high]` with everything from `low` up to
    /// it published; `low - 1` when `low` itself is not.
    ///
    /// Consumers of the scan claim strategy narrow every barrier result
    /// through this; for the other strategies the cursor already proves
    /// contiguity and `high` comes back unchanged.
    pub fn get_highest_published_sequence(&self, low: Sequence, high: Sequence) -> Sequence {
        self.claim_strategy.highest_published(low, high)
    }

    /// Current cursor value (acquire load).
    pub fn get_cursor(&self) -> Sequence {
        self.cursor.get()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Read the slot covering `sequence`.
    ///
    /// # Safety
    /// `sequence` must be published and not yet lapped.
    pub unsafe fn get(&self, sequence: Sequence) -> &T {
        self.ring.get(sequence)
    }

    /// Write access to the slot covering `sequence`.
    ///
    /// # Safety
    /// The caller must hold the unpublished claim covering `sequence`.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut(&self, sequence: Sequence) -> &mut T {
        self.ring.get_mut(sequence)
    }
}
