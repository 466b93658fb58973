//! The coordination point a consumer waits on.
//!
//! A `ProcessingSequenceBarrier` watches the publication cursor together
//! with the sequences of any upstream consumers this consumer depends on;
//! what it reports available is the minimum over that whole view, so a
//! downstream stage can never overtake the stages it feeds from.
//!
//! Barriers also carry the cancellation path: `alert` flips a flag that
//! every wait loop re-checks each iteration (and wakes parked waiters), so
//! in-flight waits return [`RingflowError::Alerted`](crate::RingflowError)
//! within one iteration. `clear_alert` re-arms the barrier for reuse.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use crate::{
    error::Result,
    sequence::{AtomicSequence, Sequence},
    traits::{SequenceBarrier, WaitingStrategy},
};

/// A consumer's gate onto the ring: cursor plus upstream dependencies,
/// waited on through the shared wait strategy.
pub struct ProcessingSequenceBarrier<W: WaitingStrategy> {
    alerted: AtomicBool,
    dependencies: Vec<Arc<AtomicSequence>>,
    waiting_strategy: Arc<W>,
}

impl<W: WaitingStrategy> ProcessingSequenceBarrier<W> {
    pub(crate) fn new(dependencies: Vec<Arc<AtomicSequence>>, waiting_strategy: Arc<W>) -> Self {
        Self {
            alerted: AtomicBool::new(false),
            dependencies,
            waiting_strategy,
        }
    }
}

impl<W: WaitingStrategy> SequenceBarrier for ProcessingSequenceBarrier<W> {
    fn wait_for(&self, sequence: Sequence) -> Result<Sequence> {
        self.waiting_strategy.wait_for(
            sequence,
            &self.dependencies,
            || self.alerted.load(Ordering::Relaxed),
            None,
        )
    }

    fn wait_for_timeout(&self, sequence: Sequence, timeout: Duration) -> Result<Sequence> {
        self.waiting_strategy.wait_for(
            sequence,
            &self.dependencies,
            || self.alerted.load(Ordering::Relaxed),
            Some(timeout),
        )
    }

    fn alert(&self) {
        self.alerted.store(true, Ordering::Relaxed);
        // Parked waiters would otherwise only notice on their next wakeup.
        self.waiting_strategy.signal_all_when_blocking();
    }

    fn clear_alert(&self) {
        self.alerted.store(false, Ordering::Relaxed);
    }

    fn is_alerted(&self) -> bool {
        self.alerted.load(Ordering::Relaxed)
    }
}
