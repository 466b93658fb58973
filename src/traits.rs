use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::sequence::{AtomicSequence, Sequence};

// How producers reserve slots and announce them.
// # Methods
// - `with_capacity`: build a strategy for a ring of `buffer_size` slots.
// - `claim`: reserve `delta` slots; returns the last sequence of the batch.
// - `publish`: announce that `[sequence - delta + 1, sequence]` is filled.
// - `highest_published`: largest contiguously published sequence in range.
//
// `claim` spins until the batch would no longer lap the slowest gating
// sequence; it has no timeout and no failure mode. `publish` must be called
// exactly once per successful claim with the same `sequence` and `delta`;
// the protocol does not detect violations.
pub trait ClaimStrategy: Send + Sync {
    fn with_capacity(buffer_size: usize) -> Self;
    fn claim(&self, delta: Sequence, gating_sequences: &[Arc<AtomicSequence>]) -> Sequence;
    fn publish(&self, sequence: Sequence, delta: Sequence, cursor: &AtomicSequence);
    fn highest_published(&self, low: Sequence, high: Sequence) -> Sequence;
}

/// How a consumer passes the time until a sequence becomes available.
///
/// `wait_for` returns `Ok` with the minimum over `dependencies` once that
/// minimum reaches `sequence`, `Err(Alerted)` as soon as `check_alert`
/// reports true, and `Err(TimedOut)` once the optional deadline expires.
/// Alert and deadline are re-checked on every iteration of the wait loop,
/// whatever the strategy does in between.
///
/// `signal_all_when_blocking` is a no-op for every strategy that never
/// parks a thread.
pub trait WaitingStrategy: Default + Send + Sync {
    fn wait_for<F: Fn() -> bool>(
        &self,
        sequence: Sequence,
        dependencies: &[Arc<AtomicSequence>],
        check_alert: F,
        timeout: Option<Duration>,
    ) -> Result<Sequence>;

    fn signal_all_when_blocking(&self);
}

/// A consumer's view of the publication cursor and its upstream consumers.
/// # Methods
/// - `wait_for`: waits until the barrier's view reaches `sequence`.
/// - `wait_for_timeout`: same, but gives up after `timeout`.
/// - `alert`: makes every in-flight and future wait return `Err(Alerted)`.
/// - `clear_alert`: re-arms the barrier after an alert.
/// - `is_alerted`: whether the alert flag is set.
pub trait SequenceBarrier: Send + Sync {
    fn wait_for(&self, sequence: Sequence) -> Result<Sequence>;
    fn wait_for_timeout(&self, sequence: Sequence, timeout: Duration) -> Result<Sequence>;
    fn alert(&self);
    fn clear_alert(&self);
    fn is_alerted(&self) -> bool;
}
