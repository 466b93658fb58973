//! Error types for ring construction and barrier waits.

use thiserror::Error;

/// Result type alias for ringflow operations.
pub type Result<T> = std::result::Result<T, RingflowError>;

/// Errors surfaced by the sequencer and by barrier waits.
///
/// `Alerted` and `TimedOut` are coordination signals rather than failures:
/// a consumer that receives one re-checks its shutdown condition and
/// resubmits the wait.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingflowError {
    /// Ring capacity must be a non-zero power of two.
    #[error("invalid ring capacity {0}: must be a non-zero power of two")]
    InvalidCapacity(usize),

    /// Claim batch must cover at least one slot and fit in the ring.
    #[error("invalid claim batch {delta} for ring of {capacity} slots")]
    InvalidBatch {
        /// Requested batch size.
        delta: i64,
        /// Ring capacity the batch was checked against.
        capacity: usize,
    },

    /// The barrier was alerted while waiting.
    #[error("sequence barrier alerted")]
    Alerted,

    /// The wait deadline expired before the sequence became available.
    #[error("wait for sequence timed out")]
    TimedOut,
}

impl RingflowError {
    /// True for signals a caller is expected to handle by retrying or
    /// shutting down cleanly, false for construction/usage errors.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Alerted | Self::TimedOut)
    }
}
