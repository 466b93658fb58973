//! Lock-free in-process event pipeline over a pre-allocated ring buffer.
//!
//! Producers claim batches of slots, fill them in place and publish them;
//! consumers follow the publication cursor through barriers, each at its
//! own pace, gated only by the ring wrapping around. Claim strategies
//! (single producer, serialized multi-producer, scan-based multi-producer)
//! and wait strategies (busy-spin, yielding, sleeping, blocking) compose
//! freely at construction time; see [`Sequencer`] for the full protocol.

mod barrier;
pub mod claim;
pub mod error;
pub mod ringbuffer;
pub mod sequence;
pub mod sequencer;
pub mod traits;
pub mod utils;
pub mod waiting;

pub use barrier::*;
pub use claim::*;
pub use error::*;
pub use sequencer::Sequencer;
pub use traits::*;
pub use waiting::*;

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use crate::claim::{MultiProducerClaim, MultiProducerScanClaim, SingleProducerClaim};
    use crate::error::RingflowError;
    use crate::sequence::{AtomicSequence, Sequence, FIRST_SEQUENCE_VALUE};
    use crate::sequencer::Sequencer;
    use crate::traits::{ClaimStrategy, SequenceBarrier, WaitingStrategy};
    use crate::waiting::{
        BlockingWaitStrategy, BusySpinWaitStrategy, SleepingWaitStrategy, YieldingWaitStrategy,
    };

    /// Drive `producers` claiming threads and `consumers` summing threads
    /// over a fresh pipeline until every consumer has seen `capacity *
    /// batch * passes * producers` events, then report the final cursor
    /// and the per-consumer checksums.
    fn run_pipeline<C: ClaimStrategy, W: WaitingStrategy>(
        capacity: usize,
        producers: usize,
        consumers: usize,
        batch: Sequence,
        passes: Sequence,
    ) -> (Sequence, Vec<i64>) {
        let mut sequencer: Sequencer<i64, C, W> = Sequencer::new(capacity).unwrap();
        let consumer_sequences: Vec<_> = (0..consumers)
            .map(|_| Arc::new(AtomicSequence::default()))
            .collect();
        sequencer.set_gating_sequences(consumer_sequences.clone());

        let expected = capacity as i64 * batch * passes * producers as i64 - 1;
        let claims_per_producer = capacity as i64 * passes;

        let mut sums = vec![0i64; consumers];
        thread::scope(|scope| {
            let sequencer = &sequencer;

            for (consumer_sequence, sum) in consumer_sequences.iter().zip(sums.iter_mut()) {
                let consumer_sequence = consumer_sequence.clone();
                scope.spawn(move || {
                    let barrier = sequencer.new_barrier(&[]);
                    let mut next = FIRST_SEQUENCE_VALUE;
                    let mut local_sum = 0i64;
                    loop {
                        let available =
                            match barrier.wait_for_timeout(next, Duration::from_millis(10)) {
                                Ok(available) => available,
                                Err(_) => continue,
                            };
                        let available = sequencer.get_highest_published_sequence(next, available);
                        if available < next {
                            continue;
                        }
                        for sequence in next..=available {
                            // SAFETY: everything up to `available` is
                            // published and gated against lapping by this
                            // consumer's own sequence.
                            local_sum += unsafe { *sequencer.get(sequence) };
                        }
                        consumer_sequence.set(available);
                        if available == expected {
                            break;
                        }
                        next = available + 1;
                    }
                    *sum = local_sum;
                });
            }

            for _ in 0..producers {
                scope.spawn(move || {
                    for _ in 0..claims_per_producer {
                        let end = sequencer.claim(batch).unwrap();
                        for sequence in (end - batch + 1)..=end {
                            // SAFETY: the batch was claimed above and is
                            // not yet published.
                            unsafe { *sequencer.get_mut(sequence) = sequence };
                        }
                        sequencer.publish(end, batch);
                    }
                });
            }
        });

        (sequencer.get_cursor(), sums)
    }

    fn checksum(last_sequence: Sequence) -> i64 {
        last_sequence * (last_sequence + 1) / 2
    }

    #[test]
    fn test_single_producer_single_consumer() {
        let passes = if cfg!(miri) { 16 } else { 1024 };
        let (cursor, sums) =
            run_pipeline::<SingleProducerClaim, YieldingWaitStrategy>(8, 1, 1, 1, passes);

        let expected = 8 * passes - 1;
        assert_eq!(cursor, expected);
        assert_eq!(sums, vec![checksum(expected)]);
    }

    #[test]
    fn test_single_producer_fans_out_to_three_consumers() {
        let passes = if cfg!(miri) { 4 } else { 100 };
        let (cursor, sums) =
            run_pipeline::<SingleProducerClaim, BusySpinWaitStrategy>(16, 1, 3, 4, passes);

        let expected = 16 * 4 * passes - 1;
        assert_eq!(cursor, expected);
        // Broadcast: every consumer sees the whole stream.
        assert_eq!(sums, vec![checksum(expected); 3]);
    }

    #[test]
    fn test_multi_producer_serialized_publish() {
        let passes = if cfg!(miri) { 1 } else { 10 };
        let capacity = if cfg!(miri) { 64 } else { 1024 };
        let (cursor, sums) =
            run_pipeline::<MultiProducerClaim, BlockingWaitStrategy>(capacity, 4, 2, 8, passes);

        let expected = capacity as i64 * 8 * passes * 4 - 1;
        assert_eq!(cursor, expected);
        assert_eq!(sums, vec![checksum(expected); 2]);
    }

    #[test]
    fn test_multi_producer_scan_publish() {
        let passes = if cfg!(miri) { 1 } else { 10 };
        let capacity = if cfg!(miri) { 64 } else { 1024 };
        let (cursor, sums) =
            run_pipeline::<MultiProducerScanClaim, YieldingWaitStrategy>(capacity, 4, 2, 8, passes);

        let expected = capacity as i64 * 8 * passes * 4 - 1;
        assert_eq!(cursor, expected);
        assert_eq!(sums, vec![checksum(expected); 2]);
    }

    #[test]
    fn test_capacity_one_pipeline() {
        let (cursor, sums) =
            run_pipeline::<SingleProducerClaim, YieldingWaitStrategy>(1, 1, 1, 1, 8);
        assert_eq!(cursor, 7);
        assert_eq!(sums, vec![checksum(7)]);
    }

    #[test]
    fn test_batch_spanning_whole_ring() {
        let (cursor, sums) =
            run_pipeline::<SingleProducerClaim, BusySpinWaitStrategy>(16, 1, 1, 16, 4);
        assert_eq!(cursor, 16 * 16 * 4 - 1);
        assert_eq!(sums, vec![checksum(cursor)]);
    }

    #[test]
    fn test_alert_interrupts_draining_consumer() {
        let sequencer: Sequencer<i64, SingleProducerClaim, BlockingWaitStrategy> =
            Sequencer::new(8).unwrap();
        let barrier = sequencer.new_barrier(&[]);
        let progress = AtomicSequence::default();

        for _ in 0..4 {
            let end = sequencer.claim(1).unwrap();
            unsafe { *sequencer.get_mut(end) = end };
            sequencer.publish(end, 1);
        }

        thread::scope(|scope| {
            let consumer = scope.spawn(|| {
                let mut drained = Vec::new();
                let mut next = FIRST_SEQUENCE_VALUE;
                loop {
                    match barrier.wait_for(next) {
                        Ok(available) => {
                            for sequence in next..=available {
                                drained.push(unsafe { *sequencer.get(sequence) });
                            }
                            progress.set(available);
                            next = available + 1;
                        }
                        Err(err) => return (drained, err),
                    }
                }
            });

            // Let the consumer drain at least one event, then cancel it.
            while progress.get() < 0 {
                thread::yield_now();
            }
            barrier.alert();
            let alerted_at = Instant::now();

            let (drained, err) = consumer.join().unwrap();
            assert!(alerted_at.elapsed() < Duration::from_millis(100));
            assert_eq!(err, RingflowError::Alerted);
            // Nothing read before the alert is lost or reordered.
            assert!(!drained.is_empty());
            let prefix: Vec<i64> = (0..drained.len() as i64).collect();
            assert_eq!(drained, prefix);
        });
    }

    #[test]
    fn test_wait_times_out_with_no_publishes() {
        let sequencer: Sequencer<i64, SingleProducerClaim, SleepingWaitStrategy> =
            Sequencer::new(8).unwrap();
        let barrier = sequencer.new_barrier(&[]);

        let started = Instant::now();
        let result = barrier.wait_for_timeout(0, Duration::from_millis(10));
        let elapsed = started.elapsed();

        assert_eq!(result, Err(RingflowError::TimedOut));
        assert!(elapsed >= Duration::from_millis(10));
        assert!(elapsed < Duration::from_millis(50));
    }
}
