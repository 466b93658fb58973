//! Generic n-producers / m-consumers pipeline demonstration.
//!
//! Producers stamp every claimed slot with its own sequence number and
//! consumers keep a running checksum, so a run verifies itself: with e the
//! expected final sequence, each consumer must arrive at e·(e+1)/2. For
//! the selected claim strategy the demo runs every wait strategy in turn
//! and reports cursor, checksum and throughput.

use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;

use ringflow::{
    claim::{MultiProducerClaim, MultiProducerScanClaim, SingleProducerClaim},
    sequence::{AtomicSequence, Sequence, FIRST_SEQUENCE_VALUE},
    BlockingWaitStrategy, BusySpinWaitStrategy, ClaimStrategy, SequenceBarrier, Sequencer,
    SleepingWaitStrategy, WaitingStrategy, YieldingWaitStrategy,
};

#[derive(Parser, Debug, Clone, Copy)]
#[command(about = "Generic n producers - m consumers sequenced pipeline demo")]
struct Options {
    /// Number of producer threads (forced to 1 for the single-producer strategy)
    #[arg(long = "np", default_value_t = 1)]
    num_prod: usize,

    /// Number of consumer threads
    #[arg(long = "nc", default_value_t = 1)]
    num_cons: usize,

    /// Slots claimed per batch; must not exceed the ring size
    #[arg(long = "bs", default_value_t = 1)]
    batch_size: Sequence,

    /// Ring buffer size; must be a power of two
    #[arg(long = "rb", default_value_t = 2048)]
    ring_buffer_size: usize,

    /// Whole ring passes per producer
    #[arg(short = 'l', long = "loop", default_value_t = 1000)]
    passes: Sequence,

    /// Claim strategy: 0 = single producer, 1 = multi producer,
    /// 2 = multi producer with availability scan
    #[arg(long = "mt", default_value_t = 0)]
    multi: u8,
}

impl Options {
    fn expected_final_sequence(&self) -> Sequence {
        self.ring_buffer_size as Sequence * self.batch_size * self.passes * self.num_prod as Sequence
            - 1
    }
}

fn consume<C: ClaimStrategy, W: WaitingStrategy>(
    sequencer: &Sequencer<i64, C, W>,
    consumer_sequence: &AtomicSequence,
    expected: Sequence,
) -> i64 {
    let barrier = sequencer.new_barrier(&[]);
    let mut next = FIRST_SEQUENCE_VALUE;
    let mut sum = 0i64;
    let mut empty_scans = 0u32;

    loop {
        let available = match barrier.wait_for_timeout(next, Duration::from_millis(10)) {
            Ok(available) => available,
            Err(_) => continue,
        };

        // The barrier tracks the cursor; for the scan strategy the cursor
        // may run ahead of what is contiguously published.
        let available = sequencer.get_highest_published_sequence(next, available);
        if available < next {
            empty_scans += 1;
            // Otherwise this turns into a busy loop against a slow producer.
            if empty_scans > 10 {
                thread::sleep(Duration::from_micros(1));
            }
            continue;
        }
        empty_scans = 0;

        for sequence in next..=available {
            // SAFETY: published and gated by this consumer's own sequence.
            sum += unsafe { *sequencer.get(sequence) };
        }
        consumer_sequence.set(available);

        if available == expected {
            return sum;
        }
        next = available + 1;
    }
}

fn produce<C: ClaimStrategy, W: WaitingStrategy>(
    sequencer: &Sequencer<i64, C, W>,
    batch_size: Sequence,
    claims: Sequence,
) {
    for _ in 0..claims {
        let end = sequencer
            .claim(batch_size)
            .expect("batch size is validated against the ring before the run");
        for sequence in (end - batch_size + 1)..=end {
            // SAFETY: the batch was claimed above and is not yet published.
            unsafe { *sequencer.get_mut(sequence) = sequence };
        }
        sequencer.publish(end, batch_size);
    }
}

fn run_once<C: ClaimStrategy, W: WaitingStrategy>(wait_label: &str, options: Options) {
    let mut sequencer: Sequencer<i64, C, W> = Sequencer::new(options.ring_buffer_size)
        .expect("ring size is validated before the run");

    let consumer_sequences: Vec<_> = (0..options.num_cons)
        .map(|_| Arc::new(AtomicSequence::default()))
        .collect();
    sequencer.set_gating_sequences(consumer_sequences.clone());

    let expected = options.expected_final_sequence();
    let claims_per_producer = options.ring_buffer_size as Sequence * options.passes;

    let mut sums = vec![0i64; options.num_cons];
    let started = Instant::now();
    thread::scope(|scope| {
        let sequencer = &sequencer;
        for (consumer_sequence, sum) in consumer_sequences.iter().zip(sums.iter_mut()) {
            let consumer_sequence = consumer_sequence.clone();
            scope.spawn(move || *sum = consume(sequencer, &consumer_sequence, expected));
        }
        for _ in 0..options.num_prod {
            scope.spawn(move || produce(sequencer, options.batch_size, claims_per_producer));
        }
    });
    let elapsed = started.elapsed();

    let cursor = sequencer.get_cursor();
    let total_sum: i64 = sums.iter().sum();
    let expected_sum = expected * (expected + 1) / 2 * options.num_cons as i64;
    let ops_per_sec = (cursor + 1) as f64 / elapsed.as_secs_f64();

    println!(
        "{}P-{}C {} | batch {} ring {}",
        options.num_prod, options.num_cons, wait_label, options.batch_size, options.ring_buffer_size
    );
    println!("  cursor: {cursor}");
    println!("  sum: {total_sum} expected: {expected_sum}");
    println!("  {ops_per_sec:.0} ops/sec\n");
}

fn run_all_wait_strategies<C: ClaimStrategy>(options: Options) {
    let pause = Duration::from_millis(500);
    run_once::<C, SleepingWaitStrategy>("sleeping", options);
    thread::sleep(pause);
    run_once::<C, YieldingWaitStrategy>("yielding", options);
    thread::sleep(pause);
    run_once::<C, BusySpinWaitStrategy>("busy-spin", options);
    thread::sleep(pause);
    run_once::<C, BlockingWaitStrategy>("blocking", options);
}

fn main() -> ExitCode {
    let mut options = Options::parse();

    if !options.ring_buffer_size.is_power_of_two() {
        eprintln!("ring buffer size must be a power of two");
        return ExitCode::FAILURE;
    }
    if options.batch_size < 1 || options.batch_size > options.ring_buffer_size as Sequence {
        eprintln!("batch size must be between 1 and the ring buffer size");
        return ExitCode::FAILURE;
    }

    match options.multi {
        0 => {
            // The single-producer strategy does not survive concurrent
            // claimers; don't let the flag combination corrupt the run.
            options.num_prod = 1;
            run_all_wait_strategies::<SingleProducerClaim>(options);
        }
        1 => run_all_wait_strategies::<MultiProducerClaim>(options),
        2 => run_all_wait_strategies::<MultiProducerScanClaim>(options),
        _ => {
            eprintln!("--mt must be 0, 1 or 2");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}
