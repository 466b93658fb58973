use std::hint;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, RingflowError};
use crate::sequence::{AtomicSequence, Sequence};
use crate::traits::WaitingStrategy;
use crate::utils::Utils;

fn deadline_after(timeout: Option<Duration>) -> Option<Instant> {
    timeout.map(|timeout| Instant::now() + timeout)
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

/// Tight read loop. Lowest latency, burns a full core per waiter.
#[derive(Default)]
pub struct BusySpinWaitStrategy;

impl WaitingStrategy for BusySpinWaitStrategy {
    fn wait_for<F: Fn() -> bool>(
        &self,
        sequence: Sequence,
        dependencies: &[Arc<AtomicSequence>],
        check_alert: F,
        timeout: Option<Duration>,
    ) -> Result<Sequence> {
        let deadline = deadline_after(timeout);
        loop {
            let minimum_sequence = Utils::get_minimum_sequence(dependencies);
            if minimum_sequence >= sequence {
                return Ok(minimum_sequence);
            }
            if check_alert() {
                return Err(RingflowError::Alerted);
            }
            if expired(deadline) {
                return Err(RingflowError::TimedOut);
            }
        }
    }

    fn signal_all_when_blocking(&self) {}
}

/// Spins for a bounded number of tries, then yields the scheduler on every
/// further miss.
pub struct YieldingWaitStrategy {
    spin_tries: u32,
}

impl YieldingWaitStrategy {
    pub fn new(spin_tries: u32) -> Self {
        Self { spin_tries }
    }
}

impl Default for YieldingWaitStrategy {
    fn default() -> Self {
        Self::new(100)
    }
}

impl WaitingStrategy for YieldingWaitStrategy {
    fn wait_for<F: Fn() -> bool>(
        &self,
        sequence: Sequence,
        dependencies: &[Arc<AtomicSequence>],
        check_alert: F,
        timeout: Option<Duration>,
    ) -> Result<Sequence> {
        let deadline = deadline_after(timeout);
        let mut counter = self.spin_tries;
        loop {
            let minimum_sequence = Utils::get_minimum_sequence(dependencies);
            if minimum_sequence >= sequence {
                return Ok(minimum_sequence);
            }
            if check_alert() {
                return Err(RingflowError::Alerted);
            }
            if expired(deadline) {
                return Err(RingflowError::TimedOut);
            }

            if counter > 0 {
                counter -= 1;
                hint::spin_loop();
            } else {
                thread::yield_now();
            }
        }
    }

    fn signal_all_when_blocking(&self) {}
}

/// Spins briefly, then sleeps per miss. Near-zero CPU while idle at the
/// price of wake-up latency in the order of the sleep duration.
pub struct SleepingWaitStrategy {
    spin_tries: u32,
    sleep: Duration,
}

impl SleepingWaitStrategy {
    pub fn new(spin_tries: u32, sleep: Duration) -> Self {
        Self { spin_tries, sleep }
    }
}

impl Default for SleepingWaitStrategy {
    fn default() -> Self {
        Self::new(200, Duration::from_micros(1))
    }
}

impl WaitingStrategy for SleepingWaitStrategy {
    fn wait_for<F: Fn() -> bool>(
        &self,
        sequence: Sequence,
        dependencies: &[Arc<AtomicSequence>],
        check_alert: F,
        timeout: Option<Duration>,
    ) -> Result<Sequence> {
        let deadline = deadline_after(timeout);
        let mut counter = self.spin_tries;
        loop {
            let minimum_sequence = Utils::get_minimum_sequence(dependencies);
            if minimum_sequence >= sequence {
                return Ok(minimum_sequence);
            }
            if check_alert() {
                return Err(RingflowError::Alerted);
            }
            if expired(deadline) {
                return Err(RingflowError::TimedOut);
            }

            if counter > 0 {
                counter -= 1;
                hint::spin_loop();
            } else {
                thread::sleep(self.sleep);
            }
        }
    }

    fn signal_all_when_blocking(&self) {}
}

/// Parks waiters on a condition variable until a publisher signals.
///
/// Waiters re-check the dependency minimum and the alert flag while
/// holding the mutex before parking, and publishers notify while holding
/// the same mutex, so an edge-triggered notification cannot fall between a
/// waiter's check and its park.
#[derive(Default)]
pub struct BlockingWaitStrategy {
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl WaitingStrategy for BlockingWaitStrategy {
    fn wait_for<F: Fn() -> bool>(
        &self,
        sequence: Sequence,
        dependencies: &[Arc<AtomicSequence>],
        check_alert: F,
        timeout: Option<Duration>,
    ) -> Result<Sequence> {
        let deadline = deadline_after(timeout);
        loop {
            let minimum_sequence = Utils::get_minimum_sequence(dependencies);
            if minimum_sequence >= sequence {
                return Ok(minimum_sequence);
            }
            if check_alert() {
                return Err(RingflowError::Alerted);
            }
            if expired(deadline) {
                return Err(RingflowError::TimedOut);
            }

            let mut guard = self.mutex.lock();
            // The state may have moved between the unlocked check and the
            // lock; park only against a verified-stale view.
            let minimum_sequence = Utils::get_minimum_sequence(dependencies);
            if minimum_sequence >= sequence {
                return Ok(minimum_sequence);
            }
            if check_alert() {
                return Err(RingflowError::Alerted);
            }
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(RingflowError::TimedOut);
                    }
                    self.condvar.wait_for(&mut guard, deadline - now);
                }
                None => self.condvar.wait(&mut guard),
            }
        }
    }

    fn signal_all_when_blocking(&self) {
        let _guard = self.mutex.lock();
        self.condvar.notify_all();
    }
}
