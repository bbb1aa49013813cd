//! Adaptive spin-then-yield primitive.
//!
//! [`SpinWait`] is the escalation ladder used by retry loops that expect a
//! short wait but must stay schedulable when the wait turns out long. Early
//! steps busy-wait with exponentially growing batches of pause
//! instructions; once the yield threshold is crossed the steps hand the CPU
//! back, cycling through `yield_now`, zero-duration sleeps, and 1 ms sleeps
//! so that lower-priority ready threads can run. Hosts with a single
//! execution unit skip the busy-wait phase entirely, since spinning there
//! can only delay the holder.

use std::hint::spin_loop;
use std::thread;
use std::time::Duration;

use crate::constants::{
    SPIN_BASE, SPIN_SLEEP_ONE_FREQUENCY, SPIN_SLEEP_ZERO_FREQUENCY, YIELD_THRESHOLD,
};
use crate::spinlock::processor_count;

/// Escalating retry pacer.
///
/// Call [`spin_once`](Self::spin_once) between attempts;
/// [`next_spin_will_yield`](Self::next_spin_will_yield) tells the caller
/// whether the coming step leaves the CPU, which is the cheap place to do
/// expensive bookkeeping such as deadline reads.
#[derive(Debug)]
pub struct SpinWait {
    count: u32,
}

impl SpinWait {
    #[inline]
    pub const fn new() -> Self {
        Self { count: 0 }
    }

    /// Steps taken since construction or the last reset.
    #[inline]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Whether the next step will yield or sleep instead of busy-waiting.
    #[inline]
    pub fn next_spin_will_yield(&self) -> bool {
        self.count >= YIELD_THRESHOLD || processor_count() == 1
    }

    /// Performs one escalation step.
    #[inline]
    pub fn spin_once(&mut self) {
        if self.next_spin_will_yield() {
            let yields = self.count.saturating_sub(YIELD_THRESHOLD);
            if yields % SPIN_SLEEP_ONE_FREQUENCY == SPIN_SLEEP_ONE_FREQUENCY - 1 {
                thread::sleep(Duration::from_millis(1));
            } else if yields % SPIN_SLEEP_ZERO_FREQUENCY == SPIN_SLEEP_ZERO_FREQUENCY - 1 {
                thread::sleep(Duration::ZERO);
            } else {
                thread::yield_now();
            }
        } else {
            for _ in 0..(SPIN_BASE << self.count) {
                spin_loop();
            }
        }

        // Saturating back to the threshold keeps long waits in the yield
        // phase instead of restarting the busy-wait ramp.
        self.count = match self.count.checked_add(1) {
            Some(next) => next,
            None => YIELD_THRESHOLD,
        };
    }

    /// Restarts the escalation from the busy-wait phase.
    #[inline]
    pub fn reset(&mut self) {
        self.count = 0;
    }
}

impl Default for SpinWait {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_grows_per_step() {
        let mut spinner = SpinWait::new();
        assert_eq!(spinner.count(), 0);
        for expected in 1..=3 {
            spinner.spin_once();
            assert_eq!(spinner.count(), expected);
        }
    }

    #[test]
    fn yield_threshold_is_reached() {
        let mut spinner = SpinWait::new();
        for _ in 0..YIELD_THRESHOLD {
            spinner.spin_once();
        }
        assert!(spinner.next_spin_will_yield());
    }

    #[test]
    fn reset_restarts_the_escalation() {
        let mut spinner = SpinWait::new();
        for _ in 0..YIELD_THRESHOLD {
            spinner.spin_once();
        }
        spinner.reset();
        assert_eq!(spinner.count(), 0);
        if num_cpus::get() > 1 {
            assert!(!spinner.next_spin_will_yield());
        }
    }
}
