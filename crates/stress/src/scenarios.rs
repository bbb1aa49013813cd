//! Contention scenarios over the taglock primitives.
//!
//! Each scenario drives the public lock API from many threads and verifies
//! an observable property: no lost updates under mutual exclusion, bounded
//! waits under timeouts, and sustained acquire/release throughput.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use indicatif::ProgressBar;
use taglock_core::SpinLock;

use crate::report;

const PROGRESS_CHUNK: u64 = 4096;

/// Plain (non-atomic) counter guarded by the lock under test. Lost updates
/// here mean the lock failed to exclude.
struct GuardedCounter {
    lock: SpinLock,
    value: UnsafeCell<u64>,
}

unsafe impl Sync for GuardedCounter {}

impl GuardedCounter {
    fn new(track_owner: bool) -> Self {
        Self {
            lock: SpinLock::new(track_owner),
            value: UnsafeCell::new(0),
        }
    }

    fn add_one(&self) -> taglock_core::Result<()> {
        self.lock.acquire()?;
        unsafe { *self.value.get() += 1 };
        self.lock.release()
    }

    /// Only valid once every worker has been joined.
    fn value(&self) -> u64 {
        unsafe { *self.value.get() }
    }
}

fn run_exclusion_worker(
    counter: &GuardedCounter,
    progress: &AtomicU64,
    iterations: u64,
) -> taglock_core::Result<()> {
    let mut reported = 0;
    for i in 1..=iterations {
        counter.add_one()?;
        if i % PROGRESS_CHUNK == 0 {
            progress.fetch_add(PROGRESS_CHUNK, Ordering::Relaxed);
            reported += PROGRESS_CHUNK;
        }
    }
    progress.fetch_add(iterations - reported, Ordering::Relaxed);
    Ok(())
}

pub fn exclusion(threads: usize, iterations: u64, tracked: bool) -> Result<()> {
    report::headline(if tracked {
        "exclusion: owner-tracking mode"
    } else {
        "exclusion: anonymous mode"
    });

    let expected = (threads as u64)
        .checked_mul(iterations)
        .context("thread count times iterations overflows")?;
    let counter = GuardedCounter::new(tracked);
    let progress = AtomicU64::new(0);
    let finished = AtomicU64::new(0);
    let bar = ProgressBar::new(expected);
    let started = Instant::now();

    let outcome: Result<()> = thread::scope(|scope| {
        let workers: Vec<_> = (0..threads)
            .map(|_| {
                scope.spawn(|| {
                    let result = run_exclusion_worker(&counter, &progress, iterations);
                    finished.fetch_add(1, Ordering::Relaxed);
                    result
                })
            })
            .collect();

        while finished.load(Ordering::Relaxed) < threads as u64 {
            bar.set_position(progress.load(Ordering::Relaxed));
            thread::sleep(Duration::from_millis(25));
        }

        for worker in workers {
            match worker.join() {
                Ok(result) => result?,
                Err(_) => bail!("a worker thread panicked"),
            }
        }
        Ok(())
    });
    bar.finish_and_clear();
    outcome?;

    let value = counter.value();
    report::count("threads", threads as u64);
    report::count("increments", value);
    report::elapsed("elapsed", started.elapsed());
    report::rate("increment rate", value, started.elapsed());

    if value == expected {
        report::pass("no lost updates");
        Ok(())
    } else {
        report::fail("the counter lost updates under contention");
        bail!("counted {value}, expected {expected}");
    }
}

pub fn timeout(waiters: usize, hold_ms: u64, timeout_ms: u64) -> Result<()> {
    report::headline("timeout: waiters against a held lock");

    let timeout = i64::try_from(timeout_ms).context("timeout-ms does not fit a millisecond budget")?;
    let lock = SpinLock::new(false);
    lock.acquire()?;

    let started = Instant::now();
    let slowest_wait_us = AtomicU64::new(0);
    let acquired_count = AtomicU64::new(0);

    thread::scope(|scope| {
        for _ in 0..waiters {
            scope.spawn(|| {
                let wait_started = Instant::now();
                let acquired = matches!(lock.try_acquire_ms(timeout), Ok(true));
                let waited_us = wait_started.elapsed().as_micros() as u64;
                slowest_wait_us.fetch_max(waited_us, Ordering::Relaxed);
                if acquired {
                    acquired_count.fetch_add(1, Ordering::Relaxed);
                    let _ = lock.release();
                }
            });
        }

        thread::sleep(Duration::from_millis(hold_ms));
        let _ = lock.release();
    });

    let acquired = acquired_count.load(Ordering::Relaxed);
    report::count("waiters", waiters as u64);
    report::count("timed out", waiters as u64 - acquired);
    report::elapsed(
        "slowest wait",
        Duration::from_micros(slowest_wait_us.load(Ordering::Relaxed)),
    );
    report::elapsed("elapsed", started.elapsed());

    if acquired > 0 {
        report::fail("a waiter acquired a lock that should have stayed held");
        bail!("{acquired} waiter(s) slipped past a {timeout_ms} ms budget on a {hold_ms} ms hold");
    }
    if lock.is_held() {
        report::fail("the lock is still held after the holder released it");
        bail!("timed-out waiters corrupted the lock state");
    }
    if !lock.try_acquire()? {
        bail!("the drained lock refused a fresh acquisition");
    }
    lock.release()?;

    report::pass("every waiter timed out and the lock drained cleanly");
    Ok(())
}

pub fn throughput(threads: usize, duration_ms: u64, tracked: bool) -> Result<()> {
    report::headline(if tracked {
        "throughput: owner-tracking mode"
    } else {
        "throughput: anonymous mode"
    });

    let lock = SpinLock::new(tracked);
    let stop = AtomicBool::new(false);
    let total_ops = AtomicU64::new(0);
    let bar = ProgressBar::new(duration_ms);

    thread::scope(|scope| {
        for _ in 0..threads {
            scope.spawn(|| {
                let mut ops: u64 = 0;
                while !stop.load(Ordering::Relaxed) {
                    if lock.acquire().is_ok() && lock.release().is_ok() {
                        ops += 1;
                    }
                }
                total_ops.fetch_add(ops, Ordering::Relaxed);
            });
        }

        let started = Instant::now();
        while started.elapsed() < Duration::from_millis(duration_ms) {
            bar.set_position(started.elapsed().as_millis() as u64);
            thread::sleep(Duration::from_millis(25));
        }
        stop.store(true, Ordering::Relaxed);
    });
    bar.finish_and_clear();

    let ops = total_ops.load(Ordering::Relaxed);
    report::count("threads", threads as u64);
    report::count("operations", ops);
    report::rate("throughput", ops, Duration::from_millis(duration_ms));
    report::pass("measurement complete");
    Ok(())
}
