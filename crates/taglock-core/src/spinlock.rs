//! Dual-mode spin lock.
//!
//! [`SpinLock`] packs its entire state into one `AtomicU32` and guards
//! itself: every transition is a compare-and-swap or an atomic
//! add/subtract, never a separate mutex. The mode chosen at construction
//! decides what the word means. With owner tracking the word carries the
//! holding thread's tag, so recursion and mismatched releases are detected
//! and ownership can be queried. Anonymous mode drops the bookkeeping for a
//! cheaper handoff and instead uses the spare bits as a saturating waiter
//! counter, a turn-based heuristic that spreads out the spinning of queued
//! waiters.
//!
//! The lock is intended for critical sections of a few instructions.
//! Holding it across a blocking call, an allocation, or a call into
//! untrusted code is not detected but will stall every spinning waiter.

use std::cell::Cell;
use std::fmt;
use std::hint::spin_loop;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::constants::{
    DEADLINE_CHECK_FREQUENCY, SLEEP_ONE_FREQUENCY, SLEEP_ZERO_FREQUENCY, SPINNING_FACTOR,
};
use crate::region;
use crate::spin_wait::SpinWait;
use crate::types::{LockError, Result, Wait};
use crate::word::LockWord;

/// Host CPU count, read once.
pub(crate) fn processor_count() -> usize {
    static CPUS: OnceLock<usize> = OnceLock::new();
    *CPUS.get_or_init(|| num_cpus::get().max(1))
}

/// Tag source for owner tracking. Tags stay within the 31 owner bits and
/// wrap back to 1, so a collision needs 2^31 - 1 thread births.
static NEXT_THREAD_TAG: AtomicU32 = AtomicU32::new(1);

thread_local! {
    static THREAD_TAG: Cell<u32> = const { Cell::new(0) };
}

fn mint_thread_tag() -> u32 {
    let mut current = NEXT_THREAD_TAG.load(Ordering::Relaxed);
    loop {
        let next = if current == LockWord::OWNER_MASK {
            1
        } else {
            current + 1
        };
        match NEXT_THREAD_TAG.compare_exchange_weak(
            current,
            next,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(tag) => return tag,
            Err(observed) => current = observed,
        }
    }
}

/// The calling thread's owner tag, minted on first use.
fn current_thread_tag() -> u32 {
    THREAD_TAG.with(|slot| {
        let mut tag = slot.get();
        if tag == 0 {
            tag = mint_thread_tag();
            slot.set(tag);
        }
        tag
    })
}

/// Busy-waits for roughly `iterations` pause instructions.
#[inline]
fn pause(iterations: u64) {
    for _ in 0..iterations {
        spin_loop();
    }
}

/// A mutual-exclusion primitive that spins instead of blocking.
///
/// Construct with [`new`](Self::new), choosing the ownership mode for the
/// lifetime of the lock. Acquire with [`acquire`](Self::acquire) or one of
/// the bounded [`try_acquire`](Self::try_acquire) variants, then call
/// [`release`](Self::release). The lock contains an atomic and is therefore
/// neither `Clone` nor `Copy`; share it by reference (or `Arc`), never by
/// duplicating it after use.
///
/// Misuse is reported through [`LockError`]; contention never is. See the
/// [module documentation](self) for the intended usage envelope.
pub struct SpinLock {
    word: AtomicU32,
}

impl SpinLock {
    /// Creates an unheld lock.
    ///
    /// With `track_owner` the lock records the holder's thread tag, which
    /// enables [`is_held_by_current_thread`](Self::is_held_by_current_thread)
    /// and turns recursive acquisition and mismatched release into
    /// reported errors. Without it the lock is anonymous: acquisition and
    /// release are cheaper, and none of those misuses can be detected.
    #[must_use]
    pub const fn new(track_owner: bool) -> Self {
        let initial = if track_owner {
            LockWord::UNHELD_TRACKED
        } else {
            LockWord::UNHELD_ANONYMOUS
        };
        Self {
            word: AtomicU32::new(initial.raw()),
        }
    }

    /// Acquires the lock, waiting as long as it takes.
    ///
    /// Fails with [`LockError::RecursiveAcquisition`] when an
    /// owner-tracking lock is re-entered by its holder; an anonymous lock
    /// cannot detect that situation and will spin forever instead.
    #[inline]
    pub fn acquire(&self) -> Result<()> {
        // An indefinite wait only returns on success or misuse.
        self.acquire_with(Wait::Indefinite).map(|_| ())
    }

    /// Makes a single acquisition attempt without entering the spin phases.
    #[inline]
    pub fn try_acquire(&self) -> Result<bool> {
        self.acquire_with(Wait::Immediate)
    }

    /// Acquires with a millisecond budget, following the -1-means-infinite
    /// contract.
    ///
    /// Returns `Ok(false)` when the budget expires, and
    /// [`LockError::InvalidTimeout`] for any negative value other than -1.
    #[inline]
    pub fn try_acquire_ms(&self, timeout_ms: i64) -> Result<bool> {
        self.acquire_with(Wait::from_ms(timeout_ms)?)
    }

    /// Acquires with a [`Duration`] budget. A zero budget makes a single
    /// attempt.
    #[inline]
    pub fn try_acquire_for(&self, timeout: Duration) -> Result<bool> {
        self.acquire_with(Wait::from_duration(timeout))
    }

    /// Acquires with an absolute deadline.
    #[inline]
    pub fn try_acquire_until(&self, deadline: Instant) -> Result<bool> {
        self.acquire_with(Wait::from_deadline(deadline))
    }

    /// Fast path plus slow-path dispatch.
    #[inline]
    fn acquire_with(&self, wait: Wait) -> Result<bool> {
        region::enter();

        // The inline path handles exactly one case: an anonymous lock
        // observed unheld. Everything else is the slow path's problem.
        let observed = self.read();
        if !observed.owner_tracking_enabled()
            && !observed.is_held()
            && self.try_transition(observed, observed.with_held())
        {
            return Ok(true);
        }

        let outcome = self.acquire_slow(wait);
        if !matches!(outcome, Ok(true)) {
            region::exit();
        }
        outcome
    }

    #[cold]
    fn acquire_slow(&self, wait: Wait) -> Result<bool> {
        if self.is_owner_tracking_enabled() {
            self.acquire_tracked(wait)
        } else {
            Ok(self.acquire_untracked(wait))
        }
    }

    /// Anonymous slow path: register, spin by turn, then yield.
    fn acquire_untracked(&self, wait: Wait) -> bool {
        let mut turn = None;

        // Phase 1: take the lock directly or register as a waiter. A zero
        // budget gets its single attempt and leaves before registering.
        let observed = self.read();
        if !observed.is_held() {
            if self.try_transition(observed, observed.with_held()) {
                return true;
            }
            if matches!(wait, Wait::Immediate) {
                return false;
            }
        } else if matches!(wait, Wait::Immediate) {
            return false;
        } else if !observed.waiters_saturated() {
            turn = Some(self.register_waiter());
        }

        // Phase 2: bounded spin, scaled by this waiter's turn so that
        // earlier arrivals poll harder. Turns at or beyond the CPU count
        // skip straight to yielding; spinning cannot help them.
        let cpus = processor_count() as u32;
        if let Some(turn) = turn
            && turn < cpus
        {
            let mut process_factor: u64 = 1;
            for i in 1..=turn * SPINNING_FACTOR {
                pause(u64::from(turn + i) * u64::from(SPINNING_FACTOR) * process_factor);
                if process_factor < u64::from(cpus) {
                    process_factor += 1;
                }
                if self.try_take_as_waiter() {
                    return true;
                }
            }
        }

        // Phase boundary: give up before the yield loop if the budget is
        // already spent.
        if wait.expired() {
            self.rollback_waiter(turn);
            return false;
        }

        // Phase 3: yield between attempts, escalating to sleeps so the
        // scheduler can run whoever holds the lock. The deadline is read on
        // a fixed cadence rather than every iteration; timer reads are not
        // free.
        let mut yields: u32 = 1;
        loop {
            if self.try_take_as_waiter() {
                return true;
            }

            if yields % SLEEP_ONE_FREQUENCY == 0 {
                thread::sleep(Duration::from_millis(1));
            } else if yields % SLEEP_ZERO_FREQUENCY == 0 {
                thread::sleep(Duration::ZERO);
            } else {
                thread::yield_now();
            }

            if yields % DEADLINE_CHECK_FREQUENCY == 0 && wait.expired() {
                self.rollback_waiter(turn);
                return false;
            }
            yields = yields.wrapping_add(1);
        }
    }

    /// Owner-tracking slow path: recursion check, then adaptive spin.
    fn acquire_tracked(&self, wait: Wait) -> Result<bool> {
        let tag = current_thread_tag();
        if self.read().owner_tag() == tag {
            return Err(LockError::RecursiveAcquisition);
        }

        let held = LockWord::from_raw(tag);
        let mut spinner = SpinWait::new();
        loop {
            spinner.spin_once();

            if !self.read().is_held() && self.try_transition(LockWord::UNHELD_TRACKED, held) {
                return Ok(true);
            }

            match wait {
                Wait::Immediate => return Ok(false),
                // The deadline is only consulted on steps that are about
                // to yield, amortizing the timer reads over the cheap
                // spins.
                _ if spinner.next_spin_will_yield() && wait.expired() => return Ok(false),
                _ => {}
            }
        }
    }

    /// Releases the lock with sequentially consistent ordering.
    ///
    /// On an owner-tracking lock the caller must be the recorded holder;
    /// anything else, including releasing an unheld lock, fails with
    /// [`LockError::OwnerMismatch`] and leaves the state untouched. An
    /// anonymous lock performs no check: releasing it without holding it
    /// breaks the contract undetected and can clobber concurrent waiter
    /// registrations.
    #[inline]
    pub fn release(&self) -> Result<()> {
        self.release_with(true)
    }

    /// Releases the lock with `Release`-only ordering.
    ///
    /// Cheaper than [`release`](Self::release); the handoff still
    /// happens-before the next acquisition, but publication to currently
    /// spinning threads may be observed later. Same ownership contract as
    /// [`release`](Self::release).
    #[inline]
    pub fn release_relaxed(&self) -> Result<()> {
        self.release_with(false)
    }

    fn release_with(&self, strong: bool) -> Result<()> {
        if self.is_owner_tracking_enabled() {
            if self.read().owner_tag() != current_thread_tag() {
                return Err(LockError::OwnerMismatch);
            }
            if strong {
                self.word
                    .swap(LockWord::UNHELD_TRACKED.raw(), Ordering::SeqCst);
            } else {
                self.word
                    .store(LockWord::UNHELD_TRACKED.raw(), Ordering::Release);
            }
        } else if strong {
            // The held flag is bit 0, so the decrement clears it without
            // touching the waiter bits.
            self.word.fetch_sub(LockWord::HELD_BIT, Ordering::SeqCst);
        } else {
            self.word
                .fetch_and(!LockWord::HELD_BIT, Ordering::Release);
        }
        region::exit();
        Ok(())
    }

    /// Whether any thread currently holds the lock.
    ///
    /// A relaxed read with no ordering guarantee; the answer can be stale
    /// by the time the caller acts on it.
    #[inline]
    pub fn is_held(&self) -> bool {
        self.read().is_held()
    }

    /// Whether the calling thread holds the lock.
    ///
    /// Fails with [`LockError::OwnerTrackingDisabled`] on an anonymous
    /// lock, which has no owner to compare against.
    #[inline]
    pub fn is_held_by_current_thread(&self) -> Result<bool> {
        let observed = self.read();
        if !observed.owner_tracking_enabled() {
            return Err(LockError::OwnerTrackingDisabled);
        }
        Ok(observed.owner_tag() == current_thread_tag())
    }

    /// Whether this lock records its owner.
    #[inline]
    pub fn is_owner_tracking_enabled(&self) -> bool {
        self.read().owner_tracking_enabled()
    }

    #[inline(always)]
    fn read(&self) -> LockWord {
        LockWord::from_raw(self.word.load(Ordering::Relaxed))
    }

    #[inline]
    fn try_transition(&self, from: LockWord, to: LockWord) -> bool {
        self.word
            .compare_exchange(from.raw(), to.raw(), Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    fn try_transition_weak(&self, from: LockWord, to: LockWord) -> bool {
        self.word
            .compare_exchange_weak(from.raw(), to.raw(), Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// One free-check plus the combined take-and-deregister update.
    ///
    /// The waiter decrement is clamped: when the counter reads zero it is
    /// left alone, because a mismatched relaxed release may have wiped
    /// registrations and the counter must never underflow into the mode
    /// bit.
    #[inline]
    fn try_take_as_waiter(&self) -> bool {
        let observed = self.read();
        if observed.is_held() {
            return false;
        }
        let next = if observed.waiters() == 0 {
            observed.with_held()
        } else {
            observed.with_one_less_waiter().with_held()
        };
        self.try_transition_weak(observed, next)
    }

    /// Registers the caller in the waiter counter and returns its 1-based
    /// turn.
    #[inline]
    fn register_waiter(&self) -> u32 {
        let updated =
            self.word.fetch_add(LockWord::WAITER_UNIT, Ordering::Relaxed) + LockWord::WAITER_UNIT;
        LockWord::from_raw(updated).waiters()
    }

    /// Compensating decrement after a timed-out registration.
    ///
    /// Skipped when nothing was registered, and also when the counter
    /// already reads zero: a concurrent malformed release can reset it,
    /// and decrementing past zero would corrupt the word. That reset case
    /// is a known contract-violation edge, not something this path can
    /// repair.
    fn rollback_waiter(&self, turn: Option<u32>) {
        if turn.is_none() {
            return;
        }
        let mut spinner = SpinWait::new();
        loop {
            let observed = self.read();
            if observed.waiters() == 0 {
                return;
            }
            if self
                .word
                .compare_exchange_weak(
                    observed.raw(),
                    observed.with_one_less_waiter().raw(),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                return;
            }
            spinner.spin_once();
        }
    }

    /// Diagnostic reader for the anonymous waiter counter.
    #[cfg(test)]
    pub(crate) fn waiters(&self) -> u32 {
        self.read().waiters()
    }
}

impl Default for SpinLock {
    /// An owner-tracking lock, matching the all-zero word.
    fn default() -> Self {
        Self::new(true)
    }
}

impl fmt::Debug for SpinLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = self.read();
        f.debug_struct("SpinLock")
            .field("owner_tracking", &word.owner_tracking_enabled())
            .field("held", &word.is_held())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_tags_are_nonzero_stable_and_distinct() {
        let first = current_thread_tag();
        assert_ne!(first, 0);
        assert_eq!(current_thread_tag(), first);
        assert_eq!(first & LockWord::ANONYMOUS_BIT, 0);

        let other = thread::spawn(current_thread_tag).join().unwrap();
        assert_ne!(other, 0);
        assert_ne!(other, first);
    }

    #[test]
    fn timed_out_waiters_drain_the_counter() {
        let lock = SpinLock::new(false);
        lock.acquire().unwrap();

        thread::scope(|scope| {
            let waiters: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| lock.try_acquire_ms(100).unwrap()))
                .collect();
            for waiter in waiters {
                assert!(!waiter.join().unwrap());
            }
        });

        assert_eq!(lock.waiters(), 0);
        lock.release().unwrap();
        assert!(!lock.is_held());
        assert_eq!(lock.try_acquire(), Ok(true));
        lock.release().unwrap();
    }

    #[test]
    fn debug_output_reflects_the_state() {
        let lock = SpinLock::new(true);
        assert_eq!(
            format!("{lock:?}"),
            "SpinLock { owner_tracking: true, held: false }"
        );
        lock.acquire().unwrap();
        assert_eq!(
            format!("{lock:?}"),
            "SpinLock { owner_tracking: true, held: true }"
        );
        lock.release().unwrap();
    }
}
