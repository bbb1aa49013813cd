//! `lock_api` wrappers over the anonymous-mode lock.
//!
//! [`RawSpinLock`] adapts [`SpinLock`] to the `lock_api` traits so callers
//! can protect data with an RAII [`Mutex`] instead of bracketing a region
//! by hand. The wrapper always uses the anonymous mode: guard ownership
//! replaces owner tracking, and the mode's misuse errors cannot occur
//! under the trait contract.

use std::time::{Duration, Instant};

use lock_api::{GuardSend, RawMutex, RawMutexTimed};

use crate::spinlock::SpinLock;

/// Raw anonymous-mode spin lock for `lock_api` consumers.
#[repr(align(64))]
pub struct RawSpinLock {
    inner: SpinLock,
}

unsafe impl RawMutex for RawSpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawSpinLock {
        inner: SpinLock::new(false),
    };

    type GuardMarker = GuardSend;

    #[inline]
    fn lock(&self) {
        // Anonymous acquisition with an indefinite wait cannot fail.
        let _ = self.inner.acquire();
    }

    #[inline]
    fn try_lock(&self) -> bool {
        matches!(self.inner.try_acquire(), Ok(true))
    }

    #[inline]
    unsafe fn unlock(&self) {
        let _ = self.inner.release_relaxed();
    }

    #[inline]
    fn is_locked(&self) -> bool {
        self.inner.is_held()
    }
}

unsafe impl RawMutexTimed for RawSpinLock {
    type Duration = Duration;
    type Instant = Instant;

    #[inline]
    fn try_lock_for(&self, timeout: Duration) -> bool {
        matches!(self.inner.try_acquire_for(timeout), Ok(true))
    }

    #[inline]
    fn try_lock_until(&self, deadline: Instant) -> bool {
        matches!(self.inner.try_acquire_until(deadline), Ok(true))
    }
}

/// Mutual exclusion wrapper backed by [`RawSpinLock`].
pub type Mutex<T> = lock_api::Mutex<RawSpinLock, T>;

/// RAII guard for [`Mutex`].
pub type MutexGuard<'a, T> = lock_api::MutexGuard<'a, RawSpinLock, T>;
