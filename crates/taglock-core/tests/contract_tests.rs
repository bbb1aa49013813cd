use std::thread;
use std::time::{Duration, Instant};

use taglock_core::{LockError, SpinLock};

#[test]
fn rejects_timeouts_below_infinite() {
    let lock = SpinLock::new(false);
    assert_eq!(lock.try_acquire_ms(-2), Err(LockError::InvalidTimeout(-2)));
    assert_eq!(
        lock.try_acquire_ms(i64::MIN),
        Err(LockError::InvalidTimeout(i64::MIN))
    );
    assert!(!lock.is_held());
}

#[test]
fn infinite_millisecond_timeout_acquires() {
    let lock = SpinLock::new(false);
    assert_eq!(lock.try_acquire_ms(-1), Ok(true));
    assert!(lock.is_held());
    lock.release().unwrap();
}

#[test]
fn recursion_is_rejected_without_corruption() {
    let lock = SpinLock::new(true);
    lock.acquire().unwrap();

    assert_eq!(lock.acquire(), Err(LockError::RecursiveAcquisition));
    assert_eq!(
        lock.try_acquire_ms(10),
        Err(LockError::RecursiveAcquisition)
    );

    // The rejected re-entries must leave the lock usable.
    assert!(lock.is_held());
    assert!(lock.is_held_by_current_thread().unwrap());
    lock.release().unwrap();
    assert!(!lock.is_held());
}

#[test]
fn mismatched_release_is_rejected() {
    let lock = SpinLock::new(true);
    lock.acquire().unwrap();

    thread::scope(|scope| {
        scope.spawn(|| {
            assert_eq!(lock.release(), Err(LockError::OwnerMismatch));
            assert!(!lock.is_held_by_current_thread().unwrap());
        });
    });

    assert!(lock.is_held());
    assert!(lock.is_held_by_current_thread().unwrap());
    lock.release().unwrap();
}

#[test]
fn releasing_an_unheld_tracked_lock_is_rejected() {
    let lock = SpinLock::new(true);
    assert_eq!(lock.release(), Err(LockError::OwnerMismatch));
    assert_eq!(lock.release_relaxed(), Err(LockError::OwnerMismatch));
}

#[test]
fn zero_timeout_fails_fast_on_a_held_lock() {
    for track_owner in [false, true] {
        let lock = SpinLock::new(track_owner);
        lock.acquire().unwrap();

        thread::scope(|scope| {
            scope.spawn(|| {
                let start = Instant::now();
                assert_eq!(lock.try_acquire_ms(0), Ok(false));
                assert_eq!(lock.try_acquire(), Ok(false));
                assert!(start.elapsed() < Duration::from_millis(250));
            });
        });

        lock.release().unwrap();
    }
}

#[test]
fn short_timeout_expires_on_a_held_lock() {
    let lock = SpinLock::new(false);
    lock.acquire().unwrap();

    thread::scope(|scope| {
        scope.spawn(|| {
            assert_eq!(lock.try_acquire_for(Duration::from_millis(20)), Ok(false));
            assert_eq!(
                lock.try_acquire_until(Instant::now() + Duration::from_millis(20)),
                Ok(false)
            );
        });
    });

    lock.release().unwrap();
}

#[test]
fn ownership_queries_require_tracking() {
    let lock = SpinLock::new(false);
    assert_eq!(
        lock.is_held_by_current_thread(),
        Err(LockError::OwnerTrackingDisabled)
    );
    assert!(!lock.is_owner_tracking_enabled());

    let tracked = SpinLock::new(true);
    assert!(tracked.is_owner_tracking_enabled());
    assert!(!tracked.is_held_by_current_thread().unwrap());
}

#[test]
fn introspection_does_not_mutate() {
    let lock = SpinLock::new(false);
    for _ in 0..3 {
        assert!(!lock.is_held());
        assert!(!lock.is_owner_tracking_enabled());
    }

    lock.acquire().unwrap();
    for _ in 0..3 {
        assert!(lock.is_held());
    }
    lock.release().unwrap();
    assert!(!lock.is_held());
}

#[test]
fn relaxed_release_allows_reacquisition() {
    for track_owner in [false, true] {
        let lock = SpinLock::new(track_owner);
        lock.acquire().unwrap();
        lock.release_relaxed().unwrap();
        assert!(!lock.is_held());
        lock.acquire().unwrap();
        lock.release().unwrap();
    }
}

#[test]
fn default_lock_tracks_its_owner() {
    let lock = SpinLock::default();
    assert!(lock.is_owner_tracking_enabled());
    assert!(!lock.is_held());
}
