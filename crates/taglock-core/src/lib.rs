//! Spin-based mutual exclusion for very short critical sections.
//!
//! The primary type is [`SpinLock`], a single-word lock with two ownership
//! modes fixed at construction:
//!
//! * **Owner tracking**: the lock records a per-thread tag, which enables
//!   recursion detection, ownership queries, and mismatched-release checks.
//! * **Anonymous**: no owner bookkeeping, lower overhead, and a saturating
//!   waiter counter used as a fairness heuristic under contention.
//!
//! Acquisition is tiered: a single inline compare-and-swap, then a bounded
//! spin scaled by the waiter's turn, then a cooperative yield/sleep loop,
//! all bounded by an optional timeout. [`SpinWait`] exposes the adaptive
//! spin-then-yield step used by the owner-tracking path.
//!
//! For protecting data rather than a region of code, [`Mutex`] wraps an
//! anonymous-mode lock through `lock_api` and hands out RAII guards.
//!
//! Locks here trade CPU for latency. Keep critical sections to a handful of
//! instructions, never hold a lock across a blocking call, and prefer
//! [`std::sync::Mutex`] whenever the protected work is not trivially short.

pub mod constants;
pub mod mutex;
pub mod region;
pub mod spin_wait;
pub mod spinlock;
pub mod types;

mod word;

pub use mutex::{Mutex, MutexGuard, RawSpinLock};
pub use region::{RegionHooks, install_region_hooks};
pub use spin_wait::SpinWait;
pub use spinlock::SpinLock;
pub use types::{LockError, Result};
