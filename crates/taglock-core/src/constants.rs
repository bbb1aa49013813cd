//! Global tuning constants.

/// Iteration multiplier for the anonymous-mode bounded spin phase.
pub const SPINNING_FACTOR: u32 = 100;

/// Yield-loop cadence at which a waiter escalates to a 1 ms sleep.
pub const SLEEP_ONE_FREQUENCY: u32 = 40;

/// Yield-loop cadence at which a waiter escalates to a zero-duration sleep.
pub const SLEEP_ZERO_FREQUENCY: u32 = 10;

/// Yield-loop cadence at which the deadline is re-validated.
pub const DEADLINE_CHECK_FREQUENCY: u32 = 10;

/// `SpinWait` steps below this count busy-wait; later steps leave the CPU.
pub const YIELD_THRESHOLD: u32 = 10;

/// Pause instructions issued by the first `SpinWait` step; doubles per step.
pub const SPIN_BASE: u32 = 4;

/// `SpinWait` yield-phase cadence for zero-duration sleeps.
pub const SPIN_SLEEP_ZERO_FREQUENCY: u32 = 5;

/// `SpinWait` yield-phase cadence for 1 ms sleeps.
pub const SPIN_SLEEP_ONE_FREQUENCY: u32 = 20;

/// Millisecond timeout value meaning "wait forever".
pub const INFINITE_TIMEOUT_MS: i64 = -1;
