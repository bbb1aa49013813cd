//! Common types: misuse errors and acquisition wait budgets.

use std::error::Error;
use std::fmt;
use std::time::{Duration, Instant};

use crate::constants::INFINITE_TIMEOUT_MS;

/// Errors surfaced on lock misuse.
///
/// Every variant is a programmer error and is reported immediately; none is
/// retried internally. Transient contention is never an error: a timed-out
/// acquisition is the non-error `Ok(false)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockError {
    /// A millisecond timeout below -1 was passed. -1 means infinite; any
    /// other negative value has no meaning.
    InvalidTimeout(i64),

    /// An owner-tracking lock was re-entered by the thread that holds it.
    RecursiveAcquisition,

    /// An owner-tracking lock was released by a thread that does not hold
    /// it (including release of an unheld lock).
    OwnerMismatch,

    /// An ownership query was made against an anonymous lock.
    OwnerTrackingDisabled,
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockError::InvalidTimeout(ms) => write!(
                f,
                "invalid timeout {ms} ms; expected -1 (infinite) or a non-negative value"
            ),
            LockError::RecursiveAcquisition => {
                write!(f, "lock is already held by the current thread")
            }
            LockError::OwnerMismatch => write!(f, "lock is not held by the current thread"),
            LockError::OwnerTrackingDisabled => {
                write!(f, "owner tracking is disabled for this lock")
            }
        }
    }
}

impl Error for LockError {}

/// Crate result alias.
pub type Result<T> = std::result::Result<T, LockError>;

/// How long an acquisition attempt may wait.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Wait {
    /// A single attempt with no spin phases.
    Immediate,

    /// Spin until the deadline passes.
    Until(Instant),

    /// Spin until acquired.
    Indefinite,
}

impl Wait {
    /// Classifies a millisecond timeout following the -1-means-infinite
    /// contract.
    pub(crate) fn from_ms(timeout_ms: i64) -> Result<Self> {
        match timeout_ms {
            INFINITE_TIMEOUT_MS => Ok(Self::Indefinite),
            0 => Ok(Self::Immediate),
            ms if ms > 0 => Ok(Self::budget(Duration::from_millis(ms as u64))),
            ms => Err(LockError::InvalidTimeout(ms)),
        }
    }

    pub(crate) fn from_duration(timeout: Duration) -> Self {
        if timeout.is_zero() {
            Self::Immediate
        } else {
            Self::budget(timeout)
        }
    }

    pub(crate) fn from_deadline(deadline: Instant) -> Self {
        if deadline <= Instant::now() {
            Self::Immediate
        } else {
            Self::Until(deadline)
        }
    }

    /// A deadline `timeout` from now. A budget too large to represent as an
    /// `Instant` is treated as infinite.
    fn budget(timeout: Duration) -> Self {
        Instant::now()
            .checked_add(timeout)
            .map_or(Self::Indefinite, Self::Until)
    }

    /// Whether the budget is exhausted. `Immediate` is always exhausted;
    /// `Indefinite` never is.
    pub(crate) fn expired(self) -> bool {
        match self {
            Self::Immediate => true,
            Self::Until(deadline) => Instant::now() >= deadline,
            Self::Indefinite => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millisecond_budgets_are_classified() {
        assert!(matches!(Wait::from_ms(-1), Ok(Wait::Indefinite)));
        assert!(matches!(Wait::from_ms(0), Ok(Wait::Immediate)));
        assert!(matches!(Wait::from_ms(25), Ok(Wait::Until(_))));
        assert!(matches!(
            Wait::from_ms(-7),
            Err(LockError::InvalidTimeout(-7))
        ));
    }

    #[test]
    fn immediate_budget_is_always_expired() {
        assert!(Wait::from_duration(Duration::ZERO).expired());
        assert!(!Wait::from_duration(Duration::from_secs(60)).expired());
        assert!(!Wait::Indefinite.expired());
    }

    #[test]
    fn error_messages_name_the_misuse() {
        assert_eq!(
            LockError::InvalidTimeout(-2).to_string(),
            "invalid timeout -2 ms; expected -1 (infinite) or a non-negative value"
        );
        assert_eq!(
            LockError::RecursiveAcquisition.to_string(),
            "lock is already held by the current thread"
        );
        assert_eq!(
            LockError::OwnerMismatch.to_string(),
            "lock is not held by the current thread"
        );
        assert_eq!(
            LockError::OwnerTrackingDisabled.to_string(),
            "owner tracking is disabled for this lock"
        );
    }
}
