//! Time and TTL Arithmetic
//!
//! Everything the engine compares or stores is a [`Moment`] truncated to
//! microsecond resolution. Sub-microsecond noise from the system clock would
//! otherwise make a value read back from a store compare unequal to the value
//! that was written.
//!
//! "Now" comes from a [`Clock`], so hooks and the sweeper can be driven by a
//! [`ManualClock`] in tests.

use crate::ttl::error::{Result, TtlError};
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// An absolute point in time (UTC).
pub type Moment = DateTime<Utc>;

/// Number of fractional-second digits kept on every moment (microseconds).
pub const RESOLUTION_DIGITS: u16 = 6;

/// Truncates a moment to the engine's resolution.
#[inline]
pub fn truncate(moment: Moment) -> Moment {
    moment.trunc_subsecs(RESOLUTION_DIGITS)
}

/// Computes `now + ttl_seconds`, truncated to the engine's resolution.
///
/// Callers only pass positive TTLs; non-positive TTLs mean "leave the
/// expiration alone" and are filtered out before this point.
///
/// # Example
///
/// ```
/// use ttlkeeper::ttl::clock::compute_expiration;
/// use chrono::DateTime;
///
/// let now = DateTime::from_timestamp(1_000, 0).unwrap();
/// let expires = compute_expiration(10, now).unwrap();
/// assert_eq!(expires.timestamp(), 1_010);
/// ```
pub fn compute_expiration(ttl_seconds: i64, now: Moment) -> Result<Moment> {
    TimeDelta::try_seconds(ttl_seconds)
        .and_then(|delta| now.checked_add_signed(delta))
        .map(truncate)
        .ok_or(TtlError::ExpirationOverflow { ttl: ttl_seconds })
}

/// Source of the current moment.
pub trait Clock: Send + Sync + Debug {
    /// Returns the current moment, already truncated.
    fn now(&self) -> Moment;
}

/// Wall clock backed by [`Utc::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Moment {
        truncate(Utc::now())
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Moment>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: Moment) -> Self {
        Self {
            now: Arc::new(Mutex::new(truncate(start))),
        }
    }

    /// Moves the clock to an absolute moment.
    pub fn set(&self, moment: Moment) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = truncate(moment);
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        *now = truncate(now.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Moment {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
