//! Failed-login lockout policy.
//!
//! `UNLOCKED --(max_attempts consecutive failures)--> LOCKED
//!  --(duration elapsed, observed on the next attempt)--> UNLOCKED`
//!
//! Unlocking is lazy: nothing runs in the background, the next login attempt
//! after the window notices the lock has expired.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub duration: Duration,
}

impl LockoutPolicy {
    pub fn new(max_attempts: u32, duration: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            duration,
        }
    }

    pub fn unlocks_at(&self, lock_time: DateTime<Utc>) -> DateTime<Utc> {
        lock_time + self.duration
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::new(3, Duration::minutes(15))
    }
}

/// Lock status of a user as observed at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Locked { until: DateTime<Utc> },
    /// Locked in storage, but the window has passed; the next write clears it.
    Expired,
}
