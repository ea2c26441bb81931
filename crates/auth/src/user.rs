//! User record and its login bookkeeping.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use ledgerbank_core::{Entity, UserId, Versioned};

use crate::{LockState, LockoutPolicy, RoleName};

/// A login identity.
///
/// # Invariants
/// - `username` and `email` are unique across users (enforced by the store).
/// - `account_non_locked == false` implies `lock_time` is set.
/// - `failed_login_attempts` counts consecutive failures since the last
///   success or unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub enabled: bool,
    pub account_non_locked: bool,
    pub failed_login_attempts: u32,
    pub lock_time: Option<DateTime<Utc>>,
    pub roles: BTreeSet<RoleName>,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl User {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        roles: impl IntoIterator<Item = RoleName>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UserId::new(),
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            enabled: true,
            account_non_locked: true,
            failed_login_attempts: 0,
            lock_time: None,
            roles: roles.into_iter().collect(),
            created_at: now,
            version: 0,
        }
    }

    pub fn lock_state(&self, policy: &LockoutPolicy, now: DateTime<Utc>) -> LockState {
        if self.account_non_locked {
            return LockState::Unlocked;
        }
        match self.lock_time {
            Some(lock_time) => {
                let until = policy.unlocks_at(lock_time);
                if until > now {
                    LockState::Locked { until }
                } else {
                    LockState::Expired
                }
            }
            // No timestamp to wait on.
            None => LockState::Expired,
        }
    }

    pub fn unlock(&mut self) {
        self.account_non_locked = true;
        self.lock_time = None;
        self.failed_login_attempts = 0;
    }

    /// Count one bad password. Returns `true` if this attempt locked the user.
    pub fn record_failed_login(&mut self, policy: &LockoutPolicy, now: DateTime<Utc>) -> bool {
        self.failed_login_attempts = self.failed_login_attempts.saturating_add(1);
        if self.account_non_locked && self.failed_login_attempts >= policy.max_attempts {
            self.account_non_locked = false;
            self.lock_time = Some(now);
            return true;
        }
        false
    }

    /// Returns `true` if there was anything to reset.
    pub fn reset_failed_logins(&mut self) -> bool {
        if self.failed_login_attempts == 0 {
            return false;
        }
        self.failed_login_attempts = 0;
        true
    }

    pub fn role_list(&self) -> Vec<RoleName> {
        self.roles.iter().copied().collect()
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Versioned for User {
    fn version(&self) -> u64 {
        self.version
    }
}
