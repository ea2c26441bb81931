//! Domain error model.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (lifecycle
/// guards, balance checks, credential checks). Infrastructure concerns belong
/// elsewhere: store and token failures have their own error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A user, account or role was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// An illegal lifecycle transition (e.g. approving an active account).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The operation is blocked because the account is frozen.
    #[error("account frozen: {0}")]
    Frozen(String),

    /// The operation is blocked because the account awaits staff approval.
    #[error("account not approved: {0}")]
    NotApproved(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Bad amount, same-account transfer, malformed date, ...
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("username is already taken: {0}")]
    UsernameTaken(String),

    #[error("email is already registered: {0}")]
    EmailTaken(String),

    #[error("invalid username or password")]
    InvalidCredentials,

    /// Login refused until the lockout window ends.
    #[error("account is locked until {until}")]
    AccountLocked { until: DateTime<Utc> },

    #[error("user is disabled")]
    UserDisabled,
}

impl DomainError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn frozen(msg: impl Into<String>) -> Self {
        Self::Frozen(msg.into())
    }

    pub fn not_approved(msg: impl Into<String>) -> Self {
        Self::NotApproved(msg.into())
    }

    pub fn insufficient_funds(msg: impl Into<String>) -> Self {
        Self::InsufficientFunds(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Minutes (rounded up) until a locked account can try again.
    pub fn retry_after_minutes(&self, now: DateTime<Utc>) -> Option<i64> {
        match self {
            Self::AccountLocked { until } => {
                let secs = (*until - now).num_seconds().max(0);
                Some((secs + 59) / 60)
            }
            _ => None,
        }
    }
}
