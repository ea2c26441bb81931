//! Login, registration and lockout bookkeeping.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use ledgerbank_auth::{LockState, LockoutPolicy, PasswordHasher, RoleName, TokenIssuer, User};
use ledgerbank_core::{Clock, DomainError};

use crate::services::directory::insert_new_user;
use crate::services::error::{ServiceError, ServiceResult};
use crate::store::{LedgerStore, StoreError};

/// Attempts at the login unit of work when the user row changed underneath it.
pub const LOGIN_ATTEMPTS_ON_CONFLICT: u32 = 3;

pub const TOKEN_TYPE: &str = "Bearer";

/// Successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthToken {
    pub token: String,
    pub username: String,
    pub roles: Vec<RoleName>,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn LedgerStore>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<dyn TokenIssuer>,
    clock: Arc<dyn Clock>,
    policy: LockoutPolicy,
    token_ttl: Duration,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenIssuer>,
        clock: Arc<dyn Clock>,
        policy: LockoutPolicy,
        token_ttl: Duration,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
            clock,
            policy,
            token_ttl,
        }
    }

    /// Check credentials and issue a bearer token.
    ///
    /// Failed-attempt counting and locking are committed even when the login
    /// itself fails.
    pub async fn login(&self, username: &str, password: &str) -> ServiceResult<AuthToken> {
        let mut attempt = 1;
        loop {
            match self.login_once(username, password).await {
                Err(ServiceError::Store(StoreError::Conflict(reason)))
                    if attempt < LOGIN_ATTEMPTS_ON_CONFLICT =>
                {
                    debug!(username, attempt, %reason, "login bookkeeping conflict, retrying");
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    async fn login_once(&self, username: &str, password: &str) -> ServiceResult<AuthToken> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let Some(mut user) = tx.lock_user_by_username(username).await? else {
            warn!(username, "login rejected: unknown user");
            return Err(DomainError::InvalidCredentials.into());
        };

        match user.lock_state(&self.policy, now) {
            LockState::Locked { until } => {
                warn!(username, %until, "login rejected: account locked");
                return Err(DomainError::AccountLocked { until }.into());
            }
            LockState::Expired => {
                user.unlock();
                user = tx.update_user(&user).await?;
                info!(username, "lockout window elapsed, account unlocked");
            }
            LockState::Unlocked => {}
        }

        if !user.enabled {
            tx.commit().await?;
            warn!(username, "login rejected: user disabled");
            return Err(DomainError::UserDisabled.into());
        }

        if !self.hasher.verify(password, &user.password_hash)? {
            let locked_now = user.record_failed_login(&self.policy, now);
            tx.update_user(&user).await?;
            tx.commit().await?;
            if locked_now {
                warn!(
                    username,
                    attempts = user.failed_login_attempts,
                    "account locked after repeated login failures"
                );
            } else {
                warn!(
                    username,
                    attempts = user.failed_login_attempts,
                    "login rejected: bad password"
                );
            }
            return Err(DomainError::InvalidCredentials.into());
        }

        if user.reset_failed_logins() {
            user = tx.update_user(&user).await?;
        }
        tx.commit().await?;

        let roles = user.role_list();
        let issued = self.tokens.issue(&user.username, &roles, self.token_ttl)?;
        info!(username, "login succeeded");

        Ok(AuthToken {
            token: issued.token,
            username: user.username,
            roles,
            token_type: TOKEN_TYPE,
            expires_at: DateTime::from_timestamp(issued.claims.exp, 0).unwrap_or(now + self.token_ttl),
        })
    }

    /// Self-registration: a new enabled CUSTOMER.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> ServiceResult<User> {
        let mut tx = self.store.begin().await?;
        if tx.find_role(RoleName::Customer).await?.is_none() {
            error!("role CUSTOMER is not seeded; registration is unavailable");
            return Err(ServiceError::Configuration(
                "role CUSTOMER is not seeded".to_string(),
            ));
        }

        let user = insert_new_user(
            tx.as_mut(),
            self.hasher.as_ref(),
            self.clock.now(),
            username,
            email,
            password,
            &[RoleName::Customer],
        )
        .await?;
        tx.commit().await?;

        info!(username, user_id = %user.id, "customer registered");
        Ok(user)
    }
}
