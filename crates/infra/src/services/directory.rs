//! User and role administration.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use ledgerbank_auth::{PasswordHasher, RoleName, User};
use ledgerbank_banking::Account;
use ledgerbank_core::{Clock, DomainError, UserId};

use crate::services::accounts::primary_account;
use crate::services::error::{ServiceError, ServiceResult};
use crate::store::{LedgerStore, StoreError, StoreTx};

/// A user together with their primary account, if they have one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    #[serde(flatten)]
    pub user: User,
    pub primary_account: Option<Account>,
}

#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn LedgerStore>,
    hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
}

impl UserDirectory {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            hasher,
            clock,
        }
    }

    pub async fn list_users(&self) -> ServiceResult<Vec<UserSummary>> {
        let mut tx = self.store.begin().await?;
        let users = tx.list_users().await?;
        let mut summaries = Vec::with_capacity(users.len());
        for user in users {
            let primary_account = primary_account(tx.as_mut(), user.id).await?;
            summaries.push(UserSummary {
                user,
                primary_account,
            });
        }
        Ok(summaries)
    }

    pub async fn get(&self, user_id: UserId) -> ServiceResult<User> {
        let mut tx = self.store.begin().await?;
        tx.find_user(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("user {user_id}")).into())
    }

    pub async fn find_by_username(&self, username: &str) -> ServiceResult<User> {
        let mut tx = self.store.begin().await?;
        tx.find_user_by_username(username)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("user {username}")).into())
    }

    pub async fn enable(&self, user_id: UserId) -> ServiceResult<User> {
        self.update(user_id, "enabled", |user| user.enabled = true)
            .await
    }

    pub async fn disable(&self, user_id: UserId) -> ServiceResult<User> {
        self.update(user_id, "disabled", |user| user.enabled = false)
            .await
    }

    /// Replace the password digest. Lock state is left as it is.
    pub async fn reset_password(&self, user_id: UserId, new_password: &str) -> ServiceResult<User> {
        let digest = self.hasher.hash(new_password)?;
        self.update(user_id, "password reset", move |user| user.password_hash = digest)
            .await
    }

    /// Distinct owners of accounts still waiting for staff approval, in the
    /// order their first pending account was opened.
    pub async fn users_with_pending_accounts(&self) -> ServiceResult<Vec<User>> {
        let mut tx = self.store.begin().await?;
        let pending = tx.list_unapproved_accounts().await?;

        let mut seen = HashSet::new();
        let mut owners = Vec::new();
        for account in pending {
            if !seen.insert(account.owner) {
                continue;
            }
            if let Some(user) = tx.find_user(account.owner).await? {
                owners.push(user);
            }
        }
        Ok(owners)
    }

    /// Create a user holding exactly `roles`. Every role must already exist.
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        roles: &[RoleName],
    ) -> ServiceResult<User> {
        let mut tx = self.store.begin().await?;
        for role in roles {
            if tx.find_role(*role).await?.is_none() {
                return Err(DomainError::not_found(format!("role {role}")).into());
            }
        }

        let user = insert_new_user(
            tx.as_mut(),
            self.hasher.as_ref(),
            self.clock.now(),
            username,
            email,
            password,
            roles,
        )
        .await?;
        tx.commit().await?;

        info!(username, user_id = %user.id, roles = ?user.roles, "user created");
        Ok(user)
    }

    async fn update(
        &self,
        user_id: UserId,
        what: &'static str,
        apply: impl FnOnce(&mut User) + Send,
    ) -> ServiceResult<User> {
        let mut tx = self.store.begin().await?;
        let mut user = tx
            .find_user(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("user {user_id}")))?;
        apply(&mut user);
        let user = tx.update_user(&user).await?;
        tx.commit().await?;

        info!(user_id = %user.id, username = %user.username, "user {what}");
        Ok(user)
    }
}

/// Uniqueness checks, hashing and insert shared by registration and
/// administrative creation. The caller commits.
pub(crate) async fn insert_new_user(
    tx: &mut dyn StoreTx,
    hasher: &dyn PasswordHasher,
    now: DateTime<Utc>,
    username: &str,
    email: &str,
    password: &str,
    roles: &[RoleName],
) -> ServiceResult<User> {
    if tx.find_user_by_username(username).await?.is_some() {
        return Err(DomainError::UsernameTaken(username.to_string()).into());
    }
    if tx.find_user_by_email(email).await?.is_some() {
        return Err(DomainError::EmailTaken(email.to_string()).into());
    }

    let digest = hasher.hash(password)?;
    let user = User::new(username, email, digest, roles.iter().copied(), now);
    tx.insert_user(&user)
        .await
        .map_err(|err| duplicate_user(err, username, email))?;
    Ok(user)
}

// A concurrent registration can slip past the lookups above; the store's
// unique constraints still catch it.
fn duplicate_user(err: StoreError, username: &str, email: &str) -> ServiceError {
    match &err {
        StoreError::UniqueViolation { constraint } if constraint.contains("username") => {
            DomainError::UsernameTaken(username.to_string()).into()
        }
        StoreError::UniqueViolation { constraint } if constraint.contains("email") => {
            DomainError::EmailTaken(email.to_string()).into()
        }
        _ => err.into(),
    }
}

#[cfg(test)]
mod tests {
    use ledgerbank_banking::AccountType;

    use super::*;
    use crate::test_support::{Fixture, PASSWORD};

    #[tokio::test]
    async fn list_users_includes_primary_account() {
        let fx = Fixture::new().await;
        let account = fx.active_account("alice").await;
        fx.customer("bob").await;

        let users = fx.directory.list_users().await.unwrap();
        assert_eq!(users.len(), 2);
        let alice = users.iter().find(|u| u.user.username == "alice").unwrap();
        assert_eq!(alice.primary_account.as_ref().map(|a| a.id), Some(account.id));
        let bob = users.iter().find(|u| u.user.username == "bob").unwrap();
        assert!(bob.primary_account.is_none());
    }

    #[tokio::test]
    async fn summary_serialization_never_leaks_password_hash() {
        let fx = Fixture::new().await;
        fx.customer("alice").await;
        let users = fx.directory.list_users().await.unwrap();
        let json = serde_json::to_value(&users[0]).unwrap();
        assert_eq!(json["username"], "alice");
        assert!(json.get("password_hash").is_none());
        assert!(json["primary_account"].is_null());
    }

    #[tokio::test]
    async fn enable_and_disable_round_trip() {
        let fx = Fixture::new().await;
        let alice = fx.customer("alice").await;

        let disabled = fx.directory.disable(alice.id).await.unwrap();
        assert!(!disabled.enabled);
        let enabled = fx.directory.enable(alice.id).await.unwrap();
        assert!(enabled.enabled);
        assert_eq!(enabled.version, alice.version + 2);

        let err = fx.directory.disable(UserId::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn reset_password_replaces_credentials() {
        let fx = Fixture::new().await;
        let alice = fx.customer("alice").await;
        fx.directory.reset_password(alice.id, "fresh-secret").await.unwrap();

        assert!(fx.auth.login("alice", PASSWORD).await.is_err());
        fx.auth.login("alice", "fresh-secret").await.unwrap();
    }

    #[tokio::test]
    async fn pending_owners_are_distinct() {
        let fx = Fixture::new().await;
        let alice = fx.customer("alice").await;
        let bob = fx.customer("bob").await;
        fx.active_account("carol").await;

        fx.accounts.create(alice.id, AccountType::Savings).await.unwrap();
        fx.accounts.create(alice.id, AccountType::Current).await.unwrap();
        fx.accounts.create(bob.id, AccountType::Savings).await.unwrap();

        let pending = fx.directory.users_with_pending_accounts().await.unwrap();
        let names: Vec<_> = pending.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn create_user_requires_every_role() {
        let fx = Fixture::unseeded().await;
        let err = fx
            .directory
            .create_user("admin", "admin@bank.com", "secret1", &[RoleName::Admin])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn create_user_assigns_requested_roles() {
        let fx = Fixture::new().await;
        let staff = fx
            .directory
            .create_user(
                "staff1",
                "staff1@bank.com",
                "secret1",
                &[RoleName::Staff, RoleName::Admin],
            )
            .await
            .unwrap();
        assert_eq!(staff.role_list(), vec![RoleName::Admin, RoleName::Staff]);
    }

    #[test]
    fn racing_duplicates_map_to_domain_errors() {
        assert_eq!(
            duplicate_user(StoreError::unique("users_username_key"), "a", "a@x"),
            ServiceError::Domain(DomainError::UsernameTaken("a".into()))
        );
        assert_eq!(
            duplicate_user(StoreError::unique("users_email_key"), "a", "a@x"),
            ServiceError::Domain(DomainError::EmailTaken("a@x".into()))
        );
        assert_eq!(
            duplicate_user(StoreError::Backend("down".into()), "a", "a@x"),
            ServiceError::Store(StoreError::Backend("down".into()))
        );
    }
}
