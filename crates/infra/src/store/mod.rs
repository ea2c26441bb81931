//! Ledger store boundary.
//!
//! Every mutation runs inside one unit of work: `LedgerStore::begin` hands out
//! a `StoreTx`, all reads and writes go through it, and nothing is visible to
//! other units of work until `commit`. Dropping a `StoreTx` without committing
//! rolls it back.
//!
//! Two guards against lost updates are layered here:
//! - `lock_accounts` / `lock_user_by_username` take row locks for the rest of
//!   the unit of work (always in ascending id order for accounts);
//! - `update_account` / `update_user` are version-checked and fail with
//!   `StoreError::Conflict` if the row moved since it was read.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use ledgerbank_auth::{Role, RoleName, User};
use ledgerbank_banking::{Account, AccountNumber, DateRange, ReferenceId, Transaction};
use ledgerbank_core::{AccountId, UserId};

/// Store operation error.
///
/// These are **infrastructure errors**, as opposed to domain errors: the
/// services never retry a domain error, but may retry a `Conflict`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("store backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn unique(constraint: impl Into<String>) -> Self {
        Self::UniqueViolation {
            constraint: constraint.into(),
        }
    }
}

/// Filter for transaction-history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionFilter {
    /// Rows whose source OR destination is this account; `None` for all rows.
    pub account: Option<AccountId>,
    pub range: DateRange,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        (**self).begin().await
    }
}

/// One unit of work against the ledger store.
#[async_trait]
pub trait StoreTx: Send {
    // Roles

    async fn find_role(&mut self, name: RoleName) -> Result<Option<Role>, StoreError>;
    async fn insert_role(&mut self, role: &Role) -> Result<(), StoreError>;

    // Users

    async fn find_user(&mut self, id: UserId) -> Result<Option<User>, StoreError>;
    async fn find_user_by_username(&mut self, username: &str)
    -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError>;

    /// Like `find_user_by_username`, holding a row lock until commit/rollback.
    async fn lock_user_by_username(&mut self, username: &str)
    -> Result<Option<User>, StoreError>;

    /// Fails with `UniqueViolation` on a duplicate username or email, and with
    /// `Backend` if one of the user's roles is not seeded.
    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError>;

    /// Version-checked update; returns the row as stored (version bumped).
    async fn update_user(&mut self, user: &User) -> Result<User, StoreError>;

    /// Ordered by creation time.
    async fn list_users(&mut self) -> Result<Vec<User>, StoreError>;

    // Accounts

    async fn find_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError>;
    async fn find_account_by_number(
        &mut self,
        number: &AccountNumber,
    ) -> Result<Option<Account>, StoreError>;

    /// Ordered by creation time.
    async fn list_accounts(&mut self) -> Result<Vec<Account>, StoreError>;

    /// Ordered by creation time (oldest first).
    async fn list_accounts_by_owner(&mut self, owner: UserId)
    -> Result<Vec<Account>, StoreError>;

    /// Accounts with `approved_by_staff == false`.
    async fn list_unapproved_accounts(&mut self) -> Result<Vec<Account>, StoreError>;

    /// Lock and return the given accounts in ascending id order. Missing ids
    /// are simply absent from the result.
    async fn lock_accounts(&mut self, ids: &[AccountId]) -> Result<Vec<Account>, StoreError>;

    async fn insert_account(&mut self, account: &Account) -> Result<(), StoreError>;

    /// Version-checked update; returns the row as stored (version bumped).
    async fn update_account(&mut self, account: &Account) -> Result<Account, StoreError>;

    // Transactions

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), StoreError>;
    async fn find_transactions_by_reference(
        &mut self,
        reference_id: &ReferenceId,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// Newest first (timestamp, then id, descending).
    async fn query_transactions(
        &mut self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
