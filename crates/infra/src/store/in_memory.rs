use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use ledgerbank_auth::{Role, RoleName, User};
use ledgerbank_banking::{Account, AccountNumber, ReferenceId, Transaction, newest_first};
use ledgerbank_core::{AccountId, ExpectedVersion, UserId, Versioned};

use super::{LedgerStore, StoreError, StoreTx, TransactionFilter};

#[derive(Debug, Default)]
struct LedgerState {
    roles: BTreeMap<RoleName, Role>,
    users: BTreeMap<UserId, User>,
    accounts: BTreeMap<AccountId, Account>,
    transactions: Vec<Transaction>,
}

/// In-memory ledger store.
///
/// Intended for tests/dev. Units of work are fully serialized: `begin` takes a
/// store-wide lock that is held until the unit of work commits or is dropped,
/// so every read inside it is effectively a locked read.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let committed = self.state.clone().lock_owned().await;
        Ok(Box::new(InMemoryTx {
            committed,
            staged: LedgerState::default(),
        }))
    }
}

/// Writes are staged on top of the committed state and only folded into it
/// on commit; dropping the guard without committing discards them.
struct InMemoryTx {
    committed: OwnedMutexGuard<LedgerState>,
    staged: LedgerState,
}

impl InMemoryTx {
    fn role(&self, name: RoleName) -> Option<&Role> {
        self.staged
            .roles
            .get(&name)
            .or_else(|| self.committed.roles.get(&name))
    }

    fn user(&self, id: UserId) -> Option<&User> {
        self.staged
            .users
            .get(&id)
            .or_else(|| self.committed.users.get(&id))
    }

    fn users(&self) -> impl Iterator<Item = &User> + '_ {
        let staged = &self.staged.users;
        staged.values().chain(
            self.committed
                .users
                .values()
                .filter(move |u| !staged.contains_key(&u.id)),
        )
    }

    fn account(&self, id: AccountId) -> Option<&Account> {
        self.staged
            .accounts
            .get(&id)
            .or_else(|| self.committed.accounts.get(&id))
    }

    fn accounts(&self) -> impl Iterator<Item = &Account> + '_ {
        let staged = &self.staged.accounts;
        staged.values().chain(
            self.committed
                .accounts
                .values()
                .filter(move |a| !staged.contains_key(&a.id)),
        )
    }

    fn transactions(&self) -> impl Iterator<Item = &Transaction> + '_ {
        self.committed
            .transactions
            .iter()
            .chain(self.staged.transactions.iter())
    }

    fn sorted_accounts<'a>(accounts: impl Iterator<Item = &'a Account>) -> Vec<Account> {
        let mut out: Vec<Account> = accounts.cloned().collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        out
    }
}

fn check_version<V>(kind: &str, current: &V, update: &V) -> Result<(), StoreError>
where
    V: Versioned,
    V::Id: std::fmt::Display,
{
    if ExpectedVersion::of(update).matches(current.version()) {
        return Ok(());
    }
    Err(StoreError::Conflict(format!(
        "{kind} {}: expected version {}, found {}",
        update.id(),
        update.version(),
        current.version()
    )))
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn find_role(&mut self, name: RoleName) -> Result<Option<Role>, StoreError> {
        Ok(self.role(name).cloned())
    }

    async fn insert_role(&mut self, role: &Role) -> Result<(), StoreError> {
        if self.role(role.name).is_some() {
            return Err(StoreError::unique("roles_name_key"));
        }
        self.staged.roles.insert(role.name, role.clone());
        Ok(())
    }

    async fn find_user(&mut self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.user(id).cloned())
    }

    async fn find_user_by_username(
        &mut self,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self.users().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users().find(|u| u.email == email).cloned())
    }

    async fn lock_user_by_username(
        &mut self,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        self.find_user_by_username(username).await
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        if self.user(user.id).is_some() {
            return Err(StoreError::unique("users_pkey"));
        }
        if self.users().any(|u| u.username == user.username) {
            return Err(StoreError::unique("users_username_key"));
        }
        if self.users().any(|u| u.email == user.email) {
            return Err(StoreError::unique("users_email_key"));
        }
        if let Some(missing) = user.roles.iter().find(|r| self.role(**r).is_none()) {
            return Err(StoreError::Backend(format!("role {missing} is not seeded")));
        }
        let mut stored = user.clone();
        stored.version = 0;
        self.staged.users.insert(stored.id, stored);
        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> Result<User, StoreError> {
        let current = self
            .user(user.id)
            .ok_or_else(|| StoreError::Conflict(format!("user {} no longer exists", user.id)))?;
        check_version("user", current, user)?;
        let mut stored = user.clone();
        stored.version += 1;
        self.staged.users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn list_users(&mut self) -> Result<Vec<User>, StoreError> {
        let mut out: Vec<User> = self.users().cloned().collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn find_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.account(id).cloned())
    }

    async fn find_account_by_number(
        &mut self,
        number: &AccountNumber,
    ) -> Result<Option<Account>, StoreError> {
        Ok(self
            .accounts()
            .find(|a| &a.account_number == number)
            .cloned())
    }

    async fn list_accounts(&mut self) -> Result<Vec<Account>, StoreError> {
        Ok(Self::sorted_accounts(self.accounts()))
    }

    async fn list_accounts_by_owner(
        &mut self,
        owner: UserId,
    ) -> Result<Vec<Account>, StoreError> {
        Ok(Self::sorted_accounts(
            self.accounts().filter(|a| a.owner == owner),
        ))
    }

    async fn list_unapproved_accounts(&mut self) -> Result<Vec<Account>, StoreError> {
        Ok(Self::sorted_accounts(
            self.accounts().filter(|a| !a.approved_by_staff),
        ))
    }

    async fn lock_accounts(&mut self, ids: &[AccountId]) -> Result<Vec<Account>, StoreError> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        Ok(ids
            .into_iter()
            .filter_map(|id| self.account(id).cloned())
            .collect())
    }

    async fn insert_account(&mut self, account: &Account) -> Result<(), StoreError> {
        if self.account(account.id).is_some() {
            return Err(StoreError::unique("accounts_pkey"));
        }
        if self
            .accounts()
            .any(|a| a.account_number == account.account_number)
        {
            return Err(StoreError::unique("accounts_account_number_key"));
        }
        if self.user(account.owner).is_none() {
            return Err(StoreError::Backend(format!(
                "owner {} does not exist",
                account.owner
            )));
        }
        let mut stored = account.clone();
        stored.version = 0;
        self.staged.accounts.insert(stored.id, stored);
        Ok(())
    }

    async fn update_account(&mut self, account: &Account) -> Result<Account, StoreError> {
        let current = self.account(account.id).ok_or_else(|| {
            StoreError::Conflict(format!("account {} no longer exists", account.id))
        })?;
        check_version("account", current, account)?;
        let mut stored = account.clone();
        stored.version += 1;
        self.staged.accounts.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), StoreError> {
        if self.transactions().any(|t| t.id == transaction.id) {
            return Err(StoreError::unique("transactions_pkey"));
        }
        self.staged.transactions.push(transaction.clone());
        Ok(())
    }

    async fn find_transactions_by_reference(
        &mut self,
        reference_id: &ReferenceId,
    ) -> Result<Vec<Transaction>, StoreError> {
        Ok(self
            .transactions()
            .filter(|t| &t.reference_id == reference_id)
            .cloned()
            .collect())
    }

    async fn query_transactions(
        &mut self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, StoreError> {
        let rows = self
            .transactions()
            .filter(|t| filter.account.is_none_or(|id| t.touches(&id)))
            .filter(|t| filter.range.contains(t.timestamp))
            .cloned()
            .collect::<Vec<_>>();
        Ok(newest_first(rows))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTx {
            mut committed,
            staged,
        } = *self;
        committed.roles.extend(staged.roles);
        committed.users.extend(staged.users);
        committed.accounts.extend(staged.accounts);
        committed.transactions.extend(staged.transactions);
        Ok(())
    }
}
