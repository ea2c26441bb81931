//! Account lifecycle and balance engine.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info};

use ledgerbank_banking::{
    Account, AccountNumber, AccountNumberSource, AccountStatus, AccountType,
    RandomAccountNumbers, Transaction, transfer_between,
};
use ledgerbank_core::{AccountId, Amount, Clock, DomainError, UserId};

use crate::services::error::{ServiceError, ServiceResult};
use crate::store::{LedgerStore, StoreTx};

/// How many candidate numbers `create` tries before giving up.
pub const ACCOUNT_NUMBER_ATTEMPTS: u32 = 16;

/// Outcome of a balance-changing operation: the caller's account as stored
/// afterwards and the rows written for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Posting {
    pub account: Account,
    pub transactions: Vec<Transaction>,
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    numbers: Arc<dyn AccountNumberSource>,
}

impl AccountService {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            numbers: Arc::new(RandomAccountNumbers),
        }
    }

    pub fn with_number_source(mut self, numbers: Arc<dyn AccountNumberSource>) -> Self {
        self.numbers = numbers;
        self
    }

    /// Open a new account for `user_id`, pending staff approval.
    pub async fn create(&self, user_id: UserId, account_type: AccountType) -> ServiceResult<Account> {
        let mut tx = self.store.begin().await?;
        let owner = tx
            .find_user(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("user {user_id}")))?;

        let number = self.unused_number(tx.as_mut()).await?;
        let account = Account::open(owner.id, account_type, number, self.clock.now());
        tx.insert_account(&account).await?;
        tx.commit().await?;

        info!(
            account_id = %account.id,
            account_number = %account.account_number,
            owner = %owner.username,
            account_type = %account_type,
            "account opened"
        );
        Ok(account)
    }

    pub async fn approve(&self, account_id: AccountId) -> ServiceResult<Account> {
        self.transition(account_id, "approved", Account::approve).await
    }

    pub async fn freeze(&self, account_id: AccountId) -> ServiceResult<Account> {
        self.transition(account_id, "frozen", Account::freeze).await
    }

    pub async fn unfreeze(&self, account_id: AccountId) -> ServiceResult<Account> {
        self.transition(account_id, "unfrozen", Account::unfreeze).await
    }

    pub async fn deposit(&self, username: &str, amount: Amount) -> ServiceResult<Posting> {
        let mut tx = self.store.begin().await?;
        let mut account = locked_primary_account(tx.as_mut(), username).await?;

        account.credit(amount)?;
        let row = Transaction::deposit(account.reference(), amount, self.clock.now());
        let account = tx.update_account(&account).await?;
        tx.insert_transaction(&row).await?;
        tx.commit().await?;

        info!(
            account_number = %account.account_number,
            %amount,
            reference_id = %row.reference_id,
            "deposit posted"
        );
        Ok(Posting {
            account,
            transactions: vec![row],
        })
    }

    pub async fn withdraw(&self, username: &str, amount: Amount) -> ServiceResult<Posting> {
        let mut tx = self.store.begin().await?;
        let mut account = locked_primary_account(tx.as_mut(), username).await?;

        account.debit(amount)?;
        let row = Transaction::withdrawal(account.reference(), amount, self.clock.now());
        let account = tx.update_account(&account).await?;
        tx.insert_transaction(&row).await?;
        tx.commit().await?;

        info!(
            account_number = %account.account_number,
            %amount,
            reference_id = %row.reference_id,
            "withdrawal posted"
        );
        Ok(Posting {
            account,
            transactions: vec![row],
        })
    }

    /// Move `amount` from `source_username`'s account to the account numbered
    /// `destination_number`. Both legs are written in the same unit of work.
    pub async fn transfer(
        &self,
        source_username: &str,
        destination_number: &str,
        amount: Amount,
    ) -> ServiceResult<Posting> {
        let mut tx = self.store.begin().await?;

        let source = primary_account_of(tx.as_mut(), source_username).await?;
        let destination = match AccountNumber::parse(destination_number) {
            Ok(number) => tx.find_account_by_number(&number).await?,
            Err(_) => None,
        }
        .ok_or_else(|| {
            DomainError::not_found(format!("destination account {destination_number}"))
        })?;

        if source.id == destination.id {
            return Err(DomainError::invalid_argument("cannot transfer to the same account").into());
        }

        let locked = tx.lock_accounts(&[source.id, destination.id]).await?;
        let mut source = take_account(&locked, source.id)?;
        let mut destination = take_account(&locked, destination.id)?;

        transfer_between(&mut source, &mut destination, amount)?;
        let legs = Transaction::transfer(
            source.reference(),
            destination.reference(),
            amount,
            self.clock.now(),
        );

        let source = tx.update_account(&source).await?;
        let destination = tx.update_account(&destination).await?;
        for leg in &legs {
            tx.insert_transaction(leg).await?;
        }
        tx.commit().await?;

        info!(
            from = %source.account_number,
            to = %destination.account_number,
            %amount,
            reference_id = %legs[0].reference_id,
            "transfer posted"
        );
        Ok(Posting {
            account: source,
            transactions: legs.to_vec(),
        })
    }

    /// The user's primary account (oldest one that is not closed).
    pub async fn account_for_user(&self, username: &str) -> ServiceResult<Account> {
        let mut tx = self.store.begin().await?;
        primary_account_of(tx.as_mut(), username).await
    }

    pub async fn get(&self, account_id: AccountId) -> ServiceResult<Account> {
        let mut tx = self.store.begin().await?;
        tx.find_account(account_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("account {account_id}")).into())
    }

    pub async fn list_all(&self) -> ServiceResult<Vec<Account>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.list_accounts().await?)
    }

    async fn transition(
        &self,
        account_id: AccountId,
        verb: &'static str,
        apply: fn(&mut Account) -> Result<(), DomainError>,
    ) -> ServiceResult<Account> {
        let mut tx = self.store.begin().await?;
        let mut account = take_account(&tx.lock_accounts(&[account_id]).await?, account_id)?;
        apply(&mut account)?;
        let account = tx.update_account(&account).await?;
        tx.commit().await?;

        info!(
            account_id = %account.id,
            account_number = %account.account_number,
            status = %account.status,
            "account {verb}"
        );
        Ok(account)
    }

    async fn unused_number(&self, tx: &mut dyn StoreTx) -> ServiceResult<AccountNumber> {
        for attempt in 1..=ACCOUNT_NUMBER_ATTEMPTS {
            let candidate = self.numbers.next_candidate();
            if tx.find_account_by_number(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            debug!(attempt, %candidate, "account number already in use");
        }
        error!(
            attempts = ACCOUNT_NUMBER_ATTEMPTS,
            "could not find an unused account number"
        );
        Err(ServiceError::AccountNumberExhausted {
            attempts: ACCOUNT_NUMBER_ATTEMPTS,
        })
    }
}

/// Oldest non-closed account of `owner`, if any.
pub(crate) async fn primary_account(
    tx: &mut dyn StoreTx,
    owner: UserId,
) -> ServiceResult<Option<Account>> {
    Ok(tx
        .list_accounts_by_owner(owner)
        .await?
        .into_iter()
        .find(|a| a.status != AccountStatus::Closed))
}

pub(crate) async fn primary_account_of(
    tx: &mut dyn StoreTx,
    username: &str,
) -> ServiceResult<Account> {
    let user = tx
        .find_user_by_username(username)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("user {username}")))?;
    primary_account(tx, user.id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("no account for user {username}")).into())
}

async fn locked_primary_account(tx: &mut dyn StoreTx, username: &str) -> ServiceResult<Account> {
    let account = primary_account_of(tx, username).await?;
    take_account(&tx.lock_accounts(&[account.id]).await?, account.id)
}

fn take_account(locked: &[Account], id: AccountId) -> ServiceResult<Account> {
    locked
        .iter()
        .find(|a| a.id == id)
        .cloned()
        .ok_or_else(|| DomainError::not_found(format!("account {id}")).into())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rust_decimal::Decimal;

    use super::*;
    use crate::store::StoreError;
    use crate::test_support::{Fixture, amount};

    /// Hands out a fixed script of candidates, then repeats the last one.
    struct Scripted(Mutex<Vec<&'static str>>);

    impl AccountNumberSource for Scripted {
        fn next_candidate(&self) -> AccountNumber {
            let mut script = self.0.lock().unwrap();
            let next = if script.len() > 1 { script.remove(0) } else { script[0] };
            AccountNumber::parse(next).unwrap()
        }
    }

    #[tokio::test]
    async fn create_requires_existing_user() {
        let fx = Fixture::new().await;
        let err = fx
            .accounts
            .create(UserId::new(), AccountType::Savings)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn new_account_is_pending_with_zero_balance() {
        let fx = Fixture::new().await;
        let alice = fx.customer("alice").await;
        let account = fx.accounts.create(alice.id, AccountType::Current).await.unwrap();

        assert_eq!(account.status, AccountStatus::PendingApproval);
        assert_eq!(account.balance, Decimal::ZERO);
        assert!(!account.approved_by_staff);
        assert_eq!(account.account_number.as_str().len(), 10);
    }

    #[tokio::test]
    async fn number_collisions_are_retried() {
        let fx = Fixture::new().await;
        let alice = fx.customer("alice").await;
        let bob = fx.customer("bob").await;
        let accounts = fx.accounts.clone().with_number_source(Arc::new(Scripted(Mutex::new(
            vec!["1111111111", "1111111111", "2222222222"],
        ))));

        let first = accounts.create(alice.id, AccountType::Savings).await.unwrap();
        let second = accounts.create(bob.id, AccountType::Savings).await.unwrap();
        assert_eq!(first.account_number.as_str(), "1111111111");
        assert_eq!(second.account_number.as_str(), "2222222222");
    }

    #[tokio::test]
    async fn number_generation_gives_up_after_bounded_attempts() {
        let fx = Fixture::new().await;
        let alice = fx.customer("alice").await;
        let accounts = fx
            .accounts
            .clone()
            .with_number_source(Arc::new(Scripted(Mutex::new(vec!["1111111111"]))));

        accounts.create(alice.id, AccountType::Savings).await.unwrap();
        let err = accounts.create(alice.id, AccountType::Savings).await.unwrap_err();
        assert_eq!(
            err,
            ServiceError::AccountNumberExhausted {
                attempts: ACCOUNT_NUMBER_ATTEMPTS
            }
        );
    }

    #[tokio::test]
    async fn approve_twice_is_invalid_state() {
        let fx = Fixture::new().await;
        let account = fx.active_account("alice").await;
        let err = fx.accounts.approve(account.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::InvalidState(_))));
    }

    #[tokio::test]
    async fn approve_unknown_account_is_not_found() {
        let fx = Fixture::new().await;
        let err = fx.accounts.approve(AccountId::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn deposit_on_pending_account_is_not_approved_and_writes_nothing() {
        let fx = Fixture::new().await;
        let alice = fx.customer("alice").await;
        fx.accounts.create(alice.id, AccountType::Savings).await.unwrap();

        let err = fx.accounts.deposit("alice", amount("10.00")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotApproved(_))));
        assert!(fx.ledger.audit(None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn frozen_account_rejects_money_movement() {
        let fx = Fixture::new().await;
        let account = fx.funded("alice", "50").await;
        fx.accounts.freeze(account.id).await.unwrap();

        for result in [
            fx.accounts.deposit("alice", amount("1")).await,
            fx.accounts.withdraw("alice", amount("1")).await,
        ] {
            assert!(matches!(
                result,
                Err(ServiceError::Domain(DomainError::Frozen(_)))
            ));
        }
        let after = fx.accounts.get(account.id).await.unwrap();
        assert_eq!(after.balance, Decimal::from(50));
    }

    #[tokio::test]
    async fn freeze_guards() {
        let fx = Fixture::new().await;
        let account = fx.active_account("alice").await;
        fx.accounts.freeze(account.id).await.unwrap();
        assert!(matches!(
            fx.accounts.freeze(account.id).await,
            Err(ServiceError::Domain(DomainError::InvalidState(_)))
        ));
        fx.accounts.unfreeze(account.id).await.unwrap();
        assert!(matches!(
            fx.accounts.unfreeze(account.id).await,
            Err(ServiceError::Domain(DomainError::InvalidState(_)))
        ));
    }

    #[tokio::test]
    async fn overdraft_leaves_balance_untouched() {
        let fx = Fixture::new().await;
        let account = fx.funded("alice", "20").await;
        let err = fx.accounts.withdraw("alice", amount("20.01")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::InsufficientFunds(_))));
        assert_eq!(fx.accounts.get(account.id).await.unwrap().balance, Decimal::from(20));
    }

    #[tokio::test]
    async fn transfer_to_own_account_is_invalid_even_without_funds() {
        let fx = Fixture::new().await;
        let account = fx.active_account("alice").await;
        let err = fx
            .accounts
            .transfer("alice", account.account_number.as_str(), amount("1000"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn transfer_to_unknown_number_is_not_found() {
        let fx = Fixture::new().await;
        fx.funded("alice", "10").await;
        for number in ["9999999999", "not-a-number"] {
            let err = fx
                .accounts
                .transfer("alice", number, amount("1"))
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));
        }
    }

    #[tokio::test]
    async fn transfer_to_pending_destination_is_not_approved() {
        let fx = Fixture::new().await;
        fx.funded("alice", "10").await;
        let bob = fx.customer("bob").await;
        let pending = fx.accounts.create(bob.id, AccountType::Savings).await.unwrap();

        let err = fx
            .accounts
            .transfer("alice", pending.account_number.as_str(), amount("1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotApproved(_))));
    }

    #[tokio::test]
    async fn transfer_from_frozen_source_moves_nothing() {
        let fx = Fixture::new().await;
        let alice = fx.funded("alice", "50").await;
        let bob = fx.active_account("bob").await;
        fx.accounts.freeze(alice.id).await.unwrap();
        let rows_before = fx.ledger.audit(None, None).await.unwrap().len();

        let err = fx
            .accounts
            .transfer("alice", bob.account_number.as_str(), amount("10"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Frozen(_))));
        assert_eq!(fx.accounts.get(alice.id).await.unwrap().balance, Decimal::from(50));
        assert_eq!(fx.accounts.get(bob.id).await.unwrap().balance, Decimal::ZERO);
        assert_eq!(fx.ledger.audit(None, None).await.unwrap().len(), rows_before);
    }

    #[tokio::test]
    async fn pending_source_cannot_withdraw_or_transfer() {
        let fx = Fixture::new().await;
        let alice = fx.customer("alice").await;
        let pending = fx.accounts.create(alice.id, AccountType::Savings).await.unwrap();
        let bob = fx.funded("bob", "30").await;
        let rows_before = fx.ledger.audit(None, None).await.unwrap().len();

        for result in [
            fx.accounts.withdraw("alice", amount("1")).await,
            fx.accounts
                .transfer("alice", bob.account_number.as_str(), amount("1"))
                .await,
        ] {
            assert!(matches!(
                result,
                Err(ServiceError::Domain(DomainError::NotApproved(_)))
            ));
        }
        assert_eq!(fx.accounts.get(pending.id).await.unwrap().balance, Decimal::ZERO);
        assert_eq!(fx.accounts.get(bob.id).await.unwrap().balance, Decimal::from(30));
        assert_eq!(fx.ledger.audit(None, None).await.unwrap().len(), rows_before);
    }

    #[tokio::test]
    async fn deposit_past_the_balance_ceiling_is_invalid_argument() {
        let fx = Fixture::new().await;
        let account = fx.funded("alice", "99999999999999999.99").await;

        let err = fx.accounts.deposit("alice", amount("1")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::InvalidArgument(_))));
        assert_eq!(
            fx.accounts.get(account.id).await.unwrap().balance,
            ledgerbank_core::money::max_money()
        );
        assert_eq!(fx.ledger.audit(None, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn primary_account_skips_closed_ones() {
        let fx = Fixture::new().await;
        let first = fx.active_account("alice").await;
        let alice = fx.directory.find_by_username("alice").await.unwrap();
        let second = fx.accounts.create(alice.id, AccountType::Current).await.unwrap();

        assert_eq!(fx.accounts.account_for_user("alice").await.unwrap().id, first.id);

        fx.close(first.id).await;
        assert_eq!(fx.accounts.account_for_user("alice").await.unwrap().id, second.id);
    }

    #[tokio::test]
    async fn stale_write_surfaces_as_store_conflict() {
        let fx = Fixture::new().await;
        let account = fx.active_account("alice").await;

        let mut tx = fx.store.begin().await.unwrap();
        let mut stale = account.clone();
        stale.version = 0;
        stale.balance = Decimal::from(1_000_000);
        assert!(matches!(
            tx.update_account(&stale).await,
            Err(StoreError::Conflict(_))
        ));
    }
}
