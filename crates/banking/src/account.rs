use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerbank_core::{AccountId, Amount, DomainError, DomainResult, Entity, UserId, Versioned};

use crate::{AccountNumber, AccountRef};

/// Account lifecycle.
///
/// `PENDING_APPROVAL -> ACTIVE <-> FROZEN`, `ACTIVE -> CLOSED` (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    PendingApproval,
    Active,
    Frozen,
    Closed,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::PendingApproval => "PENDING_APPROVAL",
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Frozen => "FROZEN",
            AccountStatus::Closed => "CLOSED",
        }
    }
}

impl core::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_APPROVAL" => Ok(AccountStatus::PendingApproval),
            "ACTIVE" => Ok(AccountStatus::Active),
            "FROZEN" => Ok(AccountStatus::Frozen),
            "CLOSED" => Ok(AccountStatus::Closed),
            other => Err(DomainError::invalid_argument(format!(
                "unknown account status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Savings,
    Current,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "SAVINGS",
            AccountType::Current => "CURRENT",
        }
    }
}

impl core::fmt::Display for AccountType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SAVINGS" => Ok(AccountType::Savings),
            "CURRENT" => Ok(AccountType::Current),
            other => Err(DomainError::invalid_argument(format!(
                "unknown account type '{other}'"
            ))),
        }
    }
}

/// A customer account.
///
/// # Invariants
/// - `account_number` never changes once assigned.
/// - `balance` never goes below zero through `debit`.
/// - Money only moves while the account is `ACTIVE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub account_number: AccountNumber,
    pub balance: Decimal,
    pub account_type: AccountType,
    pub status: AccountStatus,
    pub approved_by_staff: bool,
    pub owner: UserId,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl Account {
    /// A new account awaiting staff approval, with a zero balance.
    pub fn open(
        owner: UserId,
        account_type: AccountType,
        account_number: AccountNumber,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AccountId::new(),
            account_number,
            balance: Decimal::ZERO,
            account_type,
            status: AccountStatus::PendingApproval,
            approved_by_staff: false,
            owner,
            created_at: now,
            version: 0,
        }
    }

    pub fn reference(&self) -> AccountRef {
        AccountRef {
            id: self.id,
            number: self.account_number.clone(),
        }
    }

    pub fn approve(&mut self) -> DomainResult<()> {
        if self.status != AccountStatus::PendingApproval {
            return Err(DomainError::invalid_state(format!(
                "account {} is {}, only PENDING_APPROVAL accounts can be approved",
                self.account_number, self.status
            )));
        }
        self.approved_by_staff = true;
        self.status = AccountStatus::Active;
        Ok(())
    }

    pub fn freeze(&mut self) -> DomainResult<()> {
        match self.status {
            AccountStatus::Active => {
                self.status = AccountStatus::Frozen;
                Ok(())
            }
            AccountStatus::Frozen => Err(DomainError::invalid_state(format!(
                "account {} is already frozen",
                self.account_number
            ))),
            other => Err(DomainError::invalid_state(format!(
                "account {} is {other} and cannot be frozen",
                self.account_number
            ))),
        }
    }

    pub fn unfreeze(&mut self) -> DomainResult<()> {
        if self.status != AccountStatus::Frozen {
            return Err(DomainError::invalid_state(format!(
                "account {} is not frozen",
                self.account_number
            )));
        }
        self.status = AccountStatus::Active;
        Ok(())
    }

    /// Fails unless money may move through this account.
    pub fn ensure_operational(&self) -> DomainResult<()> {
        match self.status {
            AccountStatus::Active => Ok(()),
            AccountStatus::Frozen => Err(DomainError::frozen(format!(
                "account {} is frozen",
                self.account_number
            ))),
            AccountStatus::PendingApproval => Err(DomainError::not_approved(format!(
                "account {} is pending staff approval",
                self.account_number
            ))),
            AccountStatus::Closed => Err(DomainError::invalid_state(format!(
                "account {} is closed",
                self.account_number
            ))),
        }
    }

    pub fn credit(&mut self, amount: Amount) -> DomainResult<()> {
        self.ensure_operational()?;
        self.balance = amount.added_to(self.balance)?;
        Ok(())
    }

    pub fn debit(&mut self, amount: Amount) -> DomainResult<()> {
        self.ensure_operational()?;
        self.ensure_covers(amount)?;
        self.balance = amount.taken_from(self.balance)?;
        Ok(())
    }

    fn ensure_covers(&self, amount: Amount) -> DomainResult<()> {
        if self.balance < amount.value() {
            return Err(DomainError::insufficient_funds(format!(
                "account {} has {} available, {} requested",
                self.account_number, self.balance, amount
            )));
        }
        Ok(())
    }
}

/// Move `amount` from `source` to `destination`.
///
/// Checks run in a fixed order and nothing is mutated unless all pass:
/// same account, source status, destination status, source funds.
pub fn transfer_between(
    source: &mut Account,
    destination: &mut Account,
    amount: Amount,
) -> DomainResult<()> {
    if source.id == destination.id {
        return Err(DomainError::invalid_argument(
            "cannot transfer to the same account",
        ));
    }
    source.ensure_operational()?;
    destination.ensure_operational()?;
    source.ensure_covers(amount)?;

    let source_balance = amount.taken_from(source.balance)?;
    let destination_balance = amount.added_to(destination.balance)?;
    source.balance = source_balance;
    destination.balance = destination_balance;
    Ok(())
}

impl Entity for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Versioned for Account {
    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Transaction;
    use proptest::prelude::*;

    fn amount(cents: i64) -> Amount {
        Amount::new(Decimal::new(cents, 2)).unwrap()
    }

    fn active_account(number: &str) -> Account {
        let mut account = Account::open(
            UserId::new(),
            AccountType::Savings,
            AccountNumber::parse(number).unwrap(),
            Utc::now(),
        );
        account.approve().unwrap();
        account
    }

    #[test]
    fn approve_only_from_pending() {
        let mut account = active_account("0000000001");
        assert!(account.approved_by_staff);
        assert_eq!(account.status, AccountStatus::Active);
        assert!(matches!(account.approve(), Err(DomainError::InvalidState(_))));
    }

    #[test]
    fn freeze_and_unfreeze_guards() {
        let mut account = active_account("0000000001");
        account.freeze().unwrap();
        assert!(matches!(account.freeze(), Err(DomainError::InvalidState(_))));
        account.unfreeze().unwrap();
        assert!(matches!(account.unfreeze(), Err(DomainError::InvalidState(_))));

        let mut pending = Account::open(
            UserId::new(),
            AccountType::Current,
            AccountNumber::parse("0000000002").unwrap(),
            Utc::now(),
        );
        assert!(matches!(pending.freeze(), Err(DomainError::InvalidState(_))));

        account.status = AccountStatus::Closed;
        assert!(matches!(account.freeze(), Err(DomainError::InvalidState(_))));
    }

    #[test]
    fn money_does_not_move_through_blocked_accounts() {
        let mut pending = Account::open(
            UserId::new(),
            AccountType::Savings,
            AccountNumber::parse("0000000003").unwrap(),
            Utc::now(),
        );
        assert!(matches!(pending.credit(amount(100)), Err(DomainError::NotApproved(_))));

        let mut frozen = active_account("0000000004");
        frozen.credit(amount(500)).unwrap();
        frozen.freeze().unwrap();
        assert!(matches!(frozen.debit(amount(100)), Err(DomainError::Frozen(_))));
        assert_eq!(frozen.balance, Decimal::new(500, 2));
    }

    #[test]
    fn overdraft_is_rejected_without_mutation() {
        let mut account = active_account("0000000005");
        account.credit(amount(1_000)).unwrap();
        assert!(matches!(
            account.debit(amount(1_001)),
            Err(DomainError::InsufficientFunds(_))
        ));
        assert_eq!(account.balance, Decimal::new(1_000, 2));
    }

    #[test]
    fn transfer_checks_same_account_before_anything_else() {
        let mut account = active_account("0000000006");
        let mut twin = account.clone();
        // No funds, still the same-account error wins.
        assert!(matches!(
            transfer_between(&mut account, &mut twin, amount(100)),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn transfer_reports_destination_status() {
        let mut source = active_account("0000000007");
        source.credit(amount(10_000)).unwrap();
        let mut dest = active_account("0000000008");
        dest.freeze().unwrap();

        assert!(matches!(
            transfer_between(&mut source, &mut dest, amount(100)),
            Err(DomainError::Frozen(_))
        ));
        assert_eq!(source.balance, Decimal::new(10_000, 2));
    }

    #[test]
    fn credit_past_the_balance_ceiling_is_refused() {
        let mut account = active_account("0000000009");
        account.balance = ledgerbank_core::money::max_money();
        assert!(matches!(account.credit(amount(1)), Err(DomainError::InvalidArgument(_))));
        assert_eq!(account.balance, ledgerbank_core::money::max_money());
    }

    #[test]
    fn transfer_into_a_full_account_moves_nothing() {
        let mut source = active_account("0000000010");
        source.credit(amount(500)).unwrap();
        let mut dest = active_account("0000000011");
        dest.balance = ledgerbank_core::money::max_money();

        assert!(matches!(
            transfer_between(&mut source, &mut dest, amount(100)),
            Err(DomainError::InvalidArgument(_))
        ));
        assert_eq!(source.balance, Decimal::new(500, 2));
        assert_eq!(dest.balance, ledgerbank_core::money::max_money());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Deposit(usize, i64),
        Withdraw(usize, i64),
        Transfer(usize, usize, i64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..3, 1i64..50_000).prop_map(|(a, c)| Op::Deposit(a, c)),
            (0usize..3, 1i64..50_000).prop_map(|(a, c)| Op::Withdraw(a, c)),
            (0usize..3, 0usize..3, 1i64..50_000).prop_map(|(a, b, c)| Op::Transfer(a, b, c)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: after any sequence of operations, each balance equals the
        /// sum of the signed effects of the rows referencing that account, and
        /// no balance is negative.
        #[test]
        fn balances_reconcile_with_rows(ops in prop::collection::vec(op(), 1..40)) {
            let mut accounts = vec![
                active_account("1000000000"),
                active_account("2000000000"),
                active_account("3000000000"),
            ];
            let mut rows: Vec<Transaction> = Vec::new();
            let now = Utc::now();

            for op in ops {
                match op {
                    Op::Deposit(a, cents) => {
                        let amt = amount(cents);
                        if accounts[a].credit(amt).is_ok() {
                            rows.push(Transaction::deposit(accounts[a].reference(), amt, now));
                        }
                    }
                    Op::Withdraw(a, cents) => {
                        let amt = amount(cents);
                        if accounts[a].debit(amt).is_ok() {
                            rows.push(Transaction::withdrawal(accounts[a].reference(), amt, now));
                        }
                    }
                    Op::Transfer(a, b, cents) => {
                        let amt = amount(cents);
                        if a == b {
                            let mut twin = accounts[a].clone();
                            prop_assert!(transfer_between(&mut accounts[a], &mut twin, amt).is_err());
                            continue;
                        }
                        let mut source = accounts[a].clone();
                        let mut dest = accounts[b].clone();
                        if transfer_between(&mut source, &mut dest, amt).is_ok() {
                            rows.extend(Transaction::transfer(source.reference(), dest.reference(), amt, now));
                            accounts[a] = source;
                            accounts[b] = dest;
                        }
                    }
                }
            }

            for account in &accounts {
                let sum: Decimal = rows.iter().map(|t| t.effect_on(&account.id)).sum();
                prop_assert_eq!(account.balance, sum);
                prop_assert!(account.balance >= Decimal::ZERO);
            }
        }
    }
}
