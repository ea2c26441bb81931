//! Append-only transaction rows.
//!
//! Each balance change writes one row; a transfer writes two (a debit leg and
//! a credit leg) sharing a reference id.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ledgerbank_core::{AccountId, Amount, DomainError, Entity, TransactionId};

use crate::AccountNumber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::Transfer => "TRANSFER",
        }
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(TransactionType::Deposit),
            "WITHDRAWAL" => Ok(TransactionType::Withdrawal),
            "TRANSFER" => Ok(TransactionType::Transfer),
            other => Err(DomainError::invalid_argument(format!(
                "unknown transaction type '{other}'"
            ))),
        }
    }
}

/// Groups the rows of one logical operation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceId(String);

impl ReferenceId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ReferenceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ReferenceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl core::fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An account as seen from a transaction row: id plus its number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountRef {
    pub id: AccountId,
    pub number: AccountNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub transaction_type: TransactionType,
    /// Negative only for the debit leg of a transfer.
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub reference_id: ReferenceId,
    pub source: Option<AccountRef>,
    pub destination: Option<AccountRef>,
}

impl Transaction {
    pub fn deposit(destination: AccountRef, amount: Amount, now: DateTime<Utc>) -> Self {
        Self {
            id: TransactionId::new(),
            transaction_type: TransactionType::Deposit,
            amount: amount.value(),
            timestamp: now,
            reference_id: ReferenceId::generate(),
            source: None,
            destination: Some(destination),
        }
    }

    pub fn withdrawal(source: AccountRef, amount: Amount, now: DateTime<Utc>) -> Self {
        Self {
            id: TransactionId::new(),
            transaction_type: TransactionType::Withdrawal,
            amount: amount.value(),
            timestamp: now,
            reference_id: ReferenceId::generate(),
            source: Some(source),
            destination: None,
        }
    }

    /// Debit leg then credit leg; both carry both account references.
    pub fn transfer(
        source: AccountRef,
        destination: AccountRef,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> [Self; 2] {
        let reference_id = ReferenceId::generate();
        let debit = Self {
            id: TransactionId::new(),
            transaction_type: TransactionType::Transfer,
            amount: -amount.value(),
            timestamp: now,
            reference_id: reference_id.clone(),
            source: Some(source.clone()),
            destination: Some(destination.clone()),
        };
        let credit = Self {
            id: TransactionId::new(),
            transaction_type: TransactionType::Transfer,
            amount: amount.value(),
            timestamp: now,
            reference_id,
            source: Some(source),
            destination: Some(destination),
        };
        [debit, credit]
    }

    pub fn touches(&self, account: &AccountId) -> bool {
        self.source.as_ref().is_some_and(|r| &r.id == account)
            || self.destination.as_ref().is_some_and(|r| &r.id == account)
    }

    /// Signed change this row made to `account`'s balance.
    pub fn effect_on(&self, account: &AccountId) -> Decimal {
        let is_source = self.source.as_ref().is_some_and(|r| &r.id == account);
        let is_destination = self.destination.as_ref().is_some_and(|r| &r.id == account);
        match self.transaction_type {
            TransactionType::Deposit if is_destination => self.amount,
            TransactionType::Withdrawal if is_source => -self.amount,
            TransactionType::Transfer if self.amount.is_sign_negative() && is_source => self.amount,
            TransactionType::Transfer if self.amount.is_sign_positive() && is_destination => {
                self.amount
            }
            _ => Decimal::ZERO,
        }
    }
}

impl Entity for Transaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_ref(number: &str) -> AccountRef {
        AccountRef {
            id: AccountId::new(),
            number: AccountNumber::parse(number).unwrap(),
        }
    }

    #[test]
    fn transfer_legs_share_reference_and_offset() {
        let x = account_ref("1111111111");
        let y = account_ref("2222222222");
        let amount = Amount::new(Decimal::new(2000, 2)).unwrap();

        let [debit, credit] = Transaction::transfer(x.clone(), y.clone(), amount, Utc::now());

        assert_eq!(debit.reference_id, credit.reference_id);
        assert_ne!(debit.id, credit.id);
        assert_eq!(debit.amount, Decimal::new(-2000, 2));
        assert_eq!(credit.amount, Decimal::new(2000, 2));
        assert_eq!(debit.amount + credit.amount, Decimal::ZERO);

        assert_eq!(debit.effect_on(&x.id) + credit.effect_on(&x.id), Decimal::new(-2000, 2));
        assert_eq!(debit.effect_on(&y.id) + credit.effect_on(&y.id), Decimal::new(2000, 2));
        assert!(debit.touches(&y.id) && credit.touches(&x.id));
    }

    #[test]
    fn withdrawal_is_stored_as_magnitude() {
        let x = account_ref("1111111111");
        let amount = Amount::new(Decimal::from(30)).unwrap();
        let row = Transaction::withdrawal(x.clone(), amount, Utc::now());

        assert_eq!(row.amount, Decimal::from(30));
        assert_eq!(row.effect_on(&x.id), Decimal::from(-30));
        assert!(row.destination.is_none());
    }

    #[test]
    fn deposits_get_distinct_references() {
        let x = account_ref("1111111111");
        let amount = Amount::new(Decimal::ONE).unwrap();
        let a = Transaction::deposit(x.clone(), amount, Utc::now());
        let b = Transaction::deposit(x, amount, Utc::now());
        assert_ne!(a.reference_id, b.reference_id);
    }

    #[test]
    fn serializes_type_in_upper_snake() {
        let json = serde_json::to_value(TransactionType::Withdrawal).unwrap();
        assert_eq!(json, serde_json::json!("WITHDRAWAL"));
    }
}
