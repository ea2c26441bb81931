//! Read side of the transaction log, plus the raw append used by seeding and
//! tooling.

use std::sync::Arc;

use tracing::debug;

use ledgerbank_banking::{DateRange, ReferenceId, Transaction};
use ledgerbank_core::{AccountId, DomainError};

use crate::services::accounts::primary_account_of;
use crate::services::error::ServiceResult;
use crate::store::{LedgerStore, TransactionFilter};

#[derive(Clone)]
pub struct TransactionLedger {
    store: Arc<dyn LedgerStore>,
}

impl TransactionLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Append one row as-is. No business validation happens here.
    pub async fn record(&self, transaction: &Transaction) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        tx.insert_transaction(transaction).await?;
        tx.commit().await?;
        debug!(transaction_id = %transaction.id, reference_id = %transaction.reference_id, "transaction recorded");
        Ok(())
    }

    /// History of `username`'s primary account, newest first.
    ///
    /// `start`/`end` are optional `YYYY-MM-DD` dates; `end` is inclusive.
    pub async fn history_for_user(
        &self,
        username: &str,
        start: Option<&str>,
        end: Option<&str>,
    ) -> ServiceResult<Vec<Transaction>> {
        let range = DateRange::from_dates(start, end)?;
        let mut tx = self.store.begin().await?;
        let account = primary_account_of(tx.as_mut(), username).await?;
        if range.is_empty() {
            return Ok(Vec::new());
        }
        Ok(tx
            .query_transactions(&TransactionFilter {
                account: Some(account.id),
                range,
            })
            .await?)
    }

    pub async fn history_for_account(
        &self,
        account_id: AccountId,
        start: Option<&str>,
        end: Option<&str>,
    ) -> ServiceResult<Vec<Transaction>> {
        let range = DateRange::from_dates(start, end)?;
        let mut tx = self.store.begin().await?;
        if tx.find_account(account_id).await?.is_none() {
            return Err(DomainError::not_found(format!("account {account_id}")).into());
        }
        if range.is_empty() {
            return Ok(Vec::new());
        }
        Ok(tx
            .query_transactions(&TransactionFilter {
                account: Some(account_id),
                range,
            })
            .await?)
    }

    /// System-wide history.
    pub async fn audit(&self, start: Option<&str>, end: Option<&str>) -> ServiceResult<Vec<Transaction>> {
        let range = DateRange::from_dates(start, end)?;
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let mut tx = self.store.begin().await?;
        Ok(tx
            .query_transactions(&TransactionFilter {
                account: None,
                range,
            })
            .await?)
    }

    /// The one or two rows of a single logical operation.
    pub async fn by_reference(&self, reference_id: &str) -> ServiceResult<Vec<Transaction>> {
        let mut tx = self.store.begin().await?;
        Ok(tx
            .find_transactions_by_reference(&ReferenceId::from(reference_id))
            .await?)
    }
}
