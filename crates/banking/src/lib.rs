//! Banking module (account lifecycle, double-entry transaction rows).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns. The
//! application services in `ledgerbank-infra` load accounts, call into these
//! types and persist what they return.

pub mod account;
pub mod account_number;
pub mod history;
pub mod transaction;

pub use account::{Account, AccountStatus, AccountType, transfer_between};
pub use account_number::{AccountNumber, AccountNumberSource, RandomAccountNumbers};
pub use history::{DateRange, newest_first};
pub use transaction::{AccountRef, ReferenceId, Transaction, TransactionType};
