//! Application services.
//!
//! Each service method is one unit of work against the `LedgerStore`; the
//! domain crates do the rule checking and the services sequence loads,
//! locks, updates and commits around them.

pub mod accounts;
pub mod auth;
pub mod directory;
pub mod error;
pub mod ledger;

pub use accounts::{AccountService, Posting};
pub use auth::{AuthService, AuthToken};
pub use directory::{UserDirectory, UserSummary};
pub use error::{ServiceError, ServiceResult};
pub use ledger::TransactionLedger;

use std::sync::Arc;

use ledgerbank_auth::{PasswordHasher, TokenIssuer};
use ledgerbank_core::Clock;

use crate::config::SecurityConfig;
use crate::store::LedgerStore;

/// All services, wired against one store and one clock.
#[derive(Clone)]
pub struct LedgerServices {
    pub accounts: AccountService,
    pub ledger: TransactionLedger,
    pub auth: AuthService,
    pub directory: UserDirectory,
}

impl LedgerServices {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenIssuer>,
        security: &SecurityConfig,
    ) -> Self {
        Self {
            accounts: AccountService::new(store.clone(), clock.clone()),
            ledger: TransactionLedger::new(store.clone()),
            auth: AuthService::new(
                store.clone(),
                hasher.clone(),
                tokens,
                clock.clone(),
                security.lockout,
                security.token_ttl,
            ),
            directory: UserDirectory::new(store, hasher, clock),
        }
    }
}
