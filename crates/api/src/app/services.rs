//! Service wiring: picks the store, builds the services, seeds startup data.

use std::sync::Arc;

use thiserror::Error;

use ledgerbank_auth::{Argon2PasswordHasher, JwtTokenIssuer, PasswordHasher, TokenIssuer};
use ledgerbank_core::{Clock, SystemClock};
use ledgerbank_infra::config::AppConfig;
use ledgerbank_infra::seed;
use ledgerbank_infra::services::{
    AccountService, AuthService, LedgerServices, ServiceError, TransactionLedger, UserDirectory,
};
use ledgerbank_infra::store::{InMemoryLedgerStore, LedgerStore, PostgresLedgerStore, StoreError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("could not open the ledger store: {0}")]
    Store(#[from] StoreError),

    #[error("seeding failed: {0}")]
    Seed(#[from] ServiceError),
}

/// Everything the handlers need, shared behind an `Arc`.
#[derive(Clone)]
pub struct AppServices {
    pub accounts: AccountService,
    pub ledger: TransactionLedger,
    pub auth: AuthService,
    pub directory: UserDirectory,
    pub tokens: Arc<dyn TokenIssuer>,
}

impl AppServices {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenIssuer>,
        config: &AppConfig,
    ) -> Self {
        let LedgerServices {
            accounts,
            ledger,
            auth,
            directory,
        } = LedgerServices::new(store, clock, hasher, tokens.clone(), &config.security);
        Self {
            accounts,
            ledger,
            auth,
            directory,
            tokens,
        }
    }
}

/// Postgres when `DATABASE_URL` is configured, in-memory otherwise.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, StartupError> {
    let store: Arc<dyn LedgerStore> = match &config.database_url {
        Some(url) => {
            tracing::info!("using postgres ledger store");
            Arc::new(PostgresLedgerStore::connect(url).await?)
        }
        None => {
            tracing::info!("DATABASE_URL not set; using in-memory ledger store");
            Arc::new(InMemoryLedgerStore::new())
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let tokens: Arc<dyn TokenIssuer> = Arc::new(JwtTokenIssuer::new(
        config.security.jwt_secret.as_bytes(),
        clock.clone(),
    ));
    let services = AppServices::new(
        store.clone(),
        clock,
        Arc::new(Argon2PasswordHasher::new()),
        tokens,
        config,
    );

    seed::seed(store.as_ref(), &services.directory, &config.seed).await?;
    Ok(services)
}
