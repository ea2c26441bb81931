//! Shared fixtures for service tests: in-memory store, manual clock and a
//! cheap password hasher.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use ledgerbank_auth::{HashError, JwtTokenIssuer, LockoutPolicy, PasswordHasher, User};
use ledgerbank_banking::{Account, AccountStatus, AccountType};
use ledgerbank_core::{AccountId, Amount, ManualClock};

use crate::config::SecurityConfig;
use crate::seed::seed_roles;
use crate::services::{AccountService, AuthService, LedgerServices, TransactionLedger, UserDirectory};
use crate::store::{InMemoryLedgerStore, LedgerStore};

pub const PASSWORD: &str = "password1";

pub fn amount(value: &str) -> Amount {
    Amount::new(value.parse::<Decimal>().unwrap()).unwrap()
}

/// Stores passwords as `plain:<password>`; Argon2 is too slow for every test.
pub struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        Ok(format!("plain:{plaintext}"))
    }

    fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, HashError> {
        digest
            .strip_prefix("plain:")
            .map(|stored| stored == plaintext)
            .ok_or_else(|| HashError::MalformedDigest(digest.to_string()))
    }
}

pub struct Fixture {
    pub store: Arc<InMemoryLedgerStore>,
    pub clock: Arc<ManualClock>,
    pub tokens: Arc<JwtTokenIssuer>,
    pub accounts: AccountService,
    pub ledger: TransactionLedger,
    pub auth: AuthService,
    pub directory: UserDirectory,
}

impl Fixture {
    /// Roles seeded, no users.
    pub async fn new() -> Self {
        let fixture = Self::unseeded().await;
        seed_roles(fixture.store.as_ref()).await.unwrap();
        fixture
    }

    pub async fn unseeded() -> Self {
        let store = Arc::new(InMemoryLedgerStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
        ));
        let tokens = Arc::new(JwtTokenIssuer::new(b"test-secret", clock.clone()));
        let security = SecurityConfig {
            jwt_secret: "test-secret".to_string(),
            token_ttl: Duration::minutes(60),
            lockout: LockoutPolicy::default(),
        };
        let services = LedgerServices::new(
            store.clone(),
            clock.clone(),
            Arc::new(PlainHasher),
            tokens.clone(),
            &security,
        );

        Self {
            store,
            clock,
            tokens,
            accounts: services.accounts,
            ledger: services.ledger,
            auth: services.auth,
            directory: services.directory,
        }
    }

    /// A registered customer with password [`PASSWORD`].
    pub async fn customer(&self, username: &str) -> User {
        self.auth
            .register(username, &format!("{username}@example.com"), PASSWORD)
            .await
            .unwrap()
    }

    /// An approved account for `username`, registering them if needed.
    pub async fn active_account(&self, username: &str) -> Account {
        let user = match self.directory.find_by_username(username).await {
            Ok(user) => user,
            Err(_) => self.customer(username).await,
        };
        let account = self
            .accounts
            .create(user.id, AccountType::Savings)
            .await
            .unwrap();
        self.accounts.approve(account.id).await.unwrap()
    }

    /// An approved account holding one deposit of `balance`.
    pub async fn funded(&self, username: &str, balance: &str) -> Account {
        self.active_account(username).await;
        self.accounts
            .deposit(username, amount(balance))
            .await
            .unwrap()
            .account
    }

    /// Closing is not a service operation; write the status directly.
    pub async fn close(&self, account_id: AccountId) {
        let mut tx = self.store.begin().await.unwrap();
        let mut account = tx.lock_accounts(&[account_id]).await.unwrap().remove(0);
        account.status = AccountStatus::Closed;
        tx.update_account(&account).await.unwrap();
        tx.commit().await.unwrap();
    }
}
