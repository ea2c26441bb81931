//! Startup data: the three roles, and optionally the default staff users.

use tracing::{debug, info};

use ledgerbank_auth::{Role, RoleName};
use ledgerbank_core::DomainError;

use crate::config::SeedConfig;
use crate::services::directory::UserDirectory;
use crate::services::error::{ServiceError, ServiceResult};
use crate::store::LedgerStore;

/// Idempotent; safe to run on every start.
pub async fn seed(
    store: &dyn LedgerStore,
    directory: &UserDirectory,
    config: &SeedConfig,
) -> ServiceResult<()> {
    seed_roles(store).await?;
    if config.default_users {
        ensure_user(directory, "admin", "admin@bank.com", &config.admin_password, RoleName::Admin)
            .await?;
        ensure_user(directory, "staff1", "staff1@bank.com", &config.staff_password, RoleName::Staff)
            .await?;
    }
    Ok(())
}

pub async fn seed_roles(store: &dyn LedgerStore) -> ServiceResult<()> {
    let mut tx = store.begin().await?;
    for name in RoleName::ALL {
        if tx.find_role(name).await?.is_none() {
            tx.insert_role(&Role::new(name)).await?;
            info!(role = %name, "role created");
        }
    }
    tx.commit().await?;
    Ok(())
}

async fn ensure_user(
    directory: &UserDirectory,
    username: &str,
    email: &str,
    password: &str,
    role: RoleName,
) -> ServiceResult<()> {
    match directory.find_by_username(username).await {
        Ok(_) => {
            debug!(username, "default user already present");
            Ok(())
        }
        Err(ServiceError::Domain(DomainError::NotFound(_))) => {
            directory.create_user(username, email, password, &[role]).await?;
            info!(username, role = %role, "default user created");
            Ok(())
        }
        Err(err) => Err(err),
    }
}
