//! Staff back office: approvals, freezes, account listings.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{get, put},
};

use ledgerbank_auth::Capability;
use ledgerbank_core::AccountId;

use crate::app::dto;
use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/users/pending-accounts", get(pending_users))
        .route("/account/:id/approve", put(approve))
        .route("/accounts/all", get(all_accounts))
        .route("/account/:id/freeze", put(freeze))
        .route("/account/:id/unfreeze", put(unfreeze))
}

/// GET /staff/users/pending-accounts
pub async fn pending_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = common::require(&principal, Capability::ListPendingUsers) {
        return resp;
    }
    common::items(services.directory.users_with_pending_accounts().await)
}

/// PUT /staff/account/:id/approve
pub async fn approve(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = common::require(&principal, Capability::ApproveAccount) {
        return resp;
    }
    let id = match dto::parse_id::<AccountId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    common::respond(StatusCode::OK, services.accounts.approve(id).await)
}

/// GET /staff/accounts/all
pub async fn all_accounts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = common::require(&principal, Capability::ListAccounts) {
        return resp;
    }
    common::items(services.accounts.list_all().await)
}

/// PUT /staff/account/:id/freeze (also mounted under /admin)
pub async fn freeze(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = common::require(&principal, Capability::FreezeAccount) {
        return resp;
    }
    let id = match dto::parse_id::<AccountId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    common::respond(StatusCode::OK, services.accounts.freeze(id).await)
}

/// PUT /staff/account/:id/unfreeze (also mounted under /admin)
pub async fn unfreeze(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = common::require(&principal, Capability::FreezeAccount) {
        return resp;
    }
    let id = match dto::parse_id::<AccountId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    common::respond(StatusCode::OK, services.accounts.unfreeze(id).await)
}
