//! Admin endpoints: user management and the system-wide audit trail.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::Response,
    routing::{get, put},
};

use ledgerbank_auth::Capability;
use ledgerbank_core::UserId;

use crate::app::dto::{self, HistoryQuery, ResetPasswordRequest};
use crate::app::routes::{common, staff};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/user/:id/enable", put(enable_user))
        .route("/user/:id/disable", put(disable_user))
        .route("/user/:id/reset-password", put(reset_password))
        .route("/account/:id/freeze", put(staff::freeze))
        .route("/account/:id/unfreeze", put(staff::unfreeze))
        .route("/transactions/audit", get(audit))
}

/// GET /admin/users - every user with their primary account
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = common::require(&principal, Capability::ManageUsers) {
        return resp;
    }
    common::items(services.directory.list_users().await)
}

/// PUT /admin/user/:id/enable
pub async fn enable_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = common::require(&principal, Capability::ManageUsers) {
        return resp;
    }
    let id = match dto::parse_id::<UserId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    common::respond(StatusCode::OK, services.directory.enable(id).await)
}

/// PUT /admin/user/:id/disable
pub async fn disable_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = common::require(&principal, Capability::ManageUsers) {
        return resp;
    }
    let id = match dto::parse_id::<UserId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    common::respond(StatusCode::OK, services.directory.disable(id).await)
}

/// PUT /admin/user/:id/reset-password `{new_password}`
pub async fn reset_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Response {
    if let Err(resp) = common::require(&principal, Capability::ResetPassword) {
        return resp;
    }
    let id = match dto::parse_id::<UserId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let body = match common::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    if let Err(resp) = dto::validate_password(&body.new_password) {
        return resp;
    }
    common::respond(
        StatusCode::OK,
        services.directory.reset_password(id, &body.new_password).await,
    )
}

/// GET /admin/transactions/audit?start_date&end_date
pub async fn audit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    if let Err(resp) = common::require(&principal, Capability::AuditTransactions) {
        return resp;
    }
    common::items(
        services
            .ledger
            .audit(query.start_date.as_deref(), query.end_date.as_deref())
            .await,
    )
}
