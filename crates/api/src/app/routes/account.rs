//! Customer self-service plus staff account creation.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::Response,
    routing::{get, post},
};

use ledgerbank_auth::Capability;
use ledgerbank_core::UserId;

use crate::app::dto::{self, AmountRequest, CreateAccountRequest, HistoryQuery, TransferRequest};
use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/me", get(my_account))
        .route("/deposit", post(deposit))
        .route("/withdraw", post(withdraw))
        .route("/transfer", post(transfer))
        .route("/transactions", get(my_transactions))
        .route("/create/:user_id", post(create_account))
}

/// GET /account/me
pub async fn my_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(resp) = common::require(&principal, Capability::ViewOwnAccount) {
        return resp;
    }
    common::respond(
        StatusCode::OK,
        services.accounts.account_for_user(principal.username()).await,
    )
}

/// POST /account/deposit `{amount}`
pub async fn deposit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<AmountRequest>, JsonRejection>,
) -> Response {
    if let Err(resp) = common::require(&principal, Capability::Deposit) {
        return resp;
    }
    let amount = match common::body(body).and_then(|b| dto::to_amount(b.amount)) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    common::respond(
        StatusCode::OK,
        services.accounts.deposit(principal.username(), amount).await,
    )
}

/// POST /account/withdraw `{amount}`
pub async fn withdraw(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<AmountRequest>, JsonRejection>,
) -> Response {
    if let Err(resp) = common::require(&principal, Capability::Withdraw) {
        return resp;
    }
    let amount = match common::body(body).and_then(|b| dto::to_amount(b.amount)) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    common::respond(
        StatusCode::OK,
        services.accounts.withdraw(principal.username(), amount).await,
    )
}

/// POST /account/transfer `{destination_account_number, amount}`
pub async fn transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> Response {
    if let Err(resp) = common::require(&principal, Capability::Transfer) {
        return resp;
    }
    let body = match common::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let amount = match body.validate() {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    common::respond(
        StatusCode::OK,
        services
            .accounts
            .transfer(
                principal.username(),
                body.destination_account_number.trim(),
                amount,
            )
            .await,
    )
}

/// GET /account/transactions?start_date&end_date
pub async fn my_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    if let Err(resp) = common::require(&principal, Capability::ViewOwnTransactions) {
        return resp;
    }
    common::items(
        services
            .ledger
            .history_for_user(
                principal.username(),
                query.start_date.as_deref(),
                query.end_date.as_deref(),
            )
            .await,
    )
}

/// POST /account/create/:user_id `{account_type}` (staff)
pub async fn create_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(user_id): Path<String>,
    body: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Response {
    if let Err(resp) = common::require(&principal, Capability::CreateAccount) {
        return resp;
    }
    let user_id = match dto::parse_id::<UserId>(&user_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let account_type = match common::body(body).and_then(|b| b.validate()) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    common::respond(
        StatusCode::CREATED,
        services.accounts.create(user_id, account_type).await,
    )
}
