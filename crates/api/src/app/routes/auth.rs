//! Public endpoints: self-registration and login.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::Response,
    routing::post,
};

use crate::app::dto::{LoginRequest, RegisterRequest};
use crate::app::routes::common;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// POST /auth/register - create an enabled CUSTOMER
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Response {
    let body = match common::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    if let Err(resp) = body.validate() {
        return resp;
    }

    common::respond(
        StatusCode::CREATED,
        services
            .auth
            .register(body.username.trim(), body.email.trim(), &body.password)
            .await,
    )
}

/// POST /auth/login - exchange credentials for a bearer token
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let body = match common::body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    if let Err(resp) = body.validate() {
        return resp;
    }

    common::respond(
        StatusCode::OK,
        services.auth.login(body.username.trim(), &body.password).await,
    )
}
