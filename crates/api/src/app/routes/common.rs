use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use ledgerbank_auth::Capability;
use ledgerbank_infra::services::ServiceResult;

use crate::app::errors;
use crate::authz;
use crate::context::PrincipalContext;

/// 403 unless the principal holds one of the capability's roles.
pub fn require(principal: &PrincipalContext, capability: Capability) -> Result<(), Response> {
    authz::authorize_capability(principal, capability).map_err(|e| {
        tracing::warn!(username = principal.username(), %capability, "access denied");
        errors::forbidden(e)
    })
}

/// Unwrap a JSON body, turning malformed input into a 400 in our error shape.
pub fn body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    body.map(|Json(v)| v)
        .map_err(|rejection| errors::validation(rejection.body_text()))
}

pub fn respond<T: Serialize>(status: StatusCode, result: ServiceResult<T>) -> Response {
    match result {
        Ok(value) => (status, Json(value)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Lists are wrapped as `{"items": [...]}`.
pub fn items<T: Serialize>(result: ServiceResult<Vec<T>>) -> Response {
    match result {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
