use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use ledgerbank_auth::AuthzError;
use ledgerbank_core::DomainError;
use ledgerbank_infra::services::ServiceError;

/// Domain outcomes map to client errors; every other fault is logged and
/// reported as an opaque 500.
pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        other => {
            tracing::error!(error = %other, "request failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal server error",
            )
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let (status, code) = match &err {
        DomainError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        DomainError::InvalidState(_) => (StatusCode::CONFLICT, "invalid_state"),
        DomainError::Frozen(_) => (StatusCode::BAD_REQUEST, "account_frozen"),
        DomainError::NotApproved(_) => (StatusCode::FORBIDDEN, "account_not_approved"),
        DomainError::InsufficientFunds(_) => (StatusCode::BAD_REQUEST, "insufficient_funds"),
        DomainError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "invalid_argument"),
        DomainError::UsernameTaken(_) => (StatusCode::CONFLICT, "username_taken"),
        DomainError::EmailTaken(_) => (StatusCode::CONFLICT, "email_taken"),
        DomainError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
        DomainError::AccountLocked { .. } => (StatusCode::LOCKED, "account_locked"),
        DomainError::UserDisabled => (StatusCode::FORBIDDEN, "user_disabled"),
    };
    json_error(status, code, err.to_string())
}

pub fn forbidden(err: AuthzError) -> axum::response::Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
}

pub fn validation(message: impl Into<String>) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
