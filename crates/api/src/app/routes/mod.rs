use axum::{Router, routing::get};

pub mod account;
pub mod admin;
pub mod auth;
pub mod common;
pub mod staff;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/account", account::router())
        .nest("/staff", staff::router())
        .nest("/admin", admin::router())
}
