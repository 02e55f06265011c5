use axum::{Json, response::IntoResponse};
use serde_json::json;

pub mod auth;
pub(crate) mod config;
pub(crate) mod health;

/// Undocumented service banner at `/`.
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
