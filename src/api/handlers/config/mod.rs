//! Config document and sync endpoints.
//!
//! Every handler here is gated by session validation; the document store is
//! only reachable with a live session. `GET /sync` is the polling side of
//! change propagation: clients pass the last `updatedAt` they saw and get
//! the full document back only when something newer exists.

use axum::{
    Json,
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use self::storage::{merge_patch_document, read_document, read_document_since, replace_document};
use self::types::{ConfigResponse, ConfigWriteRequest, SyncParams};
use super::auth::types::AckResponse;
use super::auth::{AuthState, session::authenticate_session};

pub(crate) mod storage;
pub(crate) mod types;

struct SessionGate {
    user_id: uuid::Uuid,
}

async fn require_session(
    headers: &HeaderMap,
    pool: &PgPool,
    auth_state: &AuthState,
) -> Result<SessionGate, Response> {
    match authenticate_session(headers, pool, auth_state).await {
        Ok(Some(record)) => Ok(SessionGate {
            user_id: record.user_id,
        }),
        Ok(None) => Err((StatusCode::UNAUTHORIZED, "Not signed in".to_string()).into_response()),
        Err(status) => Err(status.into_response()),
    }
}

#[utoipa::path(
    get,
    path = "/config",
    responses(
        (status = 200, description = "Current config document", body = ConfigResponse),
        (status = 401, description = "Not signed in", body = String)
    ),
    tag = "config"
)]
pub async fn get_config(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let session = match require_session(&headers, &pool, &auth_state).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    match read_document(&pool, session.user_id).await {
        Ok(Some(document)) => Json(ConfigResponse {
            data: Some(document.data),
            updated_at: Some(document.updated_at),
        })
        .into_response(),
        Ok(None) => Json(ConfigResponse {
            data: None,
            updated_at: None,
        })
        .into_response(),
        Err(err) => {
            error!("Failed to read config: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not read config".to_string(),
            )
                .into_response()
        }
    }
}

/// Full overwrite of the config document.
#[utoipa::path(
    post,
    path = "/config",
    request_body = ConfigWriteRequest,
    responses(
        (status = 200, description = "Config replaced", body = AckResponse),
        (status = 400, description = "Missing config data", body = String),
        (status = 401, description = "Not signed in", body = String)
    ),
    tag = "config"
)]
pub async fn replace_config(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ConfigWriteRequest>>,
) -> impl IntoResponse {
    let session = match require_session(&headers, &pool, &auth_state).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    let data = match payload.and_then(|Json(request)| request.data) {
        Some(data) if !data.is_null() => data,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                "Missing config data".to_string(),
            )
                .into_response();
        }
    };

    match replace_document(&pool, session.user_id, &data).await {
        Ok(()) => Json(AckResponse { ok: true }).into_response(),
        Err(err) => {
            error!("Failed to replace config: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not save config".to_string(),
            )
                .into_response()
        }
    }
}

/// Shallow-merge a partial document into the stored config.
///
/// Top-level keys overwrite; nested objects are replaced wholesale, not
/// deep-merged.
#[utoipa::path(
    patch,
    path = "/config",
    request_body = ConfigWriteRequest,
    responses(
        (status = 200, description = "Config patched", body = AckResponse),
        (status = 400, description = "Patch is not a JSON object", body = String),
        (status = 401, description = "Not signed in", body = String)
    ),
    tag = "config"
)]
pub async fn patch_config(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ConfigWriteRequest>>,
) -> impl IntoResponse {
    let session = match require_session(&headers, &pool, &auth_state).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    let partial = match payload.and_then(|Json(request)| request.data) {
        Some(partial) if partial.is_object() => partial,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                "Config patch must be a JSON object".to_string(),
            )
                .into_response();
        }
    };

    match merge_patch_document(&pool, session.user_id, &partial).await {
        Ok(()) => Json(AckResponse { ok: true }).into_response(),
        Err(err) => {
            error!("Failed to patch config: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not save config".to_string(),
            )
                .into_response()
        }
    }
}

/// Cursor poll: returns the document only when strictly newer than `since`.
#[utoipa::path(
    get,
    path = "/sync",
    params(SyncParams),
    responses(
        (status = 200, description = "Document state relative to the cursor", body = ConfigResponse),
        (status = 400, description = "Malformed cursor", body = String),
        (status = 401, description = "Not signed in", body = String)
    ),
    tag = "config"
)]
pub async fn sync(
    headers: HeaderMap,
    params: Query<SyncParams>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let session = match require_session(&headers, &pool, &auth_state).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    let since = match params.since.as_deref() {
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(_) => {
                return (StatusCode::BAD_REQUEST, "Invalid cursor".to_string()).into_response();
            }
        },
        None => None,
    };

    match read_document_since(&pool, session.user_id, since).await {
        Ok(Some(document)) => Json(ConfigResponse {
            data: Some(document.data),
            updated_at: Some(document.updated_at),
        })
        .into_response(),
        Ok(None) => Json(ConfigResponse {
            data: None,
            updated_at: None,
        })
        .into_response(),
        Err(err) => {
            error!("Failed to read sync state: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not read config".to_string(),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::email::LogEmailSender;
    use crate::api::handlers::auth::AuthConfig;
    use anyhow::Result;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    fn auth_state() -> Arc<AuthState> {
        let config = AuthConfig::new(
            "http://localhost:3000".to_string(),
            SecretString::from("0123456789abcdef0123456789abcdef".to_string()),
        );
        Arc::new(AuthState::new(config, Arc::new(LogEmailSender)).expect("auth state"))
    }

    fn lazy_pool() -> Result<PgPool> {
        Ok(PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?)
    }

    #[tokio::test]
    async fn get_config_requires_session() -> Result<()> {
        let response = get_config(HeaderMap::new(), Extension(lazy_pool()?), Extension(auth_state()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn replace_config_requires_session() -> Result<()> {
        let response = replace_config(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(auth_state()),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn sync_requires_session() -> Result<()> {
        let response = sync(
            HeaderMap::new(),
            Query(SyncParams { since: None }),
            Extension(lazy_pool()?),
            Extension(auth_state()),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
