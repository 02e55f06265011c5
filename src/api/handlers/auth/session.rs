//! Session endpoints for cookie and bearer auth.

use axum::{
    Json,
    extract::Extension,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{AUTHORIZATION, InvalidHeaderValue, SET_COOKIE},
    },
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::{
    state::{AuthConfig, AuthState},
    storage::{SessionRecord, lookup_session, revoke_session, revoke_user_sessions},
    types::{AckResponse, SessionEnvelope, SessionUser, SignOutRequest, SignOutScope},
    utils::hash_session_secret,
};

const SESSION_COOKIE_NAME: &str = "fundsync_session";

/// Resolve the presented token into a live session, if any.
///
/// Token verification alone is not enough: the secret inside the token must
/// still hash to a stored session row, which is what makes revocation work.
/// Returns `Ok(None)` for missing, forged, expired, and revoked tokens alike.
pub(crate) async fn authenticate_session(
    headers: &HeaderMap,
    pool: &PgPool,
    auth_state: &AuthState,
) -> Result<Option<SessionRecord>, StatusCode> {
    let Some(token) = extract_session_token(headers) else {
        return Ok(None);
    };
    let Ok(claims) = auth_state.codec().verify(&token, Utc::now().timestamp()) else {
        return Ok(None);
    };
    let secret_hash = hash_session_secret(&claims.secret);
    match lookup_session(pool, claims.user_id, &secret_hash).await {
        Ok(record) => Ok(record),
        Err(err) => {
            error!("Failed to lookup session: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[utoipa::path(
    get,
    path = "/auth/session",
    responses(
        (status = 200, description = "Current session state", body = SessionEnvelope)
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let had_token = extract_session_token(&headers).is_some();
    match authenticate_session(&headers, &pool, &auth_state).await {
        Ok(Some(SessionRecord {
            user_id,
            email,
            email_verified,
        })) => {
            let envelope = SessionEnvelope {
                user: Some(SessionUser {
                    id: user_id.to_string(),
                    email,
                    email_verified,
                }),
            };
            (StatusCode::OK, Json(envelope)).into_response()
        }
        Ok(None) => {
            // Clear a presented-but-dead credential so the client stops
            // sending it.
            let mut response_headers = HeaderMap::new();
            if had_token {
                if let Ok(cookie) = clear_session_cookie(auth_state.config()) {
                    response_headers.insert(SET_COOKIE, cookie);
                }
            }
            (
                StatusCode::OK,
                response_headers,
                Json(SessionEnvelope { user: None }),
            )
                .into_response()
        }
        Err(status) => status.into_response(),
    }
}

/// Revoke the presented session (`local`) or every session for its user
/// (`global`). Best-effort: the response is 200 and the cookie is cleared
/// even when the token was already invalid.
#[utoipa::path(
    post,
    path = "/auth/signout",
    request_body = SignOutRequest,
    responses(
        (status = 200, description = "Signed out", body = AckResponse)
    ),
    tag = "auth"
)]
pub async fn signout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SignOutRequest>>,
) -> impl IntoResponse {
    let scope = payload
        .and_then(|Json(request)| request.scope)
        .unwrap_or(SignOutScope::Local);

    if let Some(token) = extract_session_token(&headers) {
        if let Ok(claims) = auth_state.codec().verify(&token, Utc::now().timestamp()) {
            let result = match scope {
                SignOutScope::Local => {
                    let secret_hash = hash_session_secret(&claims.secret);
                    revoke_session(&pool, &secret_hash).await
                }
                SignOutScope::Global => revoke_user_sessions(&pool, claims.user_id).await,
            };
            if let Err(err) = result {
                error!("Failed to revoke session(s): {err}");
            }
        }
    }

    // Always clear the cookie, even if nothing was revoked.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(auth_state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (
        StatusCode::OK,
        response_headers,
        Json(AckResponse { ok: true }),
    )
        .into_response()
}

/// Build a secure `HttpOnly` cookie for the session token.
pub(super) fn session_cookie(
    auth_state: &AuthState,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = auth_state.config().session_ttl_seconds();
    // Only mark cookies secure when the dashboard is served over HTTPS.
    let secure = auth_state.config().session_cookie_secure();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(auth_config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let secure = auth_config.session_cookie_secure();
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
