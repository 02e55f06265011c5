//! Sign-in endpoints: one-time code request and redemption.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, warn};

use crate::api::email::{DeliveryPolicy, EmailMessage};

use super::{
    otc,
    session::session_cookie,
    state::AuthState,
    storage::{create_session, upsert_user},
    types::{RedeemCodeRequest, RedeemCodeResponse, RequestCodeRequest, RequestCodeResponse},
    utils::{normalize_email, valid_email},
};

/// Issue a one-time sign-in code and hand it to the delivery collaborator.
///
/// Outstanding codes for the same address stay live; single-use is enforced
/// at redemption, not issuance.
#[utoipa::path(
    post,
    path = "/auth/code",
    request_body = RequestCodeRequest,
    responses(
        (status = 200, description = "Code issued", body = RequestCodeResponse),
        (status = 400, description = "Invalid email", body = String),
        (status = 502, description = "Delivery failed (strict policy only)", body = String)
    ),
    tag = "auth"
)]
pub async fn request_code(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RequestCodeRequest>>,
) -> impl IntoResponse {
    let request: RequestCodeRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (
            StatusCode::BAD_REQUEST,
            "Enter a valid email address".to_string(),
        )
            .into_response();
    }

    let code = match otc::issue_code(&pool, &email, auth_state.config().code_ttl_seconds()).await {
        Ok(code) => code,
        Err(err) => {
            error!("Failed to issue sign-in code: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not issue code".to_string(),
            )
                .into_response();
        }
    };

    let message = EmailMessage {
        to_email: email,
        code,
    };
    if let Err(err) = auth_state.sender().send(&message) {
        // The code is already durably stored; the policy decides what the
        // caller is told.
        match auth_state.config().delivery_policy() {
            DeliveryPolicy::Strict => {
                error!("Failed to deliver sign-in code: {err}");
                return (
                    StatusCode::BAD_GATEWAY,
                    "Could not deliver code".to_string(),
                )
                    .into_response();
            }
            DeliveryPolicy::Lenient => {
                warn!("Sign-in code delivery failed, reporting issued anyway: {err}");
            }
        }
    }

    (StatusCode::OK, Json(RequestCodeResponse { issued: true })).into_response()
}

/// Redeem a one-time code for a session token.
///
/// Failure is reported generically; callers cannot tell a wrong code from an
/// unknown email.
#[utoipa::path(
    post,
    path = "/auth/redeem",
    request_body = RedeemCodeRequest,
    responses(
        (status = 200, description = "Code redeemed, session established", body = RedeemCodeResponse),
        (status = 400, description = "Invalid or expired code", body = String)
    ),
    tag = "auth"
)]
pub async fn redeem_code(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RedeemCodeRequest>>,
) -> impl IntoResponse {
    let request: RedeemCodeRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (
            StatusCode::BAD_REQUEST,
            "Enter a valid email address".to_string(),
        )
            .into_response();
    }

    let code = request.code.trim();
    if code.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing code".to_string()).into_response();
    }

    match otc::redeem_code(&pool, &email, code).await {
        Ok(true) => {}
        Ok(false) => {
            return (
                StatusCode::BAD_REQUEST,
                "Invalid or expired code".to_string(),
            )
                .into_response();
        }
        Err(err) => {
            error!("Failed to redeem sign-in code: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Sign-in failed".to_string(),
            )
                .into_response();
        }
    }

    let user_id = match upsert_user(&pool, &email).await {
        Ok(user_id) => user_id,
        Err(err) => {
            error!("Failed to upsert user: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Sign-in failed".to_string(),
            )
                .into_response();
        }
    };

    let secret =
        match create_session(&pool, user_id, auth_state.config().session_ttl_seconds()).await {
            Ok(secret) => secret,
            Err(err) => {
                error!("Failed to create session: {err}");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Sign-in failed".to_string(),
                )
                    .into_response();
            }
        };

    let token = match auth_state
        .codec()
        .issue(user_id, secret, Utc::now().timestamp())
    {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to issue session token: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Sign-in failed".to_string(),
            )
                .into_response();
        }
    };

    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = session_cookie(&auth_state, &token) {
        response_headers.insert(SET_COOKIE, cookie);
    }

    let body = RedeemCodeResponse {
        user_id: user_id.to_string(),
        email,
        token,
    };
    (StatusCode::OK, response_headers, Json(body)).into_response()
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
    async fn request_code_missing_payload() -> Result<()> {
        let response = request_code(Extension(lazy_pool()?), Extension(auth_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn request_code_invalid_email() -> Result<()> {
        let response = request_code(
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(Json(RequestCodeRequest {
                email: "not-an-email".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn redeem_code_missing_payload() -> Result<()> {
        let response = redeem_code(Extension(lazy_pool()?), Extension(auth_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn redeem_code_rejects_blank_code() -> Result<()> {
        let response = redeem_code(
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(Json(RedeemCodeRequest {
                email: "alice@example.com".to_string(),
                code: "   ".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
