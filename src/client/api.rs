//! Typed client for the Fundsync API. Centralizes the base URL, bearer
//! credential, and error mapping so callers never hand-build requests.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::RwLock;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SignIn {
    pub user_id: String,
    pub email: String,
    pub token: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub email_verified: bool,
}

#[derive(Deserialize, Debug)]
struct SessionEnvelope {
    user: Option<SessionUser>,
}

/// A config document as the server reports it: both fields are `None` when
/// no document exists or nothing changed past the requested cursor.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    pub data: Option<Value>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SignOutScope {
    /// Revoke only the session behind this client's token.
    Local,
    /// Revoke every session for the signed-in user.
    Global,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    /// Build a client for the given server base URL.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            http,
            base_url,
            token: RwLock::new(None),
        })
    }

    /// Resume an existing session with a previously issued token.
    #[must_use]
    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.store_token(Some(token.into()));
        self
    }

    /// Ask the server to issue and deliver a one-time sign-in code.
    pub async fn request_code(&self, email: &str) -> Result<()> {
        let response = self
            .http
            .post(self.url("/auth/code"))
            .json(&json!({"email": email}))
            .send()
            .await
            .context("code request failed")?;
        error_for_status(response, "code request").await?;
        Ok(())
    }

    /// Redeem a code; on success the returned token also becomes this
    /// client's bearer credential.
    pub async fn redeem_code(&self, email: &str, code: &str) -> Result<SignIn> {
        let response = self
            .http
            .post(self.url("/auth/redeem"))
            .json(&json!({"email": email, "code": code}))
            .send()
            .await
            .context("code redemption failed")?;
        let response = error_for_status(response, "code redemption").await?;
        let sign_in: SignIn = response
            .json()
            .await
            .context("failed to parse sign-in response")?;
        self.store_token(Some(sign_in.token.clone()));
        Ok(sign_in)
    }

    /// Fetch the current session; `None` when not signed in.
    pub async fn session(&self) -> Result<Option<SessionUser>> {
        let response = self
            .request(reqwest::Method::GET, "/auth/session")
            .send()
            .await
            .context("session fetch failed")?;
        let response = error_for_status(response, "session fetch").await?;
        let envelope: SessionEnvelope = response
            .json()
            .await
            .context("failed to parse session response")?;
        Ok(envelope.user)
    }

    /// Sign out and drop the stored credential. Best-effort server-side;
    /// the local token is cleared regardless.
    pub async fn sign_out(&self, scope: SignOutScope) -> Result<()> {
        let result = self
            .request(reqwest::Method::POST, "/auth/signout")
            .json(&json!({"scope": scope}))
            .send()
            .await;
        self.store_token(None);
        let response = result.context("sign-out failed")?;
        error_for_status(response, "sign-out").await?;
        Ok(())
    }

    pub async fn fetch_config(&self) -> Result<ConfigSnapshot> {
        let response = self
            .request(reqwest::Method::GET, "/config")
            .send()
            .await
            .context("config fetch failed")?;
        let response = error_for_status(response, "config fetch").await?;
        response
            .json()
            .await
            .context("failed to parse config response")
    }

    /// Full overwrite of the config document.
    pub async fn replace_config(&self, data: &Value) -> Result<()> {
        let response = self
            .request(reqwest::Method::POST, "/config")
            .json(&json!({"data": data}))
            .send()
            .await
            .context("config replace failed")?;
        error_for_status(response, "config replace").await?;
        Ok(())
    }

    /// Shallow-merge `partial` into the stored config document.
    pub async fn merge_config(&self, partial: &Value) -> Result<()> {
        let response = self
            .request(reqwest::Method::PATCH, "/config")
            .json(&json!({"data": partial}))
            .send()
            .await
            .context("config patch failed")?;
        error_for_status(response, "config patch").await?;
        Ok(())
    }

    /// Poll for changes past `since`. A `None` cursor fetches the full
    /// document unconditionally.
    pub async fn sync_since(&self, since: Option<DateTime<Utc>>) -> Result<ConfigSnapshot> {
        let mut request = self.request(reqwest::Method::GET, "/sync");
        if let Some(since) = since {
            request = request.query(&[("since", since.to_rfc3339())]);
        }
        let response = request.send().await.context("sync poll failed")?;
        let response = error_for_status(response, "sync poll").await?;
        response
            .json()
            .await
            .context("failed to parse sync response")
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match self.bearer() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn bearer(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    fn store_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = token;
        }
    }
}

async fn error_for_status(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(anyhow!("{what} failed (status={status}): {body}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let client = ApiClient::new("http://localhost:8080/").expect("client");
        assert_eq!(client.url("/auth/code"), "http://localhost:8080/auth/code");
        assert_eq!(client.url("/sync"), "http://localhost:8080/sync");
    }

    #[test]
    fn with_token_sets_bearer() {
        let client = ApiClient::new("http://localhost:8080")
            .expect("client")
            .with_token("a.b.c");
        assert_eq!(client.bearer(), Some("a.b.c".to_string()));

        client.store_token(None);
        assert_eq!(client.bearer(), None);
    }

    #[test]
    fn sign_out_scope_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SignOutScope::Local).expect("json"),
            r#""local""#
        );
        assert_eq!(
            serde_json::to_string(&SignOutScope::Global).expect("json"),
            r#""global""#
        );
    }

    #[test]
    fn config_snapshot_parses_nulls() {
        let snapshot: ConfigSnapshot =
            serde_json::from_str(r#"{"data":null,"updatedAt":null}"#).expect("parse");
        assert!(snapshot.data.is_none());
        assert!(snapshot.updated_at.is_none());
    }

    #[test]
    fn config_snapshot_parses_document() {
        let snapshot: ConfigSnapshot = serde_json::from_str(
            r#"{"data":{"theme":"dark"},"updatedAt":"2026-03-01T09:30:00Z"}"#,
        )
        .expect("parse");
        assert_eq!(snapshot.data, Some(serde_json::json!({"theme": "dark"})));
        assert!(snapshot.updated_at.is_some());
    }
}
