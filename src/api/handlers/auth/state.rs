//! Auth state and configuration.

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;

use crate::api::email::{DeliveryPolicy, EmailSender};

use super::token::TokenCodec;

const DEFAULT_CODE_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_SESSION_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60 * 60;

#[derive(Clone)]
pub struct AuthConfig {
    frontend_base_url: String,
    token_secret: SecretString,
    code_ttl_seconds: i64,
    session_ttl_seconds: i64,
    sweep_interval_seconds: u64,
    delivery_policy: DeliveryPolicy,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String, token_secret: SecretString) -> Self {
        Self {
            frontend_base_url,
            token_secret,
            code_ttl_seconds: DEFAULT_CODE_TTL_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECONDS,
            delivery_policy: DeliveryPolicy::Lenient,
        }
    }

    #[must_use]
    pub fn with_code_ttl_seconds(mut self, seconds: i64) -> Self {
        self.code_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_sweep_interval_seconds(mut self, seconds: u64) -> Self {
        self.sweep_interval_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_delivery_policy(mut self, policy: DeliveryPolicy) -> Self {
        self.delivery_policy = policy;
        self
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(super) fn code_ttl_seconds(&self) -> i64 {
        self.code_ttl_seconds
    }

    pub(super) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn sweep_interval_seconds(&self) -> u64 {
        self.sweep_interval_seconds
    }

    pub(super) fn delivery_policy(&self) -> DeliveryPolicy {
        self.delivery_policy
    }

    pub(super) fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }

    /// Build the token codec from the configured signing key and session TTL.
    ///
    /// # Errors
    /// Returns an error if the signing key is shorter than the codec minimum.
    pub fn token_codec(&self) -> Result<TokenCodec> {
        let ttl = u64::try_from(self.session_ttl_seconds).unwrap_or(0);
        TokenCodec::new(
            self.token_secret.expose_secret().as_bytes().to_vec(),
            Duration::from_secs(ttl),
        )
        .context("invalid token signing key")
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("frontend_base_url", &self.frontend_base_url)
            .field("token_secret", &"***")
            .field("code_ttl_seconds", &self.code_ttl_seconds)
            .field("session_ttl_seconds", &self.session_ttl_seconds)
            .field("sweep_interval_seconds", &self.sweep_interval_seconds)
            .field("delivery_policy", &self.delivery_policy)
            .finish()
    }
}

pub struct AuthState {
    config: AuthConfig,
    codec: TokenCodec,
    sender: Arc<dyn EmailSender>,
}

impl AuthState {
    /// Build the shared auth state from configuration.
    ///
    /// # Errors
    /// Returns an error if the token signing key is invalid.
    pub fn new(config: AuthConfig, sender: Arc<dyn EmailSender>) -> Result<Self> {
        let codec = config.token_codec()?;
        Ok(Self {
            config,
            codec,
            sender,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub(crate) fn sender(&self) -> &dyn EmailSender {
        self.sender.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthConfig, AuthState};
    use crate::api::email::{DeliveryPolicy, LogEmailSender};
    use secrecy::SecretString;
    use std::sync::Arc;

    fn test_secret() -> SecretString {
        SecretString::from("0123456789abcdef0123456789abcdef".to_string())
    }

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new("https://funds.example.com".to_string(), test_secret());

        assert_eq!(config.frontend_base_url(), "https://funds.example.com");
        assert_eq!(config.code_ttl_seconds(), super::DEFAULT_CODE_TTL_SECONDS);
        assert_eq!(
            config.session_ttl_seconds(),
            super::DEFAULT_SESSION_TTL_SECONDS
        );
        assert_eq!(
            config.sweep_interval_seconds(),
            super::DEFAULT_SWEEP_INTERVAL_SECONDS
        );
        assert_eq!(config.delivery_policy(), DeliveryPolicy::Lenient);
        assert!(config.session_cookie_secure());

        let config = config
            .with_code_ttl_seconds(120)
            .with_session_ttl_seconds(3600)
            .with_sweep_interval_seconds(30)
            .with_delivery_policy(DeliveryPolicy::Strict);

        assert_eq!(config.code_ttl_seconds(), 120);
        assert_eq!(config.session_ttl_seconds(), 3600);
        assert_eq!(config.sweep_interval_seconds(), 30);
        assert_eq!(config.delivery_policy(), DeliveryPolicy::Strict);
    }

    #[test]
    fn plain_http_frontend_is_not_cookie_secure() {
        let config = AuthConfig::new("http://localhost:3000".to_string(), test_secret());
        assert!(!config.session_cookie_secure());
    }

    #[test]
    fn auth_state_rejects_short_signing_key() {
        let config = AuthConfig::new(
            "http://localhost:3000".to_string(),
            SecretString::from("short".to_string()),
        );
        assert!(AuthState::new(config, Arc::new(LogEmailSender)).is_err());
    }

    #[test]
    fn auth_state_constructs_with_log_sender() {
        let config = AuthConfig::new("http://localhost:3000".to_string(), test_secret());
        let state = AuthState::new(config, Arc::new(LogEmailSender)).expect("state");
        assert_eq!(
            state.codec().ttl().as_secs(),
            u64::try_from(super::DEFAULT_SESSION_TTL_SECONDS).expect("ttl")
        );
    }

    #[test]
    fn auth_config_debug_redacts_secret() {
        let config = AuthConfig::new("http://localhost:3000".to_string(), test_secret());
        let rendered = format!("{config:?}");
        assert!(rendered.contains("***"));
        assert!(!rendered.contains("0123456789abcdef"));
    }
}
