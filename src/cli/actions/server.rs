use crate::api::{
    self,
    email::{DeliveryPolicy, LogEmailSender},
    handlers::auth::AuthConfig,
};
use anyhow::Result;
use secrecy::SecretString;
use std::sync::Arc;

pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub frontend_base_url: String,
    pub token_secret: SecretString,
    pub code_ttl_seconds: i64,
    pub session_ttl_seconds: i64,
    pub sweep_interval_seconds: u64,
    pub strict_code_delivery: bool,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("dsn", &self.dsn)
            .field("frontend_base_url", &self.frontend_base_url)
            .field("token_secret", &"***")
            .field("code_ttl_seconds", &self.code_ttl_seconds)
            .field("session_ttl_seconds", &self.session_ttl_seconds)
            .field("sweep_interval_seconds", &self.sweep_interval_seconds)
            .field("strict_code_delivery", &self.strict_code_delivery)
            .finish()
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the token secret is too short or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let delivery_policy = if args.strict_code_delivery {
        DeliveryPolicy::Strict
    } else {
        DeliveryPolicy::Lenient
    };

    let auth_config = AuthConfig::new(args.frontend_base_url, args.token_secret)
        .with_code_ttl_seconds(args.code_ttl_seconds)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_sweep_interval_seconds(args.sweep_interval_seconds)
        .with_delivery_policy(delivery_policy);

    api::new(args.port, args.dsn, auth_config, Arc::new(LogEmailSender)).await
}

#[cfg(test)]
mod tests {
    use super::Args;
    use secrecy::SecretString;

    #[test]
    fn args_debug_redacts_token_secret() {
        let args = Args {
            port: 8080,
            dsn: "postgres://localhost/fundsync".to_string(),
            frontend_base_url: "http://localhost:3000".to_string(),
            token_secret: SecretString::from("super-secret-signing-key-material".to_string()),
            code_ttl_seconds: 600,
            session_ttl_seconds: 2_592_000,
            sweep_interval_seconds: 3600,
            strict_code_delivery: false,
        };
        let rendered = format!("{args:?}");
        assert!(rendered.contains("***"));
        assert!(!rendered.contains("super-secret"));
    }
}
