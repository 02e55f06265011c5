//! Sign-in code delivery abstractions.
//!
//! Code issuance hands an [`EmailMessage`] to an [`EmailSender`]; the sender
//! decides how to deliver (SMTP, provider API, etc.) and returns `Ok`/`Err`.
//! A code is durably stored before delivery is attempted, so a delivery
//! failure leaves a redeemable code behind. What the caller is told about
//! that failure is a deployment decision captured by [`DeliveryPolicy`]:
//!
//! - `Strict` surfaces the failure (no false "check your inbox" positives).
//! - `Lenient` reports the code as issued and logs a warning, so a flaky
//!   mail provider does not lock users out of requesting codes.
//!
//! The default sender for local dev is `LogEmailSender`, which logs and
//! returns `Ok(())`.

use anyhow::Result;
use tracing::info;

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub code: String,
}

/// Delivery abstraction for outbound sign-in codes.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error to mark delivery as failed.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the code instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            code = %message.code,
            "sign-in code delivery stub"
        );
        Ok(())
    }
}

/// How a code-request responds when the delivery collaborator fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// Delivery failure fails the request; the stored code stays redeemable.
    Strict,
    /// Delivery failure is logged and the request still reports issued.
    Lenient,
}

#[cfg(test)]
mod tests {
    use super::{DeliveryPolicy, EmailMessage, EmailSender, LogEmailSender};

    #[test]
    fn log_sender_always_succeeds() {
        let sender = LogEmailSender;
        let message = EmailMessage {
            to_email: "alice@example.com".to_string(),
            code: "042137".to_string(),
        };
        assert!(sender.send(&message).is_ok());
    }

    #[test]
    fn delivery_policy_is_comparable() {
        assert_ne!(DeliveryPolicy::Strict, DeliveryPolicy::Lenient);
        assert_eq!(DeliveryPolicy::Strict, DeliveryPolicy::Strict);
    }
}
