//! Compact signed session tokens.
//!
//! A token is the three-part string `header.payload.signature`, each part
//! base64url without padding. The payload carries the user id, the raw
//! session secret, and `iat`/`exp` claims. The signature is HMAC-SHA256 over
//! `header "." payload`, so a token verifies offline; the embedded secret
//! must still hash to a live `user_sessions` row before it grants anything.

use std::sync::Arc;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token signing key is too short (min {MIN_SECRET_LEN} bytes)")]
    SecretTooShort,

    #[error("invalid token format")]
    InvalidFormat,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token is expired")]
    Expired,

    #[error("failed to decode token payload")]
    PayloadDecode,

    #[error("failed to parse token payload")]
    PayloadParse,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub user_id: Uuid,
    pub secret: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn is_expired(&self, reference: i64) -> bool {
        reference >= self.exp
    }
}

#[derive(Clone)]
pub struct TokenCodec {
    key: Arc<[u8]>,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(key: Vec<u8>, ttl: Duration) -> Result<Self, TokenError> {
        if key.len() < MIN_SECRET_LEN {
            return Err(TokenError::SecretTooShort);
        }

        Ok(Self {
            key: Arc::<[u8]>::from(key),
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for a session secret. Deterministic for a fixed
    /// `issued_at`.
    pub fn issue(
        &self,
        user_id: Uuid,
        secret: String,
        issued_at: i64,
    ) -> Result<String, TokenError> {
        let exp = issued_at.saturating_add(self.ttl.as_secs() as i64);
        let claims = SessionClaims {
            user_id,
            secret,
            iat: issued_at,
            exp,
        };

        let header = json!({"alg": "HS256", "typ": "JWT"});
        let header_bytes =
            serde_json::to_vec(&header).map_err(|_| TokenError::PayloadParse)?;
        let payload_bytes =
            serde_json::to_vec(&claims).map_err(|_| TokenError::PayloadParse)?;

        let header_b64 = URL_SAFE_NO_PAD.encode(header_bytes);
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload_bytes);
        let signing_input = format!("{header_b64}.{payload_b64}");
        let signature_b64 = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes())?);

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Verify a token against `reference` seconds since the epoch.
    ///
    /// Signature comparison is constant-time via `Mac::verify_slice`.
    pub fn verify(&self, token: &str, reference: i64) -> Result<SessionClaims, TokenError> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(TokenError::InvalidFormat)?;
        let payload_b64 = parts.next().ok_or(TokenError::InvalidFormat)?;
        let signature_b64 = parts.next().ok_or(TokenError::InvalidFormat)?;
        if parts.next().is_some() {
            return Err(TokenError::InvalidFormat);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::InvalidFormat)?;

        let signing_input = format!("{header_b64}.{payload_b64}");
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|_| TokenError::InvalidSignature)?;
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::PayloadDecode)?;

        let claims: SessionClaims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::PayloadParse)?;

        if claims.secret.is_empty() || claims.is_expired(reference) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn sign(&self, bytes: &[u8]) -> Result<Vec<u8>, TokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|_| TokenError::InvalidSignature)?;
        mac.update(bytes);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("key", &"***")
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_codec() -> TokenCodec {
        TokenCodec::new(
            b"01234567890123456789012345678901".to_vec(),
            Duration::from_secs(30),
        )
        .expect("valid codec")
    }

    #[test]
    fn rejects_short_key() {
        assert!(matches!(
            TokenCodec::new(b"too-short".to_vec(), Duration::from_secs(30)),
            Err(TokenError::SecretTooShort)
        ));
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let codec = test_codec();
        let user_id = Uuid::new_v4();
        let token = codec
            .issue(user_id, "session-secret".to_string(), 1_000)
            .expect("issue token");

        let claims = codec.verify(&token, 1_010).expect("verify token");
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.secret, "session-secret");
        assert_eq!(claims.iat, 1_000);
        assert_eq!(claims.exp, 1_030);
    }

    #[test]
    fn token_has_three_parts() {
        let codec = test_codec();
        let token = codec
            .issue(Uuid::new_v4(), "s".to_string(), 0)
            .expect("issue token");
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn rejects_tampered_payload() {
        let codec = test_codec();
        let token = codec
            .issue(Uuid::new_v4(), "s".to_string(), 10)
            .expect("issue token");
        let mut parts = token.splitn(3, '.');
        let header = parts.next().expect("header");
        let payload = parts.next().expect("payload");
        let signature = parts.next().expect("signature");

        let mut chars: Vec<char> = payload.chars().collect();
        chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
        let tampered_payload: String = chars.into_iter().collect();
        let tampered = format!("{header}.{tampered_payload}.{signature}");

        assert!(matches!(
            codec.verify(&tampered, 20),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_tampered_signature() {
        let codec = test_codec();
        let token = codec
            .issue(Uuid::new_v4(), "s".to_string(), 10)
            .expect("issue token");
        let mut chars: Vec<char> = token.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();

        assert!(codec.verify(&tampered, 20).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let codec = test_codec();
        let token = codec
            .issue(Uuid::new_v4(), "s".to_string(), 1_000)
            .expect("issue token");

        assert!(matches!(
            codec.verify(&token, 35_000),
            Err(TokenError::Expired)
        ));
        // Boundary: exp itself is no longer valid.
        assert!(matches!(
            codec.verify(&token, 1_030),
            Err(TokenError::Expired)
        ));
        assert!(codec.verify(&token, 1_029).is_ok());
    }

    #[test]
    fn rejects_wrong_part_count() {
        let codec = test_codec();
        assert!(matches!(
            codec.verify("only-one-part", 0),
            Err(TokenError::InvalidFormat)
        ));
        assert!(matches!(
            codec.verify("a.b", 0),
            Err(TokenError::InvalidFormat)
        ));
        assert!(matches!(
            codec.verify("a.b.c.d", 0),
            Err(TokenError::InvalidFormat)
        ));
    }

    #[test]
    fn rejects_token_from_other_key() {
        let codec = test_codec();
        let other = TokenCodec::new(
            b"abcdefghijklmnopqrstuvwxyz012345".to_vec(),
            Duration::from_secs(30),
        )
        .expect("valid codec");
        let token = other
            .issue(Uuid::new_v4(), "s".to_string(), 0)
            .expect("issue token");

        assert!(matches!(
            codec.verify(&token, 5),
            Err(TokenError::InvalidSignature)
        ));
    }
}
