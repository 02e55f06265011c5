//! Small helpers for email validation, code generation, and secret hashing.

use anyhow::{Context, Result};
use base64::Engine;
use rand::{Rng, RngCore, rngs::OsRng};
use regex::Regex;
use sha2::{Digest, Sha256};

/// Normalize an email for lookup/uniqueness checks.
pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input: exactly one `@`
/// with non-empty local and domain parts, no whitespace.
pub(super) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Generate a six-digit sign-in code, leading zeros allowed.
pub(crate) fn generate_code() -> String {
    format_code(rand::thread_rng().gen_range(0..1_000_000))
}

pub(super) fn format_code(value: u32) -> String {
    format!("{value:06}")
}

/// Create a new session secret.
/// The raw value is only embedded in the signed token; the database stores a hash.
pub(crate) fn generate_session_secret() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session secret")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a session secret so raw values never touch the database.
/// The hash is used for lookups when a token is presented.
pub(crate) fn hash_session_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
