//! One-time sign-in code storage.
//!
//! Issuance never invalidates earlier codes for the same address; redemption
//! picks the newest live row and marks it used in a single conditional
//! UPDATE, so concurrent redemption attempts serialize in the store and at
//! most one succeeds.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::Instrument;

use super::utils::generate_code;

/// Issue a new six-digit code for `email` and return the raw code.
pub(crate) async fn issue_code(pool: &PgPool, email: &str, ttl_seconds: i64) -> Result<String> {
    let code = generate_code();

    let query = r"
        INSERT INTO otc_codes (email, code, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .bind(&code)
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert sign-in code")?;

    Ok(code)
}

/// Consume the newest unused, unexpired code matching `(email, code)`.
///
/// Returns `false` when no such row exists. The outer WHERE repeats the
/// liveness conditions so a concurrent redeemer that re-evaluates against the
/// updated row finds `used = TRUE` and loses the race.
pub(crate) async fn redeem_code(pool: &PgPool, email: &str, code: &str) -> Result<bool> {
    let query = r"
        UPDATE otc_codes
        SET used = TRUE
        WHERE used = FALSE
          AND expires_at > NOW()
          AND id = (
              SELECT id
              FROM otc_codes
              WHERE email = $1
                AND code = $2
                AND used = FALSE
                AND expires_at > NOW()
              ORDER BY created_at DESC
              LIMIT 1
          )
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(code)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to redeem sign-in code")?;

    Ok(row.is_some())
}

/// Delete expired and consumed codes. Safe to run concurrently with
/// issue/redeem.
pub(crate) async fn sweep_codes(pool: &PgPool) -> Result<u64> {
    let query = "DELETE FROM otc_codes WHERE expires_at < NOW() OR used = TRUE";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to sweep sign-in codes")?;

    Ok(result.rows_affected())
}
