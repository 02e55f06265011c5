//! Database helpers for users and sessions.

use anyhow::{Context, Result, anyhow};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::utils::{generate_session_secret, hash_session_secret, is_unique_violation};

/// Minimal data returned for a valid session secret.
pub(crate) struct SessionRecord {
    pub(crate) user_id: Uuid,
    pub(crate) email: String,
    pub(crate) email_verified: bool,
}

/// Create or refresh the user row for a verified email, keyed by address.
pub(super) async fn upsert_user(pool: &PgPool, email: &str) -> Result<Uuid> {
    let query = r"
        INSERT INTO users (email, email_verified)
        VALUES ($1, TRUE)
        ON CONFLICT (email) DO UPDATE
        SET email_verified = TRUE,
            updated_at = NOW()
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to upsert user")?;

    Ok(row.get("id"))
}

/// Create a session row and return the raw secret.
///
/// Only a hash of the secret is stored; the raw value goes into the signed
/// token held by the client.
pub(super) async fn create_session(
    pool: &PgPool,
    user_id: Uuid,
    ttl_seconds: i64,
) -> Result<String> {
    let query = r"
        INSERT INTO user_sessions (user_id, session_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let secret = generate_session_secret()?;
        let secret_hash = hash_session_secret(&secret);
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(secret_hash)
            .bind(ttl_seconds)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(secret),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert session"),
        }
    }

    Err(anyhow!("failed to generate unique session secret"))
}

/// Look up a live session by `(user_id, secret_hash)`.
///
/// Expired rows are inert here; the sweeper reclaims them.
pub(crate) async fn lookup_session(
    pool: &PgPool,
    user_id: Uuid,
    secret_hash: &[u8],
) -> Result<Option<SessionRecord>> {
    let query = r"
        SELECT users.id, users.email, users.email_verified
        FROM user_sessions
        JOIN users ON users.id = user_sessions.user_id
        WHERE user_sessions.user_id = $1
          AND user_sessions.session_hash = $2
          AND user_sessions.expires_at > NOW()
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(secret_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup session")?;

    Ok(row.map(|row| SessionRecord {
        user_id: row.get("id"),
        email: row.get("email"),
        email_verified: row.get("email_verified"),
    }))
}

/// Delete the single session matching `secret_hash` (local sign-out).
/// Idempotent; it's fine if no rows are deleted.
pub(super) async fn revoke_session(pool: &PgPool, secret_hash: &[u8]) -> Result<()> {
    let query = "DELETE FROM user_sessions WHERE session_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(secret_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to revoke session")?;
    Ok(())
}

/// Delete every session for `user_id` (global sign-out).
pub(super) async fn revoke_user_sessions(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let query = "DELETE FROM user_sessions WHERE user_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to revoke user sessions")?;
    Ok(())
}

/// Delete expired session rows.
pub(crate) async fn sweep_sessions(pool: &PgPool) -> Result<u64> {
    let query = "DELETE FROM user_sessions WHERE expires_at < NOW()";
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
        .context("failed to sweep sessions")?;

    Ok(result.rows_affected())
}
