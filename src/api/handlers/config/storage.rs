//! Per-user config document storage.
//!
//! One JSONB document per user; `updated_at` doubles as the sync cursor.
//! Replace is a plain last-writer-wins upsert. Merge-patch re-reads and
//! re-writes under an `updated_at` version check so concurrent patches
//! cannot silently drop each other's keys.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

const MERGE_ATTEMPTS: usize = 3;

pub(crate) struct ConfigDocument {
    pub(crate) data: Value,
    pub(crate) updated_at: DateTime<Utc>,
}

/// Shallow merge: top-level keys in `partial` overwrite same-named keys in
/// `current`; nested objects are replaced wholesale. A non-object current
/// value is replaced entirely.
pub(crate) fn merge_shallow(current: Option<&Value>, partial: &Value) -> Value {
    match (current, partial) {
        (Some(Value::Object(current)), Value::Object(partial)) => {
            let mut merged = current.clone();
            for (key, value) in partial {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => partial.clone(),
    }
}

pub(crate) async fn read_document(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<ConfigDocument>> {
    read_document_since(pool, user_id, None).await
}

/// Fetch the document, optionally only when strictly newer than `since`.
///
/// `None` covers both "no document" and "no change since cursor"; the wire
/// protocol reports both as a null `updatedAt`.
pub(crate) async fn read_document_since(
    pool: &PgPool,
    user_id: Uuid,
    since: Option<DateTime<Utc>>,
) -> Result<Option<ConfigDocument>> {
    let row = if let Some(since) = since {
        let query = r"
            SELECT data::text AS data, updated_at
            FROM user_configs
            WHERE user_id = $1
              AND updated_at > $2
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .bind(since)
            .fetch_optional(pool)
            .instrument(span)
            .await
            .context("failed to read config document")?
    } else {
        let query = r"
            SELECT data::text AS data, updated_at
            FROM user_configs
            WHERE user_id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .fetch_optional(pool)
            .instrument(span)
            .await
            .context("failed to read config document")?
    };

    row.map(|row| {
        let raw: String = row.get("data");
        let data = serde_json::from_str(&raw).context("failed to parse config document")?;
        Ok(ConfigDocument {
            data,
            updated_at: row.get("updated_at"),
        })
    })
    .transpose()
}

/// Full overwrite of the document; no merge.
pub(crate) async fn replace_document(pool: &PgPool, user_id: Uuid, data: &Value) -> Result<()> {
    let payload = serde_json::to_string(data).context("failed to serialize config document")?;

    let query = r"
        INSERT INTO user_configs (user_id, data, updated_at)
        VALUES ($1, $2::jsonb, NOW())
        ON CONFLICT (user_id) DO UPDATE
        SET data = EXCLUDED.data,
            updated_at = NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(payload)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to replace config document")?;

    Ok(())
}

/// Shallow-merge `partial` into the stored document.
///
/// Each attempt writes conditionally on the `updated_at` it read, retrying
/// when a concurrent writer got there first.
pub(crate) async fn merge_patch_document(
    pool: &PgPool,
    user_id: Uuid,
    partial: &Value,
) -> Result<()> {
    for _ in 0..MERGE_ATTEMPTS {
        let current = read_document(pool, user_id).await?;
        let merged = merge_shallow(current.as_ref().map(|doc| &doc.data), partial);
        let payload =
            serde_json::to_string(&merged).context("failed to serialize config document")?;

        let written = match current {
            Some(doc) => {
                let query = r"
                    UPDATE user_configs
                    SET data = $2::jsonb,
                        updated_at = NOW()
                    WHERE user_id = $1
                      AND updated_at = $3
                ";
                let span = tracing::info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "UPDATE",
                    db.statement = query
                );
                sqlx::query(query)
                    .bind(user_id)
                    .bind(payload)
                    .bind(doc.updated_at)
                    .execute(pool)
                    .instrument(span)
                    .await
                    .context("failed to patch config document")?
                    .rows_affected()
            }
            None => {
                let query = r"
                    INSERT INTO user_configs (user_id, data, updated_at)
                    VALUES ($1, $2::jsonb, NOW())
                    ON CONFLICT (user_id) DO NOTHING
                ";
                let span = tracing::info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "INSERT",
                    db.statement = query
                );
                sqlx::query(query)
                    .bind(user_id)
                    .bind(payload)
                    .execute(pool)
                    .instrument(span)
                    .await
                    .context("failed to insert config document")?
                    .rows_affected()
            }
        };

        if written == 1 {
            return Ok(());
        }
        // Lost the race; re-read and merge again.
    }

    Err(anyhow!("config patch retries exhausted"))
}

#[cfg(test)]
mod tests {
    use super::merge_shallow;
    use serde_json::json;

    #[test]
    fn merge_accumulates_disjoint_keys() {
        let first = merge_shallow(None, &json!({"a": 1}));
        let second = merge_shallow(Some(&first), &json!({"b": 2}));
        assert_eq!(second, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn merge_overwrites_same_named_keys() {
        let current = json!({"a": 1, "b": 2});
        let merged = merge_shallow(Some(&current), &json!({"a": 3}));
        assert_eq!(merged, json!({"a": 3, "b": 2}));
    }

    #[test]
    fn merge_replaces_nested_objects_wholesale() {
        let current = json!({"columns": {"nav": true, "change": true}, "theme": "dark"});
        let merged = merge_shallow(Some(&current), &json!({"columns": {"nav": false}}));
        assert_eq!(
            merged,
            json!({"columns": {"nav": false}, "theme": "dark"})
        );
    }

    #[test]
    fn merge_treats_missing_current_as_empty() {
        let merged = merge_shallow(None, &json!({"watchlist": ["000001"]}));
        assert_eq!(merged, json!({"watchlist": ["000001"]}));
    }

    #[test]
    fn merge_replaces_non_object_current() {
        let current = json!([1, 2, 3]);
        let merged = merge_shallow(Some(&current), &json!({"a": 1}));
        assert_eq!(merged, json!({"a": 1}));
    }
}
