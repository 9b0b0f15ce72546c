use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    db_types::{permissions_to_string, ApiKey, NewApiKey},
    traits::CredentialError,
};

/// Inserts the key unless the identity already holds `max_active` active keys. The limit check is part of the insert
/// statement itself. Returns `None` when the limit was hit.
pub async fn insert_api_key(
    key: NewApiKey,
    max_active: usize,
    conn: &mut SqliteConnection,
) -> Result<Option<ApiKey>, CredentialError> {
    let now = Utc::now();
    #[allow(clippy::cast_possible_wrap)]
    let max_active = max_active as i64;
    let key = sqlx::query_as(
        r#"
            INSERT INTO api_keys (key_hash, identity_id, label, permissions, expires_at, active, created_at, updated_at)
            SELECT $1, $2, $3, $4, $5, 1, $6, $6
            WHERE (SELECT COUNT(*) FROM api_keys WHERE identity_id = $2 AND active = 1) < $7
            RETURNING *;
        "#,
    )
    .bind(key.key_hash)
    .bind(key.identity_id)
    .bind(key.label)
    .bind(permissions_to_string(&key.permissions))
    .bind(key.expires_at)
    .bind(now)
    .bind(max_active)
    .fetch_optional(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => CredentialError::DuplicateSecret,
        _ => CredentialError::from(e),
    })?;
    Ok(key)
}

pub async fn fetch_api_key(id: i64, conn: &mut SqliteConnection) -> Result<Option<ApiKey>, CredentialError> {
    let key = sqlx::query_as("SELECT * FROM api_keys WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(key)
}

pub async fn fetch_api_key_by_hash(
    key_hash: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<ApiKey>, CredentialError> {
    let key =
        sqlx::query_as("SELECT * FROM api_keys WHERE key_hash = $1").bind(key_hash).fetch_optional(conn).await?;
    Ok(key)
}

pub async fn fetch_api_keys_for_identity(
    identity_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<ApiKey>, CredentialError> {
    let keys = sqlx::query_as("SELECT * FROM api_keys WHERE identity_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(identity_id)
        .fetch_all(conn)
        .await?;
    Ok(keys)
}

pub async fn deactivate_api_key(id: i64, conn: &mut SqliteConnection) -> Result<bool, CredentialError> {
    let result = sqlx::query("UPDATE api_keys SET active = 0, updated_at = $1 WHERE id = $2 AND active = 1")
        .bind(Utc::now())
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn touch_api_key(id: i64, used_at: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<(), CredentialError> {
    sqlx::query("UPDATE api_keys SET last_used_at = $1 WHERE id = $2").bind(used_at).bind(id).execute(conn).await?;
    Ok(())
}
