use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Identity, NewIdentity},
    traits::IdentityError,
};

pub async fn insert_identity(
    identity: NewIdentity,
    wallet_number: &str,
    conn: &mut SqliteConnection,
) -> Result<Identity, IdentityError> {
    let now = Utc::now();
    let email = identity.email.clone();
    let identity = sqlx::query_as(
        r#"
            INSERT INTO identities (subject, email, name, wallet_number, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *;
        "#,
    )
    .bind(identity.subject)
    .bind(identity.email)
    .bind(identity.name)
    .bind(wallet_number)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            if err.message().contains("wallet_number") {
                IdentityError::WalletNumberTaken(wallet_number.to_string())
            } else {
                IdentityError::IdentityAlreadyExists(email)
            }
        },
        _ => IdentityError::from(e),
    })?;
    Ok(identity)
}

pub async fn fetch_identity(id: i64, conn: &mut SqliteConnection) -> Result<Option<Identity>, IdentityError> {
    let identity = sqlx::query_as("SELECT * FROM identities WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(identity)
}

pub async fn fetch_identity_by_subject(
    subject: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Identity>, IdentityError> {
    let identity =
        sqlx::query_as("SELECT * FROM identities WHERE subject = $1").bind(subject).fetch_optional(conn).await?;
    Ok(identity)
}

pub async fn fetch_identity_by_email(
    email: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Identity>, IdentityError> {
    let identity = sqlx::query_as("SELECT * FROM identities WHERE email = $1 COLLATE NOCASE")
        .bind(email)
        .fetch_optional(conn)
        .await?;
    Ok(identity)
}

pub async fn fetch_identity_by_wallet_number(
    wallet_number: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Identity>, IdentityError> {
    let identity = sqlx::query_as("SELECT * FROM identities WHERE wallet_number = $1")
        .bind(wallet_number)
        .fetch_optional(conn)
        .await?;
    Ok(identity)
}

pub async fn wallet_number_exists(wallet_number: &str, conn: &mut SqliteConnection) -> Result<bool, IdentityError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM identities WHERE wallet_number = $1")
        .bind(wallet_number)
        .fetch_one(conn)
        .await?;
    Ok(count > 0)
}
