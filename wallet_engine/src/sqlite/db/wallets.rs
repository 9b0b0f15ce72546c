use chrono::{DateTime, Utc};
use ledger_common::Amount;
use sqlx::SqliteConnection;

use crate::{db_types::Wallet, traits::WalletError};

/// Creates the wallet for the identity if it does not exist, copying the identity's wallet number. Idempotent.
pub async fn fetch_or_create_wallet(
    identity_id: i64,
    currency: &str,
    conn: &mut SqliteConnection,
) -> Result<Wallet, WalletError> {
    let now = Utc::now();
    sqlx::query(
        r#"
            INSERT INTO wallets (identity_id, wallet_number, balance, currency, active, created_at, updated_at)
            SELECT id, wallet_number, 0, $2, 1, $3, $3 FROM identities WHERE id = $1
            ON CONFLICT (identity_id) DO NOTHING;
        "#,
    )
    .bind(identity_id)
    .bind(currency)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    fetch_wallet_for_identity(identity_id, conn).await?.ok_or(WalletError::IdentityNotFound(identity_id))
}

pub async fn fetch_wallet_for_identity(
    identity_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Wallet>, WalletError> {
    let wallet =
        sqlx::query_as("SELECT * FROM wallets WHERE identity_id = $1").bind(identity_id).fetch_optional(conn).await?;
    Ok(wallet)
}

pub async fn fetch_wallet_by_number(
    wallet_number: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Wallet>, WalletError> {
    let wallet = sqlx::query_as("SELECT * FROM wallets WHERE wallet_number = $1")
        .bind(wallet_number)
        .fetch_optional(conn)
        .await?;
    Ok(wallet)
}

/// Takes the write lock on the wallet row, for the remainder of the enclosing transaction. Returns false if the
/// wallet does not exist.
pub async fn lock_wallet(wallet_number: &str, conn: &mut SqliteConnection) -> Result<bool, WalletError> {
    let result = sqlx::query("UPDATE wallets SET updated_at = updated_at WHERE wallet_number = $1")
        .bind(wallet_number)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn credit_balance(
    wallet_number: &str,
    amount: Amount,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Wallet, WalletError> {
    let wallet = sqlx::query_as(
        r#"
            UPDATE wallets SET balance = balance + $1, last_transaction_at = $2, updated_at = $2
            WHERE wallet_number = $3
            RETURNING *;
        "#,
    )
    .bind(amount)
    .bind(at)
    .bind(wallet_number)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| WalletError::WalletNotFound(wallet_number.to_string()))?;
    Ok(wallet)
}

/// Subtracts `amount` from the balance, but only if the balance covers it. Returns `None` (and changes nothing) if it
/// does not, or if the wallet does not exist.
pub async fn debit_balance(
    wallet_number: &str,
    amount: Amount,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Wallet>, WalletError> {
    let wallet = sqlx::query_as(
        r#"
            UPDATE wallets SET balance = balance - $1, last_transaction_at = $2, updated_at = $2
            WHERE wallet_number = $3 AND balance >= $1
            RETURNING *;
        "#,
    )
    .bind(amount)
    .bind(at)
    .bind(wallet_number)
    .fetch_optional(conn)
    .await?;
    Ok(wallet)
}
