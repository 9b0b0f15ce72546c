use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewTransaction, Transaction, TransactionStatus, TransactionType},
    traits::LedgerError,
};

pub async fn insert_pending(tx: NewTransaction, conn: &mut SqliteConnection) -> Result<Transaction, LedgerError> {
    let now = Utc::now();
    let reference = tx.reference.clone();
    let transaction = sqlx::query_as(
        r#"
            INSERT INTO transactions (reference, identity_id, tx_type, amount, status, sender_wallet_number,
                receiver_wallet_number, external_reference, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING *;
        "#,
    )
    .bind(tx.reference)
    .bind(tx.identity_id)
    .bind(tx.tx_type)
    .bind(tx.amount)
    .bind(TransactionStatus::Pending)
    .bind(tx.sender_wallet_number)
    .bind(tx.receiver_wallet_number)
    .bind(tx.external_reference)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => LedgerError::ReferenceAlreadyExists(reference),
        _ => LedgerError::from(e),
    })?;
    Ok(transaction)
}

pub async fn fetch_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Transaction>, LedgerError> {
    let tx = sqlx::query_as("SELECT * FROM transactions WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(tx)
}

pub async fn fetch_by_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, LedgerError> {
    let tx =
        sqlx::query_as("SELECT * FROM transactions WHERE reference = $1").bind(reference).fetch_optional(conn).await?;
    Ok(tx)
}

pub async fn fetch_by_external_reference(
    external_reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, LedgerError> {
    let tx = sqlx::query_as("SELECT * FROM transactions WHERE external_reference = $1 ORDER BY id LIMIT 1")
        .bind(external_reference)
        .fetch_optional(conn)
        .await?;
    Ok(tx)
}

/// Compare-and-swap on the status column: moves the transaction to `status` only if it is still `Pending`.
/// Returns `None` if it was not.
pub async fn settle(
    id: i64,
    status: TransactionStatus,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, LedgerError> {
    let tx = sqlx::query_as(
        r#"
            UPDATE transactions SET status = $1, updated_at = $2
            WHERE id = $3 AND status = $4
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(at)
    .bind(id)
    .bind(TransactionStatus::Pending)
    .fetch_optional(conn)
    .await?;
    Ok(tx)
}

pub async fn fetch_for_identity(
    identity_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, LedgerError> {
    let txs = sqlx::query_as("SELECT * FROM transactions WHERE identity_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(identity_id)
        .fetch_all(conn)
        .await?;
    Ok(txs)
}

pub async fn fetch_pending_deposits(conn: &mut SqliteConnection) -> Result<Vec<Transaction>, LedgerError> {
    let txs = sqlx::query_as("SELECT * FROM transactions WHERE status = $1 AND tx_type = $2 ORDER BY id")
        .bind(TransactionStatus::Pending)
        .bind(TransactionType::Deposit)
        .fetch_all(conn)
        .await?;
    Ok(txs)
}
