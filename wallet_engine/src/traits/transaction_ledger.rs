use thiserror::Error;

use crate::db_types::{NewTransaction, Transaction, TransactionStatus};

/// Append and query access to the transaction ledger.
///
/// References are unique across the whole ledger. Backends must enforce this as a hard constraint, so that two
/// concurrent writers with the same reference produce exactly one row; the loser receives
/// [`LedgerError::ReferenceAlreadyExists`].
///
/// Status moves from `Pending` to a terminal status exactly once. Terminal rows are never modified.
#[allow(async_fn_in_trait)]
pub trait TransactionLedger: Clone {
    /// Inserts a new `Pending` transaction.
    async fn record_pending(&self, tx: NewTransaction) -> Result<Transaction, LedgerError>;

    /// Inserts both legs of a transfer as `Pending`, in one atomic unit. Either both rows exist afterwards, or neither.
    async fn record_pending_transfer(
        &self,
        debit: NewTransaction,
        credit: NewTransaction,
    ) -> Result<(Transaction, Transaction), LedgerError>;

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Transaction>, LedgerError>;

    async fn find_by_external_reference(&self, external_reference: &str) -> Result<Option<Transaction>, LedgerError>;

    /// Moves a pending transaction to the given terminal status and returns the updated record.
    ///
    /// Fails with [`LedgerError::IllegalStatusTransition`] if the stored row is no longer pending, or if `status` is
    /// not terminal.
    async fn mark_terminal(&self, tx: &Transaction, status: TransactionStatus) -> Result<Transaction, LedgerError>;

    /// Marks both legs of a transfer as failed in one atomic unit. Legs that are already terminal are left alone.
    async fn mark_transfer_failed(&self, debit: &Transaction, credit: &Transaction) -> Result<(), LedgerError>;

    /// All transactions of the identity, newest first.
    async fn list_for_identity(&self, identity_id: i64) -> Result<Vec<Transaction>, LedgerError>;

    /// All deposits that are still pending, oldest first.
    async fn fetch_pending_deposits(&self) -> Result<Vec<Transaction>, LedgerError>;
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("A transaction with reference {0} already exists")]
    ReferenceAlreadyExists(String),
    #[error("Transaction {0} does not exist")]
    TransactionNotFound(String),
    #[error("Transaction {reference} cannot move from {from} to {to}")]
    IllegalStatusTransition { reference: String, from: TransactionStatus, to: TransactionStatus },
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}
