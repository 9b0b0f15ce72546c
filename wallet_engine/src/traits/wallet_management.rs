use ledger_common::Amount;
use thiserror::Error;

use crate::{
    db_types::{TransferLegs, Transaction, TransactionStatus, Wallet},
    traits::{GatewayError, IdentityError, LedgerError},
};

/// Wallet storage and the atomic balance mutations.
///
/// Every balance change goes through [`apply_credit`](WalletManagement::apply_credit) or
/// [`apply_transfer`](WalletManagement::apply_transfer). Each of these is a single atomic unit that settles the
/// ledger rows it belongs to at the same time, so a balance can never move without its transaction reaching
/// `Success`, and vice versa.
#[allow(async_fn_in_trait)]
pub trait WalletManagement: Clone {
    /// Returns the identity's wallet, creating it (with a zero balance in `currency`) if it does not exist yet.
    async fn fetch_or_create_wallet(&self, identity_id: i64, currency: &str) -> Result<Wallet, WalletError>;

    async fn fetch_wallet_for_identity(&self, identity_id: i64) -> Result<Option<Wallet>, WalletError>;

    async fn fetch_wallet_by_number(&self, wallet_number: &str) -> Result<Option<Wallet>, WalletError>;

    /// In one atomic unit: moves `tx` from `Pending` to `Success` and adds its amount to the wallet's balance.
    ///
    /// Returns `None` without touching the balance if the stored transaction is no longer pending, i.e. another
    /// caller has already settled it.
    async fn apply_credit(&self, tx: &Transaction, wallet_number: &str) -> Result<Option<Wallet>, WalletError>;

    /// In one atomic unit: debits the sender, credits the receiver, and moves both legs to `Success`.
    ///
    /// Wallet rows are locked in ascending wallet-number order. If the sender cannot cover the amount, or either leg
    /// is no longer pending, nothing is changed and an error is returned.
    async fn apply_transfer(&self, legs: &TransferLegs) -> Result<(), WalletError>;
}

#[derive(Debug, Clone, Error)]
pub enum WalletError {
    #[error("Invalid request: {0}")]
    ValidationFailure(String),
    #[error("Identity {0} does not exist")]
    IdentityNotFound(i64),
    #[error("Wallet {0} does not exist")]
    WalletNotFound(String),
    #[error("Transaction {0} does not exist")]
    TransactionNotFound(String),
    #[error("Insufficient balance in wallet {wallet_number}. Balance: {balance}, requested: {requested}")]
    InsufficientBalance { wallet_number: String, balance: Amount, requested: Amount },
    #[error("A transaction with reference {0} already exists")]
    DuplicateReference(String),
    #[error("Transaction {reference} is already {status}")]
    TransactionAlreadySettled { reference: String, status: TransactionStatus },
    #[error("The payment gateway call failed. {0}")]
    ExternalServiceFailure(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Ledger inconsistency: {0}")]
    InternalInconsistency(String),
}

impl From<sqlx::Error> for WalletError {
    fn from(e: sqlx::Error) -> Self {
        WalletError::DatabaseError(e.to_string())
    }
}

impl From<LedgerError> for WalletError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::DatabaseError(s) => WalletError::DatabaseError(s),
            LedgerError::ReferenceAlreadyExists(r) => WalletError::DuplicateReference(r),
            LedgerError::TransactionNotFound(r) => WalletError::TransactionNotFound(r),
            LedgerError::IllegalStatusTransition { .. } => WalletError::InternalInconsistency(e.to_string()),
        }
    }
}

impl From<IdentityError> for WalletError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::DatabaseError(s) => WalletError::DatabaseError(s),
            IdentityError::IdentityNotFound(id) => WalletError::IdentityNotFound(id),
            IdentityError::ValidationFailure(s) => WalletError::ValidationFailure(s),
            e => WalletError::InternalInconsistency(e.to_string()),
        }
    }
}

impl From<GatewayError> for WalletError {
    fn from(e: GatewayError) -> Self {
        WalletError::ExternalServiceFailure(e.to_string())
    }
}
