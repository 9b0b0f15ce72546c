use thiserror::Error;

use crate::db_types::{Identity, NewIdentity};

#[allow(async_fn_in_trait)]
pub trait IdentityManagement: Clone {
    async fn fetch_identity(&self, identity_id: i64) -> Result<Option<Identity>, IdentityError>;

    async fn fetch_identity_by_subject(&self, subject: &str) -> Result<Option<Identity>, IdentityError>;

    async fn fetch_identity_by_email(&self, email: &str) -> Result<Option<Identity>, IdentityError>;

    async fn fetch_identity_by_wallet_number(&self, wallet_number: &str) -> Result<Option<Identity>, IdentityError>;

    async fn wallet_number_exists(&self, wallet_number: &str) -> Result<bool, IdentityError>;

    /// Stores a new identity with the given wallet number.
    ///
    /// Fails with [`IdentityError::WalletNumberTaken`] if the number is already assigned, and with
    /// [`IdentityError::IdentityAlreadyExists`] if the subject or email is already known.
    async fn insert_identity(&self, identity: NewIdentity, wallet_number: &str) -> Result<Identity, IdentityError>;
}

#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Identity {0} does not exist")]
    IdentityNotFound(i64),
    #[error("An identity for {0} already exists")]
    IdentityAlreadyExists(String),
    #[error("Wallet number {0} is already assigned")]
    WalletNumberTaken(String),
    #[error("Could not allocate an unused wallet number after {0} attempts")]
    WalletNumbersExhausted(usize),
    #[error("Invalid identity: {0}")]
    ValidationFailure(String),
}

impl From<sqlx::Error> for IdentityError {
    fn from(e: sqlx::Error) -> Self {
        IdentityError::DatabaseError(e.to_string())
    }
}
