use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{ApiKey, NewApiKey};

#[allow(async_fn_in_trait)]
pub trait CredentialManagement: Clone {
    /// Stores a new, active API key, provided the identity holds fewer than `max_active` active keys. The count and
    /// the insert happen atomically.
    async fn insert_api_key(&self, key: NewApiKey, max_active: usize) -> Result<ApiKey, CredentialError>;

    /// Deactivates `old_key_id` and inserts `key` in one atomic unit, subject to the same `max_active` limit.
    async fn replace_api_key(
        &self,
        old_key_id: i64,
        key: NewApiKey,
        max_active: usize,
    ) -> Result<ApiKey, CredentialError>;

    async fn fetch_api_key(&self, key_id: i64) -> Result<Option<ApiKey>, CredentialError>;

    async fn fetch_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, CredentialError>;

    async fn fetch_api_keys_for_identity(&self, identity_id: i64) -> Result<Vec<ApiKey>, CredentialError>;

    /// Permanently deactivates the key. Returns false if it was already inactive.
    async fn deactivate_api_key(&self, key_id: i64) -> Result<bool, CredentialError>;

    async fn touch_api_key(&self, key_id: i64, used_at: DateTime<Utc>) -> Result<(), CredentialError>;
}

#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Maximum {0} active API keys allowed")]
    TooManyActiveKeys(usize),
    #[error("API key {0} does not exist")]
    KeyNotFound(i64),
    #[error("API key {0} does not belong to this user")]
    KeyNotOwned(i64),
    #[error("API key is not expired")]
    KeyNotExpired(i64),
    #[error("API key {0} has been revoked")]
    KeyInactive(i64),
    #[error("Invalid expiry code: {0}. Use one of 1H, 1D, 1M, 1Y")]
    InvalidExpiryCode(String),
    #[error("Invalid API key request: {0}")]
    ValidationFailure(String),
    #[error("A key with this secret already exists")]
    DuplicateSecret,
}

impl From<sqlx::Error> for CredentialError {
    fn from(e: sqlx::Error) -> Self {
        CredentialError::DatabaseError(e.to_string())
    }
}
