//! Issuance, rollover, revocation and validation of scoped API keys.
use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{normalize_permissions, ApiKey, Capability, ExpiryDuration, IssuedApiKey, NewApiKey},
    helpers::{generate_api_key_secret, hash_api_key},
    traits::{CredentialError, CredentialManagement},
};

pub const DEFAULT_API_KEY_PREFIX: &str = "sk_live_";
pub const DEFAULT_MAX_ACTIVE_KEYS: usize = 5;
const MAX_LABEL_LENGTH: usize = 100;

#[derive(Debug, Clone)]
pub struct ApiKeyPolicy {
    /// Prepended to every secret so that leaked keys are easy to recognise.
    pub prefix: String,
    pub max_active_keys: usize,
}

impl Default for ApiKeyPolicy {
    fn default() -> Self {
        Self { prefix: DEFAULT_API_KEY_PREFIX.to_string(), max_active_keys: DEFAULT_MAX_ACTIVE_KEYS }
    }
}

pub struct ApiKeyApi<B> {
    db: B,
    policy: ApiKeyPolicy,
}

impl<B: Debug> Debug for ApiKeyApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKeyApi ({:?})", self.db)
    }
}

impl<B: Clone> Clone for ApiKeyApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), policy: self.policy.clone() }
    }
}

impl<B> ApiKeyApi<B>
where B: CredentialManagement
{
    pub fn new(db: B) -> Self {
        Self { db, policy: ApiKeyPolicy::default() }
    }

    pub fn with_policy(mut self, policy: ApiKeyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &ApiKeyPolicy {
        &self.policy
    }

    /// Issues a new key for the identity. Fails if the identity already holds the maximum number of active keys.
    pub async fn issue(
        &self,
        identity_id: i64,
        label: &str,
        permissions: &[Capability],
        expiry: ExpiryDuration,
    ) -> Result<IssuedApiKey, CredentialError> {
        let label = validate_label(label)?;
        let permissions = normalize_permissions(permissions);
        if permissions.is_empty() {
            return Err(CredentialError::ValidationFailure("At least one permission is required".into()));
        }
        let (secret, new_key) = self.new_key(identity_id, label, permissions, expiry);
        let key = self.db.insert_api_key(new_key, self.policy.max_active_keys).await?;
        info!("🔑️ API key #{} ({}) issued to identity #{identity_id}, expires {}", key.id, key.label, key.expires_at);
        Ok(issued(key, secret))
    }

    /// Replaces an expired key with a new one carrying the same permissions.
    ///
    /// The key must belong to `identity_id` and must actually have expired. The old key is deactivated and the new
    /// one inserted in one atomic unit.
    pub async fn rollover(
        &self,
        identity_id: i64,
        expired_key_id: i64,
        expiry: ExpiryDuration,
    ) -> Result<IssuedApiKey, CredentialError> {
        let old = self.owned_key(identity_id, expired_key_id).await?;
        if !old.is_expired_at(Utc::now()) {
            debug!("🔑️ Refusing to roll over key #{expired_key_id}: it expires at {}", old.expires_at);
            return Err(CredentialError::KeyNotExpired(expired_key_id));
        }
        let label = format!("{} (Rollover)", old.label);
        let (secret, new_key) = self.new_key(identity_id, label, old.permissions.clone(), expiry);
        let key = self.db.replace_api_key(old.id, new_key, self.policy.max_active_keys).await?;
        info!("🔑️ API key #{} rolled over to #{} for identity #{identity_id}", old.id, key.id);
        Ok(issued(key, secret))
    }

    /// Permanently deactivates a key. Revoking an inactive key is a no-op.
    pub async fn revoke(&self, identity_id: i64, key_id: i64) -> Result<(), CredentialError> {
        self.owned_key(identity_id, key_id).await?;
        if self.db.deactivate_api_key(key_id).await? {
            info!("🔑️ API key #{key_id} revoked by identity #{identity_id}");
        }
        Ok(())
    }

    pub async fn list(&self, identity_id: i64) -> Result<Vec<ApiKey>, CredentialError> {
        self.db.fetch_api_keys_for_identity(identity_id).await
    }

    /// Looks up the key for a presented secret. Returns `None` unless the key exists, is active and has not expired.
    ///
    /// A successful validation records the time of use. Failing to record it is logged and otherwise ignored.
    pub async fn validate(&self, secret: &str) -> Result<Option<ApiKey>, CredentialError> {
        if !secret.starts_with(&self.policy.prefix) {
            trace!("🔑️ Presented API key does not carry the expected prefix");
            return Ok(None);
        }
        let key = match self.db.fetch_api_key_by_hash(&hash_api_key(secret)).await? {
            Some(key) => key,
            None => return Ok(None),
        };
        let now = Utc::now();
        if !key.is_valid_at(now) {
            debug!("🔑️ API key #{} presented but is inactive or expired", key.id);
            return Ok(None);
        }
        if let Err(e) = self.db.touch_api_key(key.id, now).await {
            warn!("🔑️ Could not record last use of API key #{}. {e}", key.id);
        }
        Ok(Some(key))
    }

    async fn owned_key(&self, identity_id: i64, key_id: i64) -> Result<ApiKey, CredentialError> {
        let key = self.db.fetch_api_key(key_id).await?.ok_or(CredentialError::KeyNotFound(key_id))?;
        if key.identity_id != identity_id {
            warn!("🔑️ Identity #{identity_id} tried to manage API key #{key_id}, which it does not own");
            return Err(CredentialError::KeyNotOwned(key_id));
        }
        Ok(key)
    }

    fn new_key(
        &self,
        identity_id: i64,
        label: String,
        permissions: Vec<Capability>,
        expiry: ExpiryDuration,
    ) -> (String, NewApiKey) {
        let secret = generate_api_key_secret(&self.policy.prefix);
        let key_hash = hash_api_key(&secret);
        let expires_at = Utc::now() + expiry.duration();
        (secret, NewApiKey { identity_id, label, key_hash, permissions, expires_at })
    }
}

fn issued(key: ApiKey, secret: String) -> IssuedApiKey {
    IssuedApiKey { id: key.id, secret, label: key.label, permissions: key.permissions, expires_at: key.expires_at }
}

fn validate_label(label: &str) -> Result<String, CredentialError> {
    let label = label.trim();
    if label.is_empty() {
        return Err(CredentialError::ValidationFailure("A key name is required".into()));
    }
    if label.chars().count() > MAX_LABEL_LENGTH {
        return Err(CredentialError::ValidationFailure(format!("Key names are limited to {MAX_LABEL_LENGTH} characters")));
    }
    Ok(label.to_string())
}
