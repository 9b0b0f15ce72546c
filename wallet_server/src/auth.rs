//! Session tokens.
//!
//! A session token is what a user gets after logging in through the identity provider. It is an HS256 JWT whose
//! subject is the local identity id. Holding one makes the bearer a full-trust principal for that identity.
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use serde::{Deserialize, Serialize};
use wallet_engine::db_types::Identity;

use crate::{config::AuthConfig, errors::AuthError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// The identity id, as a string.
    pub sub: String,
    pub email: String,
    /// Expiry, in seconds since the Unix epoch.
    pub exp: i64,
}

impl SessionClaims {
    pub fn identity_id(&self) -> Result<i64, AuthError> {
        self.sub.parse::<i64>().map_err(|_| AuthError::ValidationError(format!("'{}' is not an identity", self.sub)))
    }
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct SessionTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    duration: Duration,
}

impl SessionTokens {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.reveal().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 30;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            duration: config.session_duration,
        }
    }

    /// Issues a token for the identity. Call this only once the identity provider has vouched for the user.
    pub fn issue(&self, identity: &Identity) -> Result<String, AuthError> {
        self.issue_with_expiry(identity.id, &identity.email, Utc::now() + self.duration)
    }

    pub fn issue_with_expiry(
        &self,
        identity_id: i64,
        email: &str,
        expires_at: chrono::DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims =
            SessionClaims { sub: identity_id.to_string(), email: email.to_string(), exp: expires_at.timestamp() };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::ValidationError(format!("Could not sign session token. {e}")))?;
        trace!("🔐️ Issued session token for identity #{identity_id}");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::ValidationError("Session token has expired".into()),
            ErrorKind::InvalidSignature => AuthError::ValidationError("Session token signature is invalid".into()),
            _ => AuthError::PoorlyFormattedToken(e.to_string()),
        })?;
        Ok(data.claims)
    }
}
