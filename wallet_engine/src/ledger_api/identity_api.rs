//! Resolution of identity-provider users to local, wallet-owning identities.
use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Identity, NewIdentity},
    helpers::generate_wallet_number,
    traits::{IdentityError, IdentityManagement},
};

pub const MAX_WALLET_NUMBER_ATTEMPTS: usize = 10;

pub struct IdentityApi<B> {
    db: B,
    number_generator: fn() -> String,
}

impl<B: Debug> Debug for IdentityApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IdentityApi ({:?})", self.db)
    }
}

impl<B> IdentityApi<B>
where B: IdentityManagement
{
    pub fn new(db: B) -> Self {
        Self { db, number_generator: generate_wallet_number }
    }

    /// Replaces the wallet number generator. Only useful for exercising collision handling.
    pub fn with_number_generator(mut self, generator: fn() -> String) -> Self {
        self.number_generator = generator;
        self
    }

    pub async fn fetch(&self, identity_id: i64) -> Result<Identity, IdentityError> {
        self.db.fetch_identity(identity_id).await?.ok_or(IdentityError::IdentityNotFound(identity_id))
    }

    pub async fn fetch_by_email(&self, email: &str) -> Result<Option<Identity>, IdentityError> {
        self.db.fetch_identity_by_email(email).await
    }

    /// Returns the local identity for an identity-provider user, creating it on first sight.
    ///
    /// New identities get a freshly drawn wallet number. Numbers already in use are skipped; after
    /// [`MAX_WALLET_NUMBER_ATTEMPTS`] collisions the call fails rather than keep drawing.
    pub async fn find_or_create(&self, identity: NewIdentity) -> Result<Identity, IdentityError> {
        let identity = NewIdentity { email: identity.email.trim().to_string(), ..identity };
        let email = identity.email.as_str();
        if email.is_empty() || !email.contains('@') {
            return Err(IdentityError::ValidationFailure(format!("'{email}' is not an email address")));
        }
        if let Some(existing) = self.find_existing(&identity).await? {
            trace!("🔑️ Identity #{} already exists for {}", existing.id, existing.email);
            return Ok(existing);
        }
        for attempt in 1..=MAX_WALLET_NUMBER_ATTEMPTS {
            let wallet_number = (self.number_generator)();
            if self.db.wallet_number_exists(&wallet_number).await? {
                debug!("🔑️ Wallet number collision on attempt {attempt}");
                continue;
            }
            match self.db.insert_identity(identity.clone(), &wallet_number).await {
                Ok(created) => {
                    info!("🔑️ New identity #{} for {} with wallet number {wallet_number}", created.id, created.email);
                    return Ok(created);
                },
                Err(IdentityError::WalletNumberTaken(_)) => {
                    debug!("🔑️ Wallet number taken during insert on attempt {attempt}");
                },
                Err(IdentityError::IdentityAlreadyExists(who)) => {
                    debug!("🔑️ {who} was created concurrently. Using the existing record");
                    return self.find_existing(&identity).await?.ok_or(IdentityError::IdentityAlreadyExists(who));
                },
                Err(e) => return Err(e),
            }
        }
        error!("🔑️ Could not find an unused wallet number for {email} in {MAX_WALLET_NUMBER_ATTEMPTS} attempts");
        Err(IdentityError::WalletNumbersExhausted(MAX_WALLET_NUMBER_ATTEMPTS))
    }

    async fn find_existing(&self, identity: &NewIdentity) -> Result<Option<Identity>, IdentityError> {
        if let Some(subject) = &identity.subject {
            if let Some(existing) = self.db.fetch_identity_by_subject(subject).await? {
                return Ok(Some(existing));
            }
        }
        self.db.fetch_identity_by_email(&identity.email).await
    }
}
