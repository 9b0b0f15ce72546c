//! The scoped-access evaluator.
//!
//! Every request reaching the ledger carries an explicit [`Principal`]. There is no ambient "current user": callers
//! resolve the principal once, from the credential presented, and pass it along.
use serde::Serialize;

use crate::db_types::{ApiKey, Capability};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    /// Authenticated with the identity's own session credential. Holds every capability.
    FullTrust { identity_id: i64 },
    /// Authenticated with an API key. Holds exactly the key's permissions, as they were when the key was validated.
    Scoped { identity_id: i64, key_id: i64, permissions: Vec<Capability> },
    Anonymous,
}

impl Principal {
    pub fn full_trust(identity_id: i64) -> Self {
        Self::FullTrust { identity_id }
    }

    pub fn scoped(key: &ApiKey) -> Self {
        Self::Scoped { identity_id: key.identity_id, key_id: key.id, permissions: key.permissions.clone() }
    }

    pub fn identity_id(&self) -> Option<i64> {
        match self {
            Principal::FullTrust { identity_id } => Some(*identity_id),
            Principal::Scoped { identity_id, .. } => Some(*identity_id),
            Principal::Anonymous => None,
        }
    }

    pub fn is_full_trust(&self) -> bool {
        matches!(self, Principal::FullTrust { .. })
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }

    pub fn allows(&self, capability: Capability) -> bool {
        evaluate(self, capability)
    }
}

/// Decides whether `principal` may exercise `capability`.
pub fn evaluate(principal: &Principal, capability: Capability) -> bool {
    match principal {
        Principal::FullTrust { .. } => true,
        Principal::Scoped { permissions, .. } => permissions.contains(&capability),
        Principal::Anonymous => false,
    }
}
