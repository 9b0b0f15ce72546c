//! Access control middleware.
//!
//! Reads the [`Principal`] left in the request extensions by the principal middleware and checks it against the
//! route's [`AccessRule`]. Anonymous callers get 401. Authenticated callers without the required capability get 403.
//! Either way, the handler (and so the wallet engine) never runs.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::*;
use wallet_engine::{db_types::Capability, evaluate, Principal};

use crate::errors::{AuthError, ServerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRule {
    /// The principal must hold every listed capability.
    Capabilities(Vec<Capability>),
    /// Only session holders. API keys are refused whatever their permissions.
    FullTrust,
}

impl AccessRule {
    pub fn check(&self, principal: &Principal) -> Result<(), AuthError> {
        if principal.is_anonymous() {
            return Err(AuthError::MissingCredentials);
        }
        match self {
            AccessRule::FullTrust if principal.is_full_trust() => Ok(()),
            AccessRule::FullTrust => {
                Err(AuthError::InsufficientPermissions("This operation requires a session token".into()))
            },
            AccessRule::Capabilities(required) => match required.iter().find(|c| !evaluate(principal, **c)) {
                None => Ok(()),
                Some(missing) => Err(AuthError::InsufficientPermissions(format!("Missing permission: {missing}"))),
            },
        }
    }
}

pub struct AclMiddlewareFactory {
    rule: AccessRule,
}

impl AclMiddlewareFactory {
    pub fn new(required: &[Capability]) -> Self {
        AclMiddlewareFactory { rule: AccessRule::Capabilities(required.to_vec()) }
    }

    pub fn full_trust() -> Self {
        AclMiddlewareFactory { rule: AccessRule::FullTrust }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AclMiddlewareService { rule: self.rule.clone(), service: Rc::new(service) }))
    }
}

pub struct AclMiddlewareService<S> {
    rule: AccessRule,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let principal = req.extensions().get::<Principal>().cloned().unwrap_or(Principal::Anonymous);
        let verdict = self.rule.check(&principal);
        Box::pin(async move {
            match verdict {
                Ok(()) => service.call(req).await,
                Err(e) => {
                    debug!("🔐️ {} denied for {:?}. {e}", req.path(), principal);
                    Err(ServerError::from(e).into())
                },
            }
        })
    }
}

#[cfg(test)]
mod test {
    use chrono::{Duration, Utc};
    use wallet_engine::db_types::ApiKey;

    use super::*;

    fn scoped(permissions: Vec<Capability>) -> Principal {
        let now = Utc::now();
        let key = ApiKey {
            id: 9,
            key_hash: String::new(),
            identity_id: 1,
            label: "bot".into(),
            permissions,
            expires_at: now + Duration::days(1),
            active: true,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        };
        Principal::scoped(&key)
    }

    #[test]
    fn read_only_key_cannot_transfer() {
        let rule = AccessRule::Capabilities(vec![Capability::Transfer]);
        let err = rule.check(&scoped(vec![Capability::Read])).unwrap_err();
        assert!(matches!(err, AuthError::InsufficientPermissions(_)));
        assert!(rule.check(&scoped(vec![Capability::Read, Capability::Transfer])).is_ok());
        assert!(rule.check(&Principal::full_trust(1)).is_ok());
        assert!(matches!(rule.check(&Principal::Anonymous), Err(AuthError::MissingCredentials)));
    }

    #[test]
    fn key_management_needs_a_session() {
        let rule = AccessRule::FullTrust;
        assert!(rule.check(&Principal::full_trust(1)).is_ok());
        assert!(matches!(rule.check(&scoped(Capability::all())), Err(AuthError::InsufficientPermissions(_))));
        assert!(matches!(rule.check(&Principal::Anonymous), Err(AuthError::MissingCredentials)));
    }
}
