//! Principal resolution middleware.
//!
//! Every request leaves this middleware with a [`Principal`] in its extensions:
//! * `x-api-key: <secret>` resolves to a scoped principal, provided the key is active and unexpired.
//! * `Authorization: Bearer <session token>` resolves to a full-trust principal.
//! * No credential at all resolves to [`Principal::Anonymous`]. Routes decide what anonymous callers may do.
//!
//! A credential that is presented but does not check out is rejected here with 401.
use std::{
    future::{ready, Ready},
    marker::PhantomData,
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    web,
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::*;
use wallet_engine::{traits::CredentialManagement, ApiKeyApi, Principal};

use crate::{
    auth::SessionTokens,
    errors::{AuthError, ServerError},
};

pub const API_KEY_HEADER: &str = "x-api-key";

pub struct PrincipalMiddlewareFactory<B> {
    _backend: PhantomData<fn() -> B>,
}

impl<B> PrincipalMiddlewareFactory<B> {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self { _backend: PhantomData }
    }
}

impl<S, Body, B> Transform<S, ServiceRequest> for PrincipalMiddlewareFactory<B>
where
    S: Service<ServiceRequest, Response = ServiceResponse<Body>, Error = Error> + 'static,
    S::Future: 'static,
    Body: 'static,
    B: CredentialManagement + 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<Body>;
    type Transform = PrincipalMiddlewareService<S, B>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(PrincipalMiddlewareService { service: Rc::new(service), _backend: PhantomData }))
    }
}

pub struct PrincipalMiddlewareService<S, B> {
    service: Rc<S>,
    _backend: PhantomData<fn() -> B>,
}

impl<S, Body, B> Service<ServiceRequest> for PrincipalMiddlewareService<S, B>
where
    S: Service<ServiceRequest, Response = ServiceResponse<Body>, Error = Error> + 'static,
    S::Future: 'static,
    Body: 'static,
    B: CredentialManagement + 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<Body>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let keys = req.app_data::<web::Data<ApiKeyApi<B>>>().cloned();
        let sessions = req.app_data::<web::Data<SessionTokens>>().cloned();
        let api_key = req.headers().get(API_KEY_HEADER).map(|v| v.to_str().map(|s| s.trim().to_string()));
        let bearer = req.headers().get(AUTHORIZATION).map(|v| v.to_str().map(|s| s.trim().to_string()));
        Box::pin(async move {
            let principal = match (api_key, bearer) {
                (Some(key), _) => {
                    let key = key.map_err(|_| ServerError::from(AuthError::InvalidApiKey))?;
                    let keys = keys.ok_or_else(|| {
                        error!("🔐️ The API key service is not configured. Cannot authenticate API keys.");
                        ServerError::InitializeError("API key service is missing".into())
                    })?;
                    match keys.validate(&key).await.map_err(ServerError::from)? {
                        Some(key) => {
                            trace!("🔐️ Request authenticated with API key #{}", key.id);
                            Principal::scoped(&key)
                        },
                        None => {
                            debug!("🔐️ Request presented an unusable API key");
                            return Err(ServerError::from(AuthError::InvalidApiKey).into());
                        },
                    }
                },
                (None, Some(header)) => {
                    let header = header.map_err(|e| ServerError::from(AuthError::PoorlyFormattedToken(e.to_string())))?;
                    let token = header.strip_prefix("Bearer ").ok_or_else(|| {
                        ServerError::from(AuthError::PoorlyFormattedToken("Expected a Bearer token".into()))
                    })?;
                    let sessions = sessions.ok_or_else(|| {
                        error!("🔐️ The session token verifier is not configured. Cannot authenticate sessions.");
                        ServerError::InitializeError("Session token verifier is missing".into())
                    })?;
                    let claims = sessions.verify(token.trim()).map_err(|e| {
                        debug!("🔐️ Session token rejected. {e}");
                        ServerError::from(e)
                    })?;
                    let identity_id = claims.identity_id().map_err(ServerError::from)?;
                    trace!("🔐️ Request authenticated with a session token for identity #{identity_id}");
                    Principal::full_trust(identity_id)
                },
                (None, None) => Principal::Anonymous,
            };
            req.extensions_mut().insert(principal);
            service.call(req).await
        })
    }
}
