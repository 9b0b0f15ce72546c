//! Request handler definitions
//!
//! Define each route and its handler here. Access control lives in the `route!` declaration, never in the handler
//! body: by the time a handler runs, the ACL middleware has already approved the principal for the route.
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Anything that touches the database or the payment gateway must be
//! awaited, never blocked on.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use paystack_tools::data_objects::WebhookEvent;
use wallet_engine::{
    db_types::{Capability, ExpiryDuration},
    helpers::generate_reference,
    traits::{CredentialError, CredentialManagement, DepositGateway, LedgerBackend},
    ApiKeyApi,
    DepositFlowApi,
    Principal,
    WalletApi,
};

use crate::{
    data_objects::{
        CreateApiKeyRequest,
        DepositRequest,
        JsonResponse,
        RolloverApiKeyRequest,
        TransactionStatusResponse,
        TransferRequest,
    },
    errors::{AuthError, ServerError},
    integrations::paystack::charge_notification,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro.
// Each trait bound becomes a type parameter of the route struct, named `T<Bound>`, in the order given.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ident),+ where requires [$($caps:expr),+]) => {
        $crate::route!(@build $name => $method $path [$($bounds),+]
            $crate::middleware::AclMiddlewareFactory::new(&[$($caps),+]));
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ident),+ where requires full_trust) => {
        $crate::route!(@build $name => $method $path [$($bounds),+]
            $crate::middleware::AclMiddlewareFactory::full_trust());
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ident),+) => {
        $crate::route!(@build $name => $method $path [$($bounds),+]);
    };

    (@build $name:ident => $method:ident $path:literal [$($bounds:ident),+] $($acl:expr)?) => {
        paste::paste! {
            pub struct [<$name:camel Route>]<$([<T $bounds>]),+>($(core::marker::PhantomData<fn() -> [<T $bounds>]>),+);

            impl<$([<T $bounds>]),+> [<$name:camel Route>]<$([<T $bounds>]),+> {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self {
                    Self($(core::marker::PhantomData::<fn() -> [<T $bounds>]>),+)
                }
            }

            impl<$([<T $bounds>]),+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds>]),+>
            where
                $([<T $bounds>]: $bounds + 'static,)+
            {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name::<$([<T $bounds>]),+>);
                    $(let res = res.wrap($acl);)?
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };
}

fn identity_of(principal: &Principal) -> Result<i64, ServerError> {
    principal.identity_id().ok_or_else(|| ServerError::from(AuthError::MissingCredentials))
}

fn parse_expiry(code: &str) -> Result<ExpiryDuration, ServerError> {
    code.parse::<ExpiryDuration>().map_err(|_| CredentialError::InvalidExpiryCode(code.to_string()).into())
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Webhook  ----------------------------------------------------
route!(paystack_webhook => Post "/webhook" impl LedgerBackend, DepositGateway);
/// Paystack event intake.
///
/// The HMAC middleware has already authenticated the body by the time this runs. Once that has happened, Paystack
/// always gets a 200: a `charge.success` event is credited in the background, and every other outcome (unknown
/// events, unreadable payloads, internal failures) is logged and left for the reconciliation worker.
pub async fn paystack_webhook<B, G>(body: web::Bytes, api: web::Data<DepositFlowApi<B, G>>) -> HttpResponse
where
    B: LedgerBackend + 'static,
    G: DepositGateway + 'static,
{
    trace!("💻️ Received Paystack webhook");
    let event = match serde_json::from_slice::<WebhookEvent>(body.as_ref()) {
        Ok(event) => event,
        Err(e) => {
            warn!("💻️ Could not read Paystack webhook body. {e}");
            return HttpResponse::Ok().json(JsonResponse::failure("Unreadable event. Ignored."));
        },
    };
    let Some(charge) = charge_notification(&event) else {
        return HttpResponse::Ok().json(JsonResponse::success(format!("{} event ignored.", event.event)));
    };
    let reference = charge.reference.clone();
    actix_web::rt::spawn(async move {
        match api.process_charge_success(charge).await {
            Ok(Some(tx)) => debug!("💻️ Webhook for {} settled {} as {:?}", tx.reference, tx.amount, tx.status),
            Ok(None) => debug!("💻️ Webhook for {reference} did not match anything"),
            Err(e) => error!("💻️ Could not process webhook for {reference}. It will be reconciled later. {e}"),
        }
    });
    HttpResponse::Ok().json(JsonResponse::success("Event received."))
}

//----------------------------------------------   Deposits  ----------------------------------------------------
route!(deposit => Post "/deposit" impl LedgerBackend, DepositGateway where requires [Capability::Deposit]);
pub async fn deposit<B, G>(
    principal: web::ReqData<Principal>,
    body: web::Json<DepositRequest>,
    api: web::Data<DepositFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: LedgerBackend,
    G: DepositGateway,
{
    let identity_id = identity_of(&principal)?;
    debug!("💻️ Deposit of {} requested by identity #{identity_id}", body.amount);
    let started = api.initialize_deposit(identity_id, body.amount).await?;
    Ok(HttpResponse::Ok().json(started))
}

route!(deposit_status => Get "/deposit/{reference}/status" impl LedgerBackend where requires [Capability::Read]);
pub async fn deposit_status<B: LedgerBackend>(
    principal: web::ReqData<Principal>,
    path: web::Path<String>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let identity_id = identity_of(&principal)?;
    let reference = path.into_inner();
    let tx = api.transaction_status(&reference, identity_id).await?;
    Ok(HttpResponse::Ok().json(TransactionStatusResponse::from(tx)))
}

route!(verify_deposit => Post "/deposit/{reference}/verify"
    impl LedgerBackend, DepositGateway where requires [Capability::Deposit]);
/// Manual recovery for a deposit whose webhook never arrived.
pub async fn verify_deposit<B, G>(
    principal: web::ReqData<Principal>,
    path: web::Path<String>,
    api: web::Data<DepositFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: LedgerBackend,
    G: DepositGateway,
{
    let identity_id = identity_of(&principal)?;
    let reference = path.into_inner();
    debug!("💻️ Identity #{identity_id} asked to verify deposit {reference}");
    let tx = api.verify_deposit(&reference, identity_id).await?;
    Ok(HttpResponse::Ok().json(TransactionStatusResponse::from(tx)))
}

//----------------------------------------------   Wallet  ----------------------------------------------------
route!(balance => Get "/balance" impl LedgerBackend where requires [Capability::Read]);
pub async fn balance<B: LedgerBackend>(
    principal: web::ReqData<Principal>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let identity_id = identity_of(&principal)?;
    let balance = api.balance_of(identity_id).await?;
    Ok(HttpResponse::Ok().json(balance))
}

route!(transfer => Post "/transfer" impl LedgerBackend where requires [Capability::Transfer]);
pub async fn transfer<B: LedgerBackend>(
    principal: web::ReqData<Principal>,
    body: web::Json<TransferRequest>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let identity_id = identity_of(&principal)?;
    let TransferRequest { wallet_number, amount, reference } = body.into_inner();
    let reference = reference.unwrap_or_else(generate_reference);
    debug!("💻️ Identity #{identity_id} is sending {amount} to {wallet_number} ({reference})");
    let tx = api.transfer(identity_id, wallet_number.trim(), amount, &reference).await?;
    Ok(HttpResponse::Ok().json(tx))
}

route!(transactions => Get "/transactions" impl LedgerBackend where requires [Capability::Read]);
pub async fn transactions<B: LedgerBackend>(
    principal: web::ReqData<Principal>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let identity_id = identity_of(&principal)?;
    let txs = api.list_transactions(identity_id).await?;
    Ok(HttpResponse::Ok().json(txs))
}

//----------------------------------------------   API keys  ----------------------------------------------------
route!(create_key => Post "/create" impl CredentialManagement where requires full_trust);
pub async fn create_key<B: CredentialManagement>(
    principal: web::ReqData<Principal>,
    body: web::Json<CreateApiKeyRequest>,
    api: web::Data<ApiKeyApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let identity_id = identity_of(&principal)?;
    let expiry = parse_expiry(&body.expiry)?;
    let issued = api.issue(identity_id, &body.name, &body.permissions, expiry).await?;
    Ok(HttpResponse::Ok().json(issued))
}

route!(rollover_key => Post "/rollover" impl CredentialManagement where requires full_trust);
pub async fn rollover_key<B: CredentialManagement>(
    principal: web::ReqData<Principal>,
    body: web::Json<RolloverApiKeyRequest>,
    api: web::Data<ApiKeyApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let identity_id = identity_of(&principal)?;
    let expiry = parse_expiry(&body.expiry)?;
    let issued = api.rollover(identity_id, body.expired_key_id, expiry).await?;
    Ok(HttpResponse::Ok().json(issued))
}

route!(list_keys => Get "" impl CredentialManagement where requires full_trust);
pub async fn list_keys<B: CredentialManagement>(
    principal: web::ReqData<Principal>,
    api: web::Data<ApiKeyApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let identity_id = identity_of(&principal)?;
    let keys = api.list(identity_id).await?;
    Ok(HttpResponse::Ok().json(keys))
}

route!(revoke_key => Post "/{id}/revoke" impl CredentialManagement where requires full_trust);
pub async fn revoke_key<B: CredentialManagement>(
    principal: web::ReqData<Principal>,
    path: web::Path<i64>,
    api: web::Data<ApiKeyApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let identity_id = identity_of(&principal)?;
    let key_id = path.into_inner();
    api.revoke(identity_id, key_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("API key {key_id} revoked."))))
}
