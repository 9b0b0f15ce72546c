use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use paystack_tools::{signature::SIGNATURE_HEADER, PaystackApi};
use wallet_engine::{ApiKeyApi, DepositFlowApi, SqliteDatabase, WalletApi};

use crate::{
    auth::SessionTokens,
    config::ServerConfig,
    errors::ServerError,
    integrations::paystack::PaystackGateway,
    middleware::{HmacMiddlewareFactory, PrincipalMiddlewareFactory},
    reconcile_worker::start_reconciliation_worker,
    routes::{
        health,
        BalanceRoute,
        CreateKeyRoute,
        DepositRoute,
        DepositStatusRoute,
        ListKeysRoute,
        PaystackWebhookRoute,
        RevokeKeyRoute,
        RolloverKeyRoute,
        TransactionsRoute,
        TransferRoute,
        VerifyDepositRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let api = PaystackApi::new(config.paystack.api.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = PaystackGateway::new(api);
    let reconciler = deposit_flow_api(&config, db.clone(), gateway.clone());
    let _worker = start_reconciliation_worker(reconciler, config.reconcile);
    debug!("🚀️ Reconciliation worker started. Binding HTTP server");
    let srv = create_server_instance(config, db, gateway)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// The deposit flow as configured for this server. The HTTP handlers and the reconciliation worker must agree on it.
pub fn deposit_flow_api(
    config: &ServerConfig,
    db: SqliteDatabase,
    gateway: PaystackGateway,
) -> DepositFlowApi<SqliteDatabase, PaystackGateway> {
    DepositFlowApi::new(db, gateway).with_currency(config.currency.as_str())
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: PaystackGateway,
) -> Result<Server, ServerError> {
    let bind_addr = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        let wallet_api = WalletApi::new(db.clone()).with_currency(config.currency.as_str());
        let deposit_api = deposit_flow_api(&config, db.clone(), gateway.clone());
        let keys_api = ApiKeyApi::new(db.clone()).with_policy(config.api_keys.clone());
        let sessions = SessionTokens::new(&config.auth);
        let paystack = &config.paystack;
        let webhook_scope = web::scope("/wallet/paystack")
            .wrap(HmacMiddlewareFactory::new(SIGNATURE_HEADER, paystack.webhook_secret.clone(), paystack.hmac_checks))
            .service(PaystackWebhookRoute::<SqliteDatabase, PaystackGateway>::new());
        let wallet_scope = web::scope("/wallet")
            .service(DepositRoute::<SqliteDatabase, PaystackGateway>::new())
            .service(DepositStatusRoute::<SqliteDatabase>::new())
            .service(VerifyDepositRoute::<SqliteDatabase, PaystackGateway>::new())
            .service(BalanceRoute::<SqliteDatabase>::new())
            .service(TransferRoute::<SqliteDatabase>::new())
            .service(TransactionsRoute::<SqliteDatabase>::new());
        let keys_scope = web::scope("/keys")
            .service(CreateKeyRoute::<SqliteDatabase>::new())
            .service(RolloverKeyRoute::<SqliteDatabase>::new())
            .service(ListKeysRoute::<SqliteDatabase>::new())
            .service(RevokeKeyRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(PrincipalMiddlewareFactory::<SqliteDatabase>::new())
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("wallet::access_log"))
            .app_data(web::Data::new(wallet_api))
            .app_data(web::Data::new(deposit_api))
            .app_data(web::Data::new(keys_api))
            .app_data(web::Data::new(sessions))
            .service(health)
            // The webhook scope must be registered before the broader /wallet scope
            .service(webhook_scope)
            .service(wallet_scope)
            .service(keys_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((bind_addr.0.as_str(), bind_addr.1))?
    .run();
    Ok(srv)
}
