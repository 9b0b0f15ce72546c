use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use chrono::Duration;
use ledger_common::Amount;
use log::debug;
use wallet_engine::{
    db_types::{Capability, ExpiryDuration, Identity, NewIdentity},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    ApiKeyApi,
    DepositFlowApi,
    IdentityApi,
    SqliteDatabase,
    WalletApi,
};

use super::mocks::MockGateway;
use crate::{
    auth::SessionTokens,
    config::AuthConfig,
    middleware::{PrincipalMiddlewareFactory, API_KEY_HEADER},
    routes::{
        BalanceRoute,
        CreateKeyRoute,
        DepositRoute,
        DepositStatusRoute,
        ListKeysRoute,
        RevokeKeyRoute,
        RolloverKeyRoute,
        TransactionsRoute,
        TransferRoute,
        VerifyDepositRoute,
    },
};

// Creates a test `AuthConfig` for issuing tokens. DO NOT re-use this secret anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig::new("endpoint-tests-only-f3b8c1d2e4a5968778695a4b3c2d1e0f", Duration::hours(1))
}

pub fn issue_token(identity: &Identity) -> String {
    SessionTokens::new(&get_auth_config()).issue(identity).expect("Failed to sign token")
}

pub enum Credential {
    Anonymous,
    Session(String),
    ApiKey(String),
}

pub async fn test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

pub async fn identity(db: &SqliteDatabase, email: &str) -> Identity {
    IdentityApi::new(db.clone()).find_or_create(NewIdentity::new(email)).await.expect("Error creating identity")
}

pub async fn fund(db: &SqliteDatabase, identity: &Identity, amount: i64, reference: &str) {
    WalletApi::new(db.clone())
        .credit(identity.id, Amount::from(amount), reference, Some(reference))
        .await
        .expect("Error funding wallet");
}

pub async fn balance_of(db: &SqliteDatabase, identity: &Identity) -> Amount {
    WalletApi::new(db.clone()).balance_of(identity.id).await.expect("Error fetching balance").balance
}

pub async fn api_key(db: &SqliteDatabase, identity: &Identity, permissions: &[Capability]) -> String {
    ApiKeyApi::new(db.clone())
        .issue(identity.id, "test bot", permissions, ExpiryDuration::OneDay)
        .await
        .expect("Error issuing API key")
        .secret
}

/// Registers the wallet and key routes the way the server does, backed by `db` and the given gateway.
pub fn configure_routes(db: SqliteDatabase, gateway: MockGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        cfg.app_data(web::Data::new(WalletApi::new(db.clone())))
            .app_data(web::Data::new(DepositFlowApi::new(db.clone(), gateway)))
            .app_data(web::Data::new(ApiKeyApi::new(db)))
            .service(
                web::scope("/wallet")
                    .service(DepositRoute::<SqliteDatabase, MockGateway>::new())
                    .service(DepositStatusRoute::<SqliteDatabase>::new())
                    .service(VerifyDepositRoute::<SqliteDatabase, MockGateway>::new())
                    .service(BalanceRoute::<SqliteDatabase>::new())
                    .service(TransferRoute::<SqliteDatabase>::new())
                    .service(TransactionsRoute::<SqliteDatabase>::new()),
            )
            .service(
                web::scope("/keys")
                    .service(CreateKeyRoute::<SqliteDatabase>::new())
                    .service(RolloverKeyRoute::<SqliteDatabase>::new())
                    .service(ListKeysRoute::<SqliteDatabase>::new())
                    .service(RevokeKeyRoute::<SqliteDatabase>::new()),
            );
    }
}

/// Wallet and key routes with a gateway that must not be called.
pub fn routes(db: &SqliteDatabase) -> impl FnOnce(&mut ServiceConfig) {
    configure_routes(db.clone(), MockGateway::new())
}

/// Sends `req` through the principal middleware and the routes added by `configure`. Errors raised by middleware
/// are rendered into responses, just as the server would.
pub async fn send<F>(req: TestRequest, credential: Credential, configure: F) -> (StatusCode, serde_json::Value)
where F: FnOnce(&mut ServiceConfig) {
    let req = match credential {
        Credential::Anonymous => req,
        Credential::Session(token) => req.insert_header(("Authorization", format!("Bearer {token}"))),
        Credential::ApiKey(secret) => req.insert_header((API_KEY_HEADER, secret)),
    };
    let app = App::new()
        .wrap(PrincipalMiddlewareFactory::<SqliteDatabase>::new())
        .app_data(web::Data::new(SessionTokens::new(&get_auth_config())))
        .configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => res.into_parts().1.map_into_boxed_body(),
        Err(e) => e.error_response(),
    };
    let status = res.status();
    let body = res.into_body().try_into_bytes().unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

pub async fn get(
    path: &str,
    credential: Credential,
    configure: impl FnOnce(&mut ServiceConfig),
) -> (StatusCode, serde_json::Value) {
    send(TestRequest::get().uri(path), credential, configure).await
}

pub async fn post<T: serde::Serialize>(
    path: &str,
    body: &T,
    credential: Credential,
    configure: impl FnOnce(&mut ServiceConfig),
) -> (StatusCode, serde_json::Value) {
    send(TestRequest::post().uri(path).set_json(body), credential, configure).await
}
