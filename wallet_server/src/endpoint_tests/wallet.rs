use actix_web::http::StatusCode;
use ledger_common::Amount;
use serde_json::json;
use wallet_engine::{db_types::Capability, traits::GatewayError};

use super::{
    helpers::{
        api_key,
        balance_of,
        configure_routes,
        fund,
        get,
        identity,
        issue_token,
        post,
        routes,
        test_db,
        Credential,
    },
    mocks::{accepting_gateway, MockGateway},
};

#[actix_web::test]
async fn anonymous_callers_are_unauthorized() {
    let db = test_db().await;
    let (status, body) = get("/wallet/balance", Credential::Anonymous, routes(&db)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
}

#[actix_web::test]
async fn bad_credentials_are_unauthorized() {
    let db = test_db().await;
    let key = Credential::ApiKey("sk_live_not-a-real-key".into());
    let (status, _) = get("/wallet/balance", key, routes(&db)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let token = Credential::Session("not.a.token".into());
    let (status, _) = get("/wallet/balance", token, routes(&db)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn balance_with_session_token() {
    let db = test_db().await;
    let alice = identity(&db, "alice@example.com").await;
    fund(&db, &alice, 500_000, "tx_abc").await;
    let token = Credential::Session(issue_token(&alice));
    let (status, body) = get("/wallet/balance", token, routes(&db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 500_000);
    assert_eq!(body["currency"], "NGN");
    assert_eq!(body["wallet_number"], alice.wallet_number.as_str());
}

#[actix_web::test]
async fn read_only_key_cannot_transfer() {
    let db = test_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let bob = identity(&db, "bob@example.com").await;
    fund(&db, &alice, 10_000, "tx_fund_alice").await;
    let key = api_key(&db, &alice, &[Capability::Read]).await;
    let body = json!({ "wallet_number": bob.wallet_number, "amount": 3000 });
    let (status, res) = post("/wallet/transfer", &body, Credential::ApiKey(key.clone()), routes(&db)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(res["code"], "forbidden");
    assert_eq!(balance_of(&db, &alice).await, Amount::from(10_000));
    assert_eq!(balance_of(&db, &bob).await, Amount::from(0));
    // The same key can still read
    let (status, _) = get("/wallet/balance", Credential::ApiKey(key), routes(&db)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn transfer_with_scoped_key() {
    let db = test_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let bob = identity(&db, "bob@example.com").await;
    fund(&db, &alice, 10_000, "tx_fund_alice").await;
    let key = api_key(&db, &alice, &[Capability::Transfer]).await;
    let body = json!({ "wallet_number": bob.wallet_number, "amount": 3000, "reference": "tx_pay_bob" });
    let (status, res) = post("/wallet/transfer", &body, Credential::ApiKey(key), routes(&db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["reference"], "tx_pay_bob");
    assert_eq!(res["status"], "Success");
    assert_eq!(res["receiver_wallet_number"], bob.wallet_number.as_str());
    assert_eq!(balance_of(&db, &alice).await, Amount::from(7_000));
    assert_eq!(balance_of(&db, &bob).await, Amount::from(3_000));
}

#[actix_web::test]
async fn transfer_failures() {
    let db = test_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let bob = identity(&db, "bob@example.com").await;
    fund(&db, &alice, 1_000, "tx_fund_alice").await;
    let token = issue_token(&alice);

    let body = json!({ "wallet_number": bob.wallet_number, "amount": 5000 });
    let (status, res) = post(
        "/wallet/transfer",
        &body,
        Credential::Session(token.clone()),
        routes(&db),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(res["code"], "insufficient_balance");

    let body = json!({ "wallet_number": "9999999999999", "amount": 500 });
    let (status, res) = post(
        "/wallet/transfer",
        &body,
        Credential::Session(token.clone()),
        routes(&db),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(res["code"], "not_found");

    let body = json!({ "wallet_number": bob.wallet_number, "amount": -5 });
    let (status, res) = post("/wallet/transfer", &body, Credential::Session(token), routes(&db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(res["code"], "validation_failure");
    assert_eq!(balance_of(&db, &alice).await, Amount::from(1_000));
}

#[actix_web::test]
async fn deposit_is_initialized_and_pending() {
    let db = test_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let token = issue_token(&alice);
    let (status, res) = post(
        "/wallet/deposit",
        &json!({ "amount": 500_000 }),
        Credential::Session(token.clone()),
        configure_routes(db.clone(), accepting_gateway()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let reference = res["reference"].as_str().unwrap().to_string();
    assert!(reference.starts_with("tx_"));
    assert_eq!(res["authorization_url"], format!("https://checkout.paystack.com/{reference}"));

    let path = format!("/wallet/deposit/{reference}/status");
    let (status, res) = get(&path, Credential::Session(token), routes(&db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["status"], "Pending");
    assert_eq!(res["amount"], 500_000);

    // Nobody else gets to see it
    let bob = identity(&db, "bob@example.com").await;
    let (status, _) = get(&path, Credential::Session(issue_token(&bob)), routes(&db)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(balance_of(&db, &alice).await, Amount::from(0));
}

#[actix_web::test]
async fn deposit_fails_when_gateway_is_down() {
    let db = test_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_initialize_deposit()
        .returning(|_, _, _| Err(GatewayError::Unreachable("connection refused".into())));
    let (status, res) = post(
        "/wallet/deposit",
        &json!({ "amount": 500_000 }),
        Credential::Session(issue_token(&alice)),
        configure_routes(db.clone(), gateway),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(res["code"], "external_service_failure");
    let (_, txs) = get("/wallet/transactions", Credential::Session(issue_token(&alice)), routes(&db)).await;
    assert_eq!(txs.as_array().unwrap().len(), 0);
}

#[actix_web::test]
async fn verify_deposit_credits_confirmed_deposit() {
    let db = test_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let token = issue_token(&alice);
    let (_, res) = post(
        "/wallet/deposit",
        &json!({ "amount": 25_000 }),
        Credential::Session(token.clone()),
        configure_routes(db.clone(), accepting_gateway()),
    )
    .await;
    let reference = res["reference"].as_str().unwrap().to_string();

    let mut gateway = MockGateway::new();
    let expected = reference.clone();
    gateway
        .expect_verify_deposit()
        .withf(move |r| *r == expected)
        .times(1)
        .returning(|_| Ok(Some(Amount::from(25_000))));
    let path = format!("/wallet/deposit/{reference}/verify");
    let (status, res) =
        post(&path, &json!({}), Credential::Session(token), configure_routes(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["status"], "Success");
    assert_eq!(balance_of(&db, &alice).await, Amount::from(25_000));
}

#[actix_web::test]
async fn verify_deposit_refuses_a_short_payment() {
    let db = test_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let token = issue_token(&alice);
    let (_, res) = post(
        "/wallet/deposit",
        &json!({ "amount": 25_000 }),
        Credential::Session(token.clone()),
        configure_routes(db.clone(), accepting_gateway()),
    )
    .await;
    let reference = res["reference"].as_str().unwrap().to_string();

    let mut gateway = MockGateway::new();
    gateway.expect_verify_deposit().times(1).returning(|_| Ok(Some(Amount::from(100))));
    let path = format!("/wallet/deposit/{reference}/verify");
    let (status, res) =
        post(&path, &json!({}), Credential::Session(token.clone()), configure_routes(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(res["code"], "validation_failure");
    assert_eq!(balance_of(&db, &alice).await, Amount::from(0));

    let path = format!("/wallet/deposit/{reference}/status");
    let (status, res) = get(&path, Credential::Session(token), routes(&db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["status"], "Pending");
}

#[actix_web::test]
async fn deposit_needs_the_deposit_permission() {
    let db = test_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let key = api_key(&db, &alice, &[Capability::Read, Capability::Transfer]).await;
    let (status, _) = post(
        "/wallet/deposit",
        &json!({ "amount": 500_000 }),
        Credential::ApiKey(key),
        routes(&db),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn transactions_are_listed_newest_first() {
    let db = test_db().await;
    let alice = identity(&db, "alice@example.com").await;
    fund(&db, &alice, 100, "tx_first").await;
    fund(&db, &alice, 200, "tx_second").await;
    let key = api_key(&db, &alice, &[Capability::Read]).await;
    let (status, txs) = get("/wallet/transactions", Credential::ApiKey(key), routes(&db)).await;
    assert_eq!(status, StatusCode::OK);
    let refs = txs.as_array().unwrap().iter().map(|t| t["reference"].as_str().unwrap()).collect::<Vec<_>>();
    assert_eq!(refs, vec!["tx_second", "tx_first"]);
}
