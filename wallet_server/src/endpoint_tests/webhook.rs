use std::time::Duration;

use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use ledger_common::{Amount, Secret};
use paystack_tools::signature::{calculate_signature, SIGNATURE_HEADER};
use serde_json::json;
use wallet_engine::{db_types::Identity, DepositFlowApi, SqliteDatabase, WalletApi};

use super::{
    helpers::{balance_of, identity, send, test_db, Credential},
    mocks::{accepting_gateway, MockGateway},
};
use crate::{middleware::HmacMiddlewareFactory, routes::PaystackWebhookRoute};

const WEBHOOK_SECRET: &str = "sk_test_webhook_secret";

fn configure_webhook(db: SqliteDatabase) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        cfg.app_data(web::Data::new(DepositFlowApi::new(db, MockGateway::new()))).service(
            web::scope("/wallet/paystack")
                .wrap(HmacMiddlewareFactory::new(SIGNATURE_HEADER, Secret::new(WEBHOOK_SECRET.to_string()), true))
                .service(PaystackWebhookRoute::<SqliteDatabase, MockGateway>::new()),
        );
    }
}

fn charge_event(reference: &str, amount: i64, email: Option<&str>) -> String {
    json!({
        "event": "charge.success",
        "data": {
            "id": 302961,
            "status": "success",
            "reference": reference,
            "amount": amount,
            "currency": "NGN",
            "customer": { "email": email }
        }
    })
    .to_string()
}

fn signed_webhook(body: &str) -> TestRequest {
    let signature = calculate_signature(WEBHOOK_SECRET, body.as_bytes()).unwrap();
    TestRequest::post()
        .uri("/wallet/paystack/webhook")
        .insert_header(("content-type", "application/json"))
        .insert_header((SIGNATURE_HEADER, signature))
        .set_payload(body.to_string())
}

/// Webhooks are processed in the background, so poll until the balance settles on the expected value.
async fn wait_for_balance(db: &SqliteDatabase, identity: &Identity, expected: i64) -> Amount {
    for _ in 0..100 {
        let balance = balance_of(db, identity).await;
        if balance == Amount::from(expected) {
            return balance;
        }
        actix_web::rt::time::sleep(Duration::from_millis(20)).await;
    }
    balance_of(db, identity).await
}

#[actix_web::test]
async fn charge_success_is_credited_once() {
    let db = test_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let body = charge_event("tx_abc", 500_000, Some("alice@example.com"));

    let (status, res) = send(signed_webhook(&body), Credential::Anonymous, configure_webhook(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["success"], true);
    let balance = wait_for_balance(&db, &alice, 500_000).await;
    assert_eq!(balance.to_string(), "5000.00");

    // Paystack retries. Nothing changes.
    let (status, _) = send(signed_webhook(&body), Credential::Anonymous, configure_webhook(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    actix_web::rt::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(balance_of(&db, &alice).await, Amount::from(500_000));
    let txs = WalletApi::new(db.clone()).list_transactions(alice.id).await.unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].reference, "tx_abc");
}

#[actix_web::test]
async fn initialized_deposits_are_matched_by_reference() {
    let db = test_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let flow = DepositFlowApi::new(db.clone(), accepting_gateway());
    let started = flow.initialize_deposit(alice.id, Amount::from(75_000)).await.unwrap();

    let body = charge_event(&started.reference, 75_000, None);
    let (status, _) = send(signed_webhook(&body), Credential::Anonymous, configure_webhook(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(wait_for_balance(&db, &alice, 75_000).await, Amount::from(75_000));
}

#[actix_web::test]
async fn bad_signatures_are_rejected() {
    let db = test_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let body = charge_event("tx_forged", 1_000_000, Some("alice@example.com"));

    let forged = TestRequest::post()
        .uri("/wallet/paystack/webhook")
        .insert_header((SIGNATURE_HEADER, calculate_signature("not-the-secret", body.as_bytes()).unwrap()))
        .set_payload(body.clone());
    let (status, res) = send(forged, Credential::Anonymous, configure_webhook(db.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(res["code"], "unauthorized");

    let unsigned = TestRequest::post().uri("/wallet/paystack/webhook").set_payload(body);
    let (status, _) = send(unsigned, Credential::Anonymous, configure_webhook(db.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    actix_web::rt::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(balance_of(&db, &alice).await, Amount::from(0));
}

#[actix_web::test]
async fn other_events_are_acknowledged_and_ignored() {
    let db = test_db().await;
    let body = json!({ "event": "transfer.success", "data": { "reference": "trf_1" } }).to_string();
    let (status, res) = send(signed_webhook(&body), Credential::Anonymous, configure_webhook(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["message"], "transfer.success event ignored.");

    let (status, res) = send(signed_webhook("not json at all"), Credential::Anonymous, configure_webhook(db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["success"], false);
}

#[actix_web::test]
async fn charges_for_nobody_are_acknowledged() {
    let db = test_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let body = charge_event("tx_stranger", 5_000, Some("stranger@example.com"));
    let (status, _) = send(signed_webhook(&body), Credential::Anonymous, configure_webhook(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    actix_web::rt::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(balance_of(&db, &alice).await, Amount::from(0));
}
