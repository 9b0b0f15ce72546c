use actix_web::http::StatusCode;
use serde_json::json;
use wallet_engine::db_types::Capability;

use super::helpers::{api_key, get, identity, issue_token, post, routes, test_db, Credential};

#[actix_web::test]
async fn create_list_and_revoke() {
    let db = test_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let token = issue_token(&alice);
    let request = json!({ "name": "payroll bot", "permissions": ["read", "transfer"], "expiry": "1D" });
    let (status, issued) = post("/keys/create", &request, Credential::Session(token.clone()), routes(&db)).await;
    assert_eq!(status, StatusCode::OK);
    let secret = issued["secret"].as_str().unwrap().to_string();
    let key_id = issued["id"].as_i64().unwrap();
    assert!(secret.starts_with("sk_live_"));
    assert_eq!(issued["permissions"], json!(["read", "transfer"]));

    let (status, keys) = get("/keys", Credential::Session(token.clone()), routes(&db)).await;
    assert_eq!(status, StatusCode::OK);
    let keys = keys.as_array().unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0]["label"], "payroll bot");
    assert!(keys[0].get("key_hash").is_none());

    // The new key works until it is revoked
    let (status, _) = get("/wallet/balance", Credential::ApiKey(secret.clone()), routes(&db)).await;
    assert_eq!(status, StatusCode::OK);
    let path = format!("/keys/{key_id}/revoke");
    let (status, res) = post(&path, &json!({}), Credential::Session(token), routes(&db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res["success"], true);
    let (status, _) = get("/wallet/balance", Credential::ApiKey(secret), routes(&db)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn scoped_keys_cannot_manage_keys() {
    let db = test_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let key = api_key(&db, &alice, &Capability::all()).await;
    let request = json!({ "name": "escalation", "permissions": ["transfer"], "expiry": "1Y" });
    let (status, res) = post("/keys/create", &request, Credential::ApiKey(key.clone()), routes(&db)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(res["code"], "forbidden");
    let (status, _) = get("/keys", Credential::ApiKey(key), routes(&db)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = get("/keys", Credential::Anonymous, routes(&db)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn invalid_expiry_is_rejected() {
    let db = test_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let request = json!({ "name": "bot", "permissions": ["read"], "expiry": "2W" });
    let (status, res) = post(
        "/keys/create",
        &request,
        Credential::Session(issue_token(&alice)),
        routes(&db),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(res["code"], "validation_failure");
}

#[actix_web::test]
async fn rollover_of_a_live_key_is_rejected() {
    let db = test_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let token = issue_token(&alice);
    let request = json!({ "name": "bot", "permissions": ["read"], "expiry": "1H" });
    let (_, issued) = post("/keys/create", &request, Credential::Session(token.clone()), routes(&db)).await;
    let request = json!({ "expired_key_id": issued["id"], "expiry": "1D" });
    let (status, res) = post("/keys/rollover", &request, Credential::Session(token), routes(&db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(res["code"], "validation_failure");
}

#[actix_web::test]
async fn foreign_keys_look_missing() {
    let db = test_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let bob = identity(&db, "bob@example.com").await;
    let token = issue_token(&alice);
    let request = json!({ "name": "bot", "permissions": ["read"], "expiry": "1D" });
    let (_, issued) = post("/keys/create", &request, Credential::Session(token), routes(&db)).await;
    let path = format!("/keys/{}/revoke", issued["id"]);
    let (status, res) = post(&path, &json!({}), Credential::Session(issue_token(&bob)), routes(&db)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(res["code"], "not_found");
}
