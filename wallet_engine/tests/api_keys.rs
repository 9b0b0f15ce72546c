use chrono::{Duration, Utc};
use futures_util::future::join_all;
use wallet_engine::{
    db_types::{Capability, ExpiryDuration, NewApiKey},
    helpers::{generate_api_key_secret, hash_api_key},
    traits::{CredentialError, CredentialManagement},
    ApiKeyApi,
    ApiKeyPolicy,
    SqliteDatabase,
};

mod support;

use support::{fresh_db, identity};

/// Plants a key that expired an hour ago and returns its id and secret.
async fn expired_key(db: &SqliteDatabase, identity_id: i64, permissions: Vec<Capability>) -> (i64, String) {
    let secret = generate_api_key_secret("sk_live_");
    let key = NewApiKey {
        identity_id,
        label: "old bot".into(),
        key_hash: hash_api_key(&secret),
        permissions,
        expires_at: Utc::now() - Duration::hours(1),
    };
    let key = db.insert_api_key(key, 5).await.expect("Error inserting expired key");
    (key.id, secret)
}

#[tokio::test]
async fn issued_keys_validate() {
    let db = fresh_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let api = ApiKeyApi::new(db);
    let issued = api.issue(alice.id, "  reporting  ", &[Capability::Read], ExpiryDuration::OneDay).await.unwrap();
    assert!(issued.secret.starts_with("sk_live_"));
    assert_eq!(issued.label, "reporting");
    assert_eq!(issued.permissions, vec![Capability::Read]);
    let ttl = issued.expires_at - Utc::now();
    assert!(ttl > Duration::hours(23) && ttl <= Duration::hours(24));

    let key = api.validate(&issued.secret).await.unwrap().expect("key should be valid");
    assert_eq!(key.id, issued.id);
    assert_eq!(key.identity_id, alice.id);
    assert!(key.last_used_at.is_none());
    let listed = api.list(alice.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].last_used_at.is_some());
    assert_ne!(listed[0].key_hash, issued.secret);
}

#[tokio::test]
async fn issued_keys_validate_on_every_connection() {
    let db = fresh_db().await;
    let alice = identity(&db, "alice@example.com").await;
    // Open every pooled connection before the key exists, so each one has read the table already
    let mut conns = Vec::new();
    for _ in 0..5 {
        let mut conn = db.pool().acquire().await.unwrap();
        sqlx::query("SELECT COUNT(*) FROM api_keys").execute(&mut *conn).await.unwrap();
        conns.push(conn);
    }
    drop(conns);

    let api = ApiKeyApi::new(db.clone());
    let issued = api.issue(alice.id, "bot", &[Capability::Transfer], ExpiryDuration::OneDay).await.unwrap();
    let checks = join_all((0..10).map(|_| api.validate(&issued.secret))).await;
    for check in checks {
        let key = check.unwrap().expect("key should be valid on every connection");
        assert_eq!(key.id, issued.id);
    }

    let elsewhere = ApiKeyApi::new(SqliteDatabase::new_with_url(db.url(), 2).await.unwrap());
    let key = elsewhere.validate(&issued.secret).await.unwrap().expect("key should be valid in another pool");
    assert_eq!(key.identity_id, alice.id);
}

#[tokio::test]
async fn bad_secrets_do_not_validate() {
    let db = fresh_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let api = ApiKeyApi::new(db.clone());
    let issued = api.issue(alice.id, "bot", &[Capability::Read], ExpiryDuration::OneHour).await.unwrap();

    assert!(api.validate("sk_live_nope").await.unwrap().is_none());
    let unprefixed = issued.secret.trim_start_matches("sk_live_");
    assert!(api.validate(unprefixed).await.unwrap().is_none());

    api.revoke(alice.id, issued.id).await.unwrap();
    assert!(api.validate(&issued.secret).await.unwrap().is_none());
    // Revoking twice is harmless
    api.revoke(alice.id, issued.id).await.unwrap();

    let (_, expired_secret) = expired_key(&db, alice.id, vec![Capability::Read]).await;
    assert!(api.validate(&expired_secret).await.unwrap().is_none());
}

#[tokio::test]
async fn active_key_limit() {
    let db = fresh_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let bob = identity(&db, "bob@example.com").await;
    let api = ApiKeyApi::new(db);
    let mut ids = Vec::new();
    for i in 0..5 {
        let key = api.issue(alice.id, &format!("key {i}"), &[Capability::Read], ExpiryDuration::OneMonth).await.unwrap();
        ids.push(key.id);
    }
    let err = api.issue(alice.id, "one too many", &[Capability::Read], ExpiryDuration::OneMonth).await.unwrap_err();
    assert!(matches!(err, CredentialError::TooManyActiveKeys(5)));
    assert_eq!(err.to_string(), "Maximum 5 active API keys allowed");

    // Other identities have their own allowance
    api.issue(bob.id, "bob's", &[Capability::Transfer], ExpiryDuration::OneYear).await.unwrap();

    // Revoking frees a slot
    api.revoke(alice.id, ids[0]).await.unwrap();
    api.issue(alice.id, "replacement", &[Capability::Read], ExpiryDuration::OneMonth).await.unwrap();
}

#[tokio::test]
async fn custom_policy() {
    let db = fresh_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let api = ApiKeyApi::new(db).with_policy(ApiKeyPolicy { prefix: "sk_test_".into(), max_active_keys: 1 });
    let issued = api.issue(alice.id, "only", &Capability::all(), ExpiryDuration::OneDay).await.unwrap();
    assert!(issued.secret.starts_with("sk_test_"));
    assert!(api.validate(&issued.secret).await.unwrap().is_some());
    let err = api.issue(alice.id, "second", &[Capability::Read], ExpiryDuration::OneDay).await.unwrap_err();
    assert!(matches!(err, CredentialError::TooManyActiveKeys(1)));
}

#[tokio::test]
async fn issue_validation() {
    let db = fresh_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let api = ApiKeyApi::new(db);
    let err = api.issue(alice.id, "   ", &[Capability::Read], ExpiryDuration::OneDay).await.unwrap_err();
    assert!(matches!(err, CredentialError::ValidationFailure(_)));
    let err = api.issue(alice.id, "no perms", &[], ExpiryDuration::OneDay).await.unwrap_err();
    assert!(matches!(err, CredentialError::ValidationFailure(_)));
    let long = "x".repeat(101);
    let err = api.issue(alice.id, &long, &[Capability::Read], ExpiryDuration::OneDay).await.unwrap_err();
    assert!(matches!(err, CredentialError::ValidationFailure(_)));
    let key = api
        .issue(alice.id, "dupes", &[Capability::Transfer, Capability::Read, Capability::Transfer], ExpiryDuration::OneDay)
        .await
        .unwrap();
    assert_eq!(key.permissions.len(), 2);
}

#[tokio::test]
async fn rollover_requires_an_expired_key() {
    let db = fresh_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let api = ApiKeyApi::new(db);
    let live = api.issue(alice.id, "live", &[Capability::Read], ExpiryDuration::OneDay).await.unwrap();
    let err = api.rollover(alice.id, live.id, ExpiryDuration::OneDay).await.unwrap_err();
    assert!(matches!(err, CredentialError::KeyNotExpired(_)));
    assert_eq!(err.to_string(), "API key is not expired");
    let err = api.rollover(alice.id, 424242, ExpiryDuration::OneDay).await.unwrap_err();
    assert!(matches!(err, CredentialError::KeyNotFound(424242)));
}

#[tokio::test]
async fn rollover_replaces_expired_key() {
    let db = fresh_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let bob = identity(&db, "bob@example.com").await;
    let (old_id, old_secret) = expired_key(&db, alice.id, vec![Capability::Deposit, Capability::Transfer]).await;
    let api = ApiKeyApi::new(db.clone());

    let err = api.rollover(bob.id, old_id, ExpiryDuration::OneMonth).await.unwrap_err();
    assert!(matches!(err, CredentialError::KeyNotOwned(_)));

    let fresh = api.rollover(alice.id, old_id, ExpiryDuration::OneMonth).await.unwrap();
    assert_ne!(fresh.id, old_id);
    assert_eq!(fresh.label, "old bot (Rollover)");
    assert_eq!(fresh.permissions, vec![Capability::Deposit, Capability::Transfer]);
    assert!(api.validate(&fresh.secret).await.unwrap().is_some());
    assert!(api.validate(&old_secret).await.unwrap().is_none());
    let old = db.fetch_api_key(old_id).await.unwrap().unwrap();
    assert!(!old.active);

    // The old key has been replaced and cannot be rolled over again
    let err = api.rollover(alice.id, old_id, ExpiryDuration::OneMonth).await.unwrap_err();
    assert!(matches!(err, CredentialError::KeyInactive(_)));
}

#[tokio::test]
async fn revoke_checks_ownership() {
    let db = fresh_db().await;
    let alice = identity(&db, "alice@example.com").await;
    let bob = identity(&db, "bob@example.com").await;
    let api = ApiKeyApi::new(db);
    let key = api.issue(alice.id, "mine", &[Capability::Read], ExpiryDuration::OneDay).await.unwrap();
    let err = api.revoke(bob.id, key.id).await.unwrap_err();
    assert!(matches!(err, CredentialError::KeyNotOwned(_)));
    assert!(api.validate(&key.secret).await.unwrap().is_some());
    let err = api.revoke(alice.id, 999).await.unwrap_err();
    assert!(matches!(err, CredentialError::KeyNotFound(999)));
}
