#![allow(dead_code)]
use wallet_engine::{
    db_types::NewIdentity,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    IdentityApi,
    SqliteDatabase,
};

/// A freshly migrated database in the temp directory.
pub async fn fresh_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

pub async fn identity(db: &SqliteDatabase, email: &str) -> wallet_engine::db_types::Identity {
    IdentityApi::new(db.clone()).find_or_create(NewIdentity::new(email)).await.expect("Error creating identity")
}
