//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interaction are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool,
//! or create an atomic transaction as the need arises and call through to the functions without any other changes.
//!
//! SQLite has a single writer. An atomic unit that starts with a write takes the write lock immediately, and other
//! writers queue behind it for up to [`BUSY_TIMEOUT`]. Functions that are meant to open an atomic unit are therefore
//! written so that their first statement is a write.
//!
//! The pool uses the rollback journal rather than WAL. Every connection in the pool must see a write as soon as it is
//! committed, since keys, pending deposits and balances are read back on whichever connection comes next.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod api_keys;
pub mod identities;
pub mod transactions;
pub mod wallets;

const SQLITE_DB_URL: &str = "sqlite://data/wallet_ledger.db";
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

pub fn db_url() -> String {
    let result = env::var("WALLET_DATABASE_URL").unwrap_or_else(|_| {
        info!("WALLET_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
