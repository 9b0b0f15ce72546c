//! Wallet Engine
//!
//! The wallet engine is the ledger core of a custodial wallet service. It keeps one wallet per identity, records
//! every balance change as a transaction with a unique reference, and issues scoped API keys that let programs act on
//! a user's behalf.
//!
//! The library is divided into two main sections:
//! 1. Storage ([`mod@traits`] and [`mod@sqlite`]). The traits describe what a backend must provide, and SQLite is the
//!    supported backend. You should never need to touch the database directly. The data types used in the database
//!    live in [`mod@db_types`] and are public.
//! 2. The public API. [`WalletApi`] is the balance engine, [`DepositFlowApi`] drives deposits through an external
//!    payment gateway, [`ApiKeyApi`] manages credentials and [`IdentityApi`] resolves the people who own wallets.
//!    Access decisions are made by [`evaluate`] against a [`Principal`].
pub mod db_types;
pub mod helpers;
pub mod traits;

mod ledger_api;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use ledger_api::{
    access::{evaluate, Principal},
    api_key_api::{ApiKeyApi, ApiKeyPolicy},
    deposit_flow_api::{ChargeNotification, DepositFlowApi, DepositStarted, ReconcileResult},
    identity_api::IdentityApi,
    wallet_api::WalletApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
