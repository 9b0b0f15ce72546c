//! # Wallet server
//! The HTTP boundary of the wallet ledger. It is responsible for:
//! * Turning request credentials (a session token or an API key) into a [`wallet_engine::Principal`].
//! * Checking that principal against each route's required capability before the engine is called.
//! * Receiving Paystack webhooks, checking their signatures and crediting wallets.
//! * Periodically reconciling deposits whose webhook never arrived.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/wallet/paystack/webhook`: Paystack event intake.
//! * `/wallet/...`: deposits, balance, transfers and history.
//! * `/keys/...`: API key management. Session tokens only.
pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod middleware;
pub mod reconcile_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
