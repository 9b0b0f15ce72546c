//! A small client for the parts of the Paystack API the wallet uses.
//!
//! * [`PaystackApi`] initializes and verifies transactions over HTTPS.
//! * [`data_objects`] holds the request, response and webhook payload types.
//! * [`signature`] computes and checks the `x-paystack-signature` HMAC on webhook bodies.
mod api;
mod config;
mod error;

pub mod data_objects;
pub mod signature;

pub use api::PaystackApi;
pub use config::PaystackConfig;
pub use error::PaystackApiError;
