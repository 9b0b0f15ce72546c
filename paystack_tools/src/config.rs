use log::*;
use ledger_common::Secret;

pub const DEFAULT_PAYSTACK_BASE_URL: &str = "https://api.paystack.co";

#[derive(Debug, Clone, Default)]
pub struct PaystackConfig {
    /// API root, without a trailing slash.
    pub base_url: String,
    pub secret_key: Secret<String>,
    /// Where Paystack sends the customer after checkout. Paystack uses the dashboard setting when this is `None`.
    pub callback_url: Option<String>,
}

impl PaystackConfig {
    pub fn new<S: Into<String>>(base_url: S, secret_key: Secret<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, secret_key, callback_url: None }
    }

    pub fn with_callback_url<S: Into<String>>(mut self, callback_url: S) -> Self {
        self.callback_url = Some(callback_url.into());
        self
    }

    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("WALLET_PAYSTACK_BASE_URL").unwrap_or_else(|_| {
            info!("🪛️ WALLET_PAYSTACK_BASE_URL not set, using {DEFAULT_PAYSTACK_BASE_URL}");
            DEFAULT_PAYSTACK_BASE_URL.to_string()
        });
        let secret_key = Secret::new(std::env::var("WALLET_PAYSTACK_SECRET_KEY").unwrap_or_else(|_| {
            error!("🪛️ WALLET_PAYSTACK_SECRET_KEY not set. Deposits will fail until it is configured.");
            String::default()
        }));
        let callback_url = std::env::var("WALLET_PAYSTACK_CALLBACK_URL").ok().filter(|s| !s.trim().is_empty());
        Self { callback_url, ..Self::new(base_url, secret_key) }
    }
}
