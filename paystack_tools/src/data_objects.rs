use ledger_common::Amount;
use serde::{Deserialize, Serialize};

/// The envelope around every Paystack response.
#[derive(Debug, Clone, Deserialize)]
pub struct PaystackResponse<T> {
    pub status: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitializeRequest {
    pub email: String,
    /// Minor units (kobo for NGN).
    pub amount: Amount,
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitializeData {
    pub authorization_url: String,
    #[serde(default)]
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyData {
    pub status: String,
    pub reference: String,
    #[serde(default)]
    pub amount: Amount,
}

impl VerifyData {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

pub const CHARGE_SUCCESS: &str = "charge.success";

/// A webhook body. Only `charge.success` events are parsed beyond the event name, so `data` stays loosely typed
/// until [`WebhookEvent::charge`] is called.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl WebhookEvent {
    pub fn is_charge_success(&self) -> bool {
        self.event == CHARGE_SUCCESS
    }

    pub fn charge(&self) -> Result<ChargeData, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChargeData {
    pub reference: String,
    pub amount: Amount,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer: Option<Customer>,
}

impl ChargeData {
    pub fn customer_email(&self) -> Option<&str> {
        self.customer.as_ref().and_then(|c| c.email.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    pub email: Option<String>,
}
