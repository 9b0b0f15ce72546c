//! Binds the Paystack client to the engine's [`DepositGateway`] seam, and turns webhook payloads into charge
//! notifications the deposit flow understands.
use ledger_common::Amount;
use log::*;
use paystack_tools::{data_objects::WebhookEvent, PaystackApi, PaystackApiError};
use wallet_engine::{
    traits::{DepositGateway, DepositIntent, GatewayError},
    ChargeNotification,
};

#[derive(Debug, Clone)]
pub struct PaystackGateway {
    api: PaystackApi,
}

impl PaystackGateway {
    pub fn new(api: PaystackApi) -> Self {
        Self { api }
    }
}

pub fn gateway_error(e: PaystackApiError) -> GatewayError {
    match e {
        PaystackApiError::RestRequestError(s) => GatewayError::Unreachable(s),
        PaystackApiError::QueryError { .. } | PaystackApiError::Declined(_) => GatewayError::Rejected(e.to_string()),
        PaystackApiError::Initialization(_) |
        PaystackApiError::RestResponseError(_) |
        PaystackApiError::JsonError(_) => GatewayError::UnexpectedResponse(e.to_string()),
    }
}

impl DepositGateway for PaystackGateway {
    async fn initialize_deposit(
        &self,
        email: &str,
        amount: Amount,
        reference: &str,
    ) -> Result<DepositIntent, GatewayError> {
        let data = self.api.initialize_transaction(email, amount, reference).await.map_err(gateway_error)?;
        Ok(DepositIntent { reference: data.reference, authorization_url: data.authorization_url })
    }

    async fn verify_deposit(&self, reference: &str) -> Result<Option<Amount>, GatewayError> {
        let data = self.api.verify_transaction(reference).await.map_err(gateway_error)?;
        Ok(data.is_success().then_some(data.amount))
    }
}

/// Extracts a charge notification from a verified webhook event.
///
/// Returns `None` for every event other than `charge.success`, and for `charge.success` events whose payload cannot
/// be read.
pub fn charge_notification(event: &WebhookEvent) -> Option<ChargeNotification> {
    if !event.is_charge_success() {
        debug!("🔐️ Ignoring '{}' webhook event", event.event);
        return None;
    }
    match event.charge() {
        Ok(charge) => Some(ChargeNotification {
            email: charge.customer_email().map(String::from),
            reference: charge.reference,
            amount: charge.amount,
        }),
        Err(e) => {
            warn!("🔐️ charge.success event has an unreadable payload. {e}");
            None
        },
    }
}
