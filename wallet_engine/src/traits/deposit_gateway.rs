use ledger_common::Amount;
use thiserror::Error;

/// What the payment gateway returns when a deposit is initialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositIntent {
    /// The gateway's reference for the deposit. The engine only issues references that the gateway echoes back
    /// unchanged, so this is also the ledger reference.
    pub reference: String,
    /// Where the customer must be sent to complete payment.
    pub authorization_url: String,
}

/// The engine's view of an external payment gateway.
///
/// Implementations make network calls. The engine never calls them while holding a database transaction.
#[allow(async_fn_in_trait)]
pub trait DepositGateway: Clone {
    async fn initialize_deposit(
        &self,
        email: &str,
        amount: Amount,
        reference: &str,
    ) -> Result<DepositIntent, GatewayError>;

    /// `Ok(Some(amount))` if the gateway reports the charge as successful, carrying the amount it actually collected.
    /// `Ok(None)` for any other definite answer.
    async fn verify_deposit(&self, reference: &str) -> Result<Option<Amount>, GatewayError>;
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The payment gateway could not be reached. {0}")]
    Unreachable(String),
    #[error("The payment gateway rejected the request. {0}")]
    Rejected(String),
    #[error("The payment gateway returned an unexpected response. {0}")]
    UnexpectedResponse(String),
}
