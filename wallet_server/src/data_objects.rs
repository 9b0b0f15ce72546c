use std::fmt::Display;

use ledger_common::Amount;
use serde::{Deserialize, Serialize};
use wallet_engine::db_types::{Capability, Transaction, TransactionStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Amounts are in minor units (kobo for NGN).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRequest {
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub wallet_number: String,
    pub amount: Amount,
    /// Generated when absent.
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,
    pub permissions: Vec<Capability>,
    /// One of `1H`, `1D`, `1M`, `1Y`.
    pub expiry: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloverApiKeyRequest {
    pub expired_key_id: i64,
    pub expiry: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionStatusResponse {
    pub reference: String,
    pub status: TransactionStatus,
    pub amount: Amount,
}

impl From<Transaction> for TransactionStatusResponse {
    fn from(tx: Transaction) -> Self {
        Self { reference: tx.reference, status: tx.status, amount: tx.amount }
    }
}
