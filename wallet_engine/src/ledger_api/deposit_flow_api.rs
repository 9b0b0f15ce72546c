//! Deposits: from gateway initialization, through webhook confirmation, to reconciliation.
//!
//! Network calls to the gateway are always made before or after the ledger's atomic units, never inside them.
use std::fmt::Debug;

use chrono::{Duration, Utc};
use ledger_common::Amount;
use log::*;
use serde::Serialize;

use crate::{
    db_types::{NewTransaction, Transaction, TransactionStatus, TransactionType},
    helpers::generate_reference,
    ledger_api::wallet_api::{validate_amount, WalletApi},
    traits::{DepositGateway, LedgerBackend, WalletError},
};

/// The result of starting a deposit: where to send the customer, and the reference to track it by.
#[derive(Debug, Clone, Serialize)]
pub struct DepositStarted {
    pub reference: String,
    pub authorization_url: String,
    pub amount: Amount,
}

/// A `charge.success` notification from the gateway, after its signature has been verified.
#[derive(Debug, Clone)]
pub struct ChargeNotification {
    pub reference: String,
    pub amount: Amount,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileResult {
    pub credited: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ReconcileResult {
    pub fn total(&self) -> usize {
        self.credited + self.failed + self.skipped
    }
}

pub struct DepositFlowApi<B, G> {
    wallets: WalletApi<B>,
    gateway: G,
}

impl<B: Debug, G> Debug for DepositFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DepositFlowApi ({:?})", self.wallets)
    }
}

impl<B: Clone, G: Clone> Clone for DepositFlowApi<B, G> {
    fn clone(&self) -> Self {
        Self { wallets: self.wallets.clone(), gateway: self.gateway.clone() }
    }
}

impl<B, G> DepositFlowApi<B, G>
where
    B: LedgerBackend,
    G: DepositGateway,
{
    pub fn new(db: B, gateway: G) -> Self {
        Self { wallets: WalletApi::new(db), gateway }
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.wallets = self.wallets.with_currency(currency);
        self
    }

    pub fn wallets(&self) -> &WalletApi<B> {
        &self.wallets
    }

    /// Asks the gateway to start a deposit, then records it as pending.
    ///
    /// Nothing is recorded if the gateway call fails. The gateway echoes our reference back, so the ledger reference
    /// and the external reference are the same string. Should a gateway ever return a different one, it is kept as
    /// the external reference so webhooks still resolve.
    pub async fn initialize_deposit(&self, identity_id: i64, amount: Amount) -> Result<DepositStarted, WalletError> {
        validate_amount(amount)?;
        let db = self.wallets.db();
        let identity = db.fetch_identity(identity_id).await?.ok_or(WalletError::IdentityNotFound(identity_id))?;
        let reference = generate_reference();
        let intent = self.gateway.initialize_deposit(&identity.email, amount, &reference).await.map_err(|e| {
            warn!("💰️ Gateway refused to initialize deposit {reference} for identity #{identity_id}. {e}");
            WalletError::from(e)
        })?;
        if intent.reference != reference {
            warn!("💰️ Gateway replaced reference {reference} with {}", intent.reference);
        }
        db.fetch_or_create_wallet(identity_id, self.wallets.currency()).await?;
        let pending = NewTransaction::deposit(identity_id, amount, &reference).with_external_reference(&intent.reference);
        db.record_pending(pending).await?;
        info!("💰️ Deposit {reference} of {amount} initialized for identity #{identity_id}");
        Ok(DepositStarted { reference, authorization_url: intent.authorization_url, amount })
    }

    /// Handles a verified `charge.success` event.
    ///
    /// The reference is resolved against the ledger first (as our reference, then as an external reference). If the
    /// deposit was never initialized here, the customer email is used to find the identity. Events that resolve to
    /// nobody are logged and dropped: `Ok(None)`.
    pub async fn process_charge_success(
        &self,
        charge: ChargeNotification,
    ) -> Result<Option<Transaction>, WalletError> {
        let db = self.wallets.db();
        let known = match db.find_by_reference(&charge.reference).await? {
            Some(tx) => Some(tx),
            None => db.find_by_external_reference(&charge.reference).await?,
        };
        let tx = match known {
            Some(tx) if tx.tx_type != TransactionType::Deposit => {
                warn!("💰️ Charge {} matches transfer {}. Ignoring it", charge.reference, tx.reference);
                return Ok(None);
            },
            Some(tx) => {
                let external = tx.external_reference.as_deref().unwrap_or(&charge.reference);
                self.wallets.credit(tx.identity_id, charge.amount, &tx.reference, Some(external)).await?
            },
            None => {
                let identity = match &charge.email {
                    Some(email) => db.fetch_identity_by_email(email).await?,
                    None => None,
                };
                let Some(identity) = identity else {
                    warn!("💰️ Charge {} matches no deposit and no customer. Ignoring it", charge.reference);
                    return Ok(None);
                };
                debug!("💰️ Charge {} was not initialized here. Crediting identity #{}", charge.reference, identity.id);
                self.wallets.credit(identity.id, charge.amount, &charge.reference, Some(&charge.reference)).await?
            },
        };
        Ok(Some(tx))
    }

    /// Manual recovery for a deposit whose webhook never arrived. Asks the gateway and credits the deposit if it
    /// reports success. Settled deposits are returned as they are.
    ///
    /// The amount the gateway collected goes through the same check as a webhook's: if it differs from the recorded
    /// amount, the deposit stays pending and `ValidationFailure` is returned.
    pub async fn verify_deposit(&self, reference: &str, requester: i64) -> Result<Transaction, WalletError> {
        let tx = self.wallets.transaction_status(reference, requester).await?;
        if tx.tx_type != TransactionType::Deposit {
            return Err(WalletError::ValidationFailure(format!("{reference} is not a deposit")));
        }
        if tx.status.is_terminal() {
            return Ok(tx);
        }
        let external = tx.external_reference.clone().unwrap_or_else(|| tx.reference.clone());
        match self.gateway.verify_deposit(&external).await? {
            Some(collected) => {
                info!("💰️ Gateway confirms {collected} for deposit {reference}. Crediting it");
                self.wallets.credit(tx.identity_id, collected, &tx.reference, Some(&external)).await
            },
            None => {
                debug!("💰️ Gateway does not report deposit {reference} as successful yet");
                Ok(tx)
            },
        }
    }

    /// Settles pending deposits that the webhook has not.
    ///
    /// Deposits younger than `min_age` are left for the webhook. Older ones are checked with the gateway: confirmed
    /// deposits are credited with the amount the gateway collected; unconfirmed deposits older than `abandon_after` are
    /// marked failed. A confirmation for a different amount than was recorded is never credited, and is treated like
    /// an unconfirmed deposit. Gateway errors leave the deposit pending for the next round.
    pub async fn reconcile_pending(
        &self,
        min_age: Duration,
        abandon_after: Duration,
    ) -> Result<ReconcileResult, WalletError> {
        let db = self.wallets.db();
        let pending = db.fetch_pending_deposits().await?;
        let now = Utc::now();
        let mut result = ReconcileResult::default();
        for tx in pending {
            let age = now - tx.created_at;
            if age < min_age {
                continue;
            }
            let external = tx.external_reference.clone().unwrap_or_else(|| tx.reference.clone());
            let collected = match self.gateway.verify_deposit(&external).await {
                Ok(collected) => collected,
                Err(e) => {
                    warn!("💰️ Could not verify deposit {} with the gateway. {e}", tx.reference);
                    result.skipped += 1;
                    continue;
                },
            };
            match collected {
                Some(amount) if amount == tx.amount => {
                    match self.wallets.credit(tx.identity_id, amount, &tx.reference, Some(&external)).await {
                        Ok(_) => result.credited += 1,
                        Err(e) => {
                            error!("💰️ Could not credit confirmed deposit {}. {e}", tx.reference);
                            result.skipped += 1;
                        },
                    }
                    continue;
                },
                Some(amount) => {
                    error!(
                        "💰️ Gateway collected {amount} for deposit {}, which was recorded for {}. Not crediting it",
                        tx.reference, tx.amount
                    );
                },
                None => {},
            }
            if age < abandon_after {
                result.skipped += 1;
                continue;
            }
            match db.mark_terminal(&tx, TransactionStatus::Failed).await {
                Ok(_) => {
                    info!("💰️ Deposit {} abandoned after {} hours", tx.reference, age.num_hours());
                    result.failed += 1;
                },
                Err(e) => {
                    warn!("💰️ Could not mark deposit {} as failed. {e}", tx.reference);
                    result.skipped += 1;
                },
            }
        }
        Ok(result)
    }
}
