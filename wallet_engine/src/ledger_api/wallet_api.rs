//! The wallet balance engine.
//!
//! [`WalletApi`] is the only way balances change. It enforces the business rules (positive amounts, replay
//! protection, sufficient funds) and then hands the actual mutation to the backend as a single atomic unit.
//!
//! Deposits are idempotent on their reference: the first `credit` for a reference applies the amount, and every
//! later call with the same reference returns the already-settled transaction. Two concurrent first calls race on the
//! ledger's unique reference constraint and on the pending-to-success status swap; exactly one of them moves the
//! balance.
use std::fmt::Debug;

use ledger_common::{Amount, DEFAULT_CURRENCY_CODE};
use log::*;

use crate::{
    db_types::{Balance, NewTransaction, Transaction, TransactionStatus, TransactionType, TransferLegs, Wallet},
    helpers::{is_valid_reference, is_valid_wallet_number, TRANSFER_CREDIT_SUFFIX},
    traits::{LedgerBackend, LedgerError, WalletError},
};

pub struct WalletApi<B> {
    db: B,
    currency: String,
}

impl<B: Debug> Debug for WalletApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WalletApi ({:?}, {})", self.db, self.currency)
    }
}

impl<B: Clone> Clone for WalletApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), currency: self.currency.clone() }
    }
}

impl<B> WalletApi<B>
where B: LedgerBackend
{
    pub fn new(db: B) -> Self {
        Self { db, currency: DEFAULT_CURRENCY_CODE.to_string() }
    }

    /// Sets the currency that newly created wallets are denominated in.
    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn currency(&self) -> &str {
        self.currency.as_str()
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    /// Credits `amount` to the identity's wallet under `reference`.
    ///
    /// * A reference that has already been credited returns the settled transaction unchanged.
    /// * A pending transaction with this reference (e.g. one created when the deposit was initialized) is advanced.
    ///   Its recorded amount must match `amount`.
    /// * Otherwise a new pending deposit is recorded first.
    ///
    /// The balance increase and the move to `Success` happen in one atomic unit. If that unit fails, the transaction
    /// is marked `Failed`, the balance is untouched, and the error is returned.
    pub async fn credit(
        &self,
        identity_id: i64,
        amount: Amount,
        reference: &str,
        external_reference: Option<&str>,
    ) -> Result<Transaction, WalletError> {
        validate_amount(amount)?;
        validate_reference(reference)?;
        let wallet = self.db.fetch_or_create_wallet(identity_id, &self.currency).await?;
        let pending = match self.db.find_by_reference(reference).await? {
            Some(existing) => match check_replay(existing, identity_id, amount)? {
                Replay::Settled(tx) => return Ok(tx),
                Replay::Pending(tx) => tx,
            },
            None => {
                let mut new_tx = NewTransaction::deposit(identity_id, amount, reference);
                new_tx.external_reference = external_reference.map(String::from);
                match self.db.record_pending(new_tx).await {
                    Ok(tx) => tx,
                    Err(LedgerError::ReferenceAlreadyExists(_)) => {
                        debug!("💰️ Lost the race to record {reference}. Continuing with the winner's record");
                        let existing = self
                            .db
                            .find_by_reference(reference)
                            .await?
                            .ok_or_else(|| WalletError::TransactionNotFound(reference.to_string()))?;
                        match check_replay(existing, identity_id, amount)? {
                            Replay::Settled(tx) => return Ok(tx),
                            Replay::Pending(tx) => tx,
                        }
                    },
                    Err(e) => return Err(e.into()),
                }
            },
        };
        match self.db.apply_credit(&pending, &wallet.wallet_number).await {
            Ok(Some(wallet)) => {
                info!(
                    "💰️ {reference}: credited {amount} to wallet {}. Balance is now {}",
                    wallet.wallet_number, wallet.balance
                );
                self.settled_transaction(reference).await
            },
            Ok(None) => {
                let current = self.settled_transaction(reference).await?;
                match current.status {
                    TransactionStatus::Success => {
                        debug!("💰️ {reference} was settled by a concurrent caller. Nothing to do");
                        Ok(current)
                    },
                    status => Err(WalletError::TransactionAlreadySettled { reference: reference.to_string(), status }),
                }
            },
            Err(e) => {
                error!("💰️ {reference}: could not credit wallet {}. {e}", wallet.wallet_number);
                if let Err(mark_err) = self.db.mark_terminal(&pending, TransactionStatus::Failed).await {
                    error!("💰️ {reference}: could not mark the failed credit as failed. {mark_err}");
                }
                Err(e)
            },
        }
    }

    /// Moves `amount` from the sender's wallet to the wallet numbered `receiver_wallet_number`.
    ///
    /// Two pending legs are recorded: a debit under `reference` and a credit under `reference` + `_R`. Both balances
    /// and both legs then change in one atomic unit. If that unit fails, both legs are marked `Failed` and neither
    /// balance moves. Returns the sender's (debit) leg.
    pub async fn transfer(
        &self,
        sender_id: i64,
        receiver_wallet_number: &str,
        amount: Amount,
        reference: &str,
    ) -> Result<Transaction, WalletError> {
        validate_amount(amount)?;
        validate_reference(reference)?;
        if !is_valid_wallet_number(receiver_wallet_number) {
            return Err(WalletError::ValidationFailure(format!("{receiver_wallet_number} is not a wallet number")));
        }
        let sender = self.db.fetch_or_create_wallet(sender_id, &self.currency).await?;
        if sender.balance < amount {
            debug!("💰️ {reference}: wallet {} holds {}, cannot send {amount}", sender.wallet_number, sender.balance);
            return Err(WalletError::InsufficientBalance {
                wallet_number: sender.wallet_number,
                balance: sender.balance,
                requested: amount,
            });
        }
        let receiver = self.wallet_by_number(receiver_wallet_number).await?;
        if receiver.wallet_number == sender.wallet_number {
            return Err(WalletError::ValidationFailure("Cannot transfer to your own wallet".into()));
        }
        if receiver.currency != sender.currency {
            return Err(WalletError::ValidationFailure(format!(
                "Wallet {} holds {}, but wallet {} holds {}",
                sender.wallet_number, sender.currency, receiver.wallet_number, receiver.currency
            )));
        }
        let debit = NewTransaction::transfer(sender_id, -amount, reference).with_receiver(&receiver.wallet_number);
        let credit_reference = format!("{reference}{TRANSFER_CREDIT_SUFFIX}");
        let credit = NewTransaction::transfer(receiver.identity_id, amount, credit_reference)
            .with_sender(&sender.wallet_number);
        let (debit, credit) = self.db.record_pending_transfer(debit, credit).await?;
        let legs = TransferLegs {
            debit,
            credit,
            sender_wallet: sender.wallet_number,
            receiver_wallet: receiver.wallet_number,
            amount,
        };
        match self.db.apply_transfer(&legs).await {
            Ok(()) => {
                info!(
                    "💰️ {reference}: transferred {amount} from wallet {} to wallet {}",
                    legs.sender_wallet, legs.receiver_wallet
                );
                self.settled_transaction(reference).await
            },
            Err(e) => {
                warn!("💰️ {reference}: transfer failed and will be marked as such. {e}");
                if let Err(mark_err) = self.db.mark_transfer_failed(&legs.debit, &legs.credit).await {
                    error!("💰️ {reference}: could not mark the transfer legs as failed. {mark_err}");
                }
                Err(e)
            },
        }
    }

    /// The identity's balance. The wallet is created on first access.
    pub async fn balance_of(&self, identity_id: i64) -> Result<Balance, WalletError> {
        let wallet = self.db.fetch_or_create_wallet(identity_id, &self.currency).await?;
        Ok(Balance::from(wallet))
    }

    /// Resolves a wallet by its number. If the number belongs to an identity whose wallet has not been provisioned
    /// yet, the wallet is created.
    pub async fn wallet_by_number(&self, wallet_number: &str) -> Result<Wallet, WalletError> {
        if let Some(wallet) = self.db.fetch_wallet_by_number(wallet_number).await? {
            return Ok(wallet);
        }
        let identity = self
            .db
            .fetch_identity_by_wallet_number(wallet_number)
            .await?
            .ok_or_else(|| WalletError::WalletNotFound(wallet_number.to_string()))?;
        self.db.fetch_or_create_wallet(identity.id, &self.currency).await
    }

    /// The identity's transactions, newest first.
    pub async fn list_transactions(&self, identity_id: i64) -> Result<Vec<Transaction>, WalletError> {
        let txs = self.db.list_for_identity(identity_id).await?;
        trace!("💰️ {} transactions for identity #{identity_id}", txs.len());
        Ok(txs)
    }

    /// Returns the transaction, provided it belongs to `requester`. Foreign references look exactly like unknown
    /// ones.
    pub async fn transaction_status(&self, reference: &str, requester: i64) -> Result<Transaction, WalletError> {
        match self.db.find_by_reference(reference).await? {
            Some(tx) if tx.identity_id == requester => Ok(tx),
            Some(_) => {
                warn!("💰️ Identity #{requester} asked for transaction {reference}, which belongs to someone else");
                Err(WalletError::TransactionNotFound(reference.to_string()))
            },
            None => Err(WalletError::TransactionNotFound(reference.to_string())),
        }
    }

    async fn settled_transaction(&self, reference: &str) -> Result<Transaction, WalletError> {
        self.db
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| WalletError::InternalInconsistency(format!("Transaction {reference} vanished")))
    }
}

enum Replay {
    Settled(Transaction),
    Pending(Transaction),
}

fn check_replay(existing: Transaction, identity_id: i64, amount: Amount) -> Result<Replay, WalletError> {
    if existing.tx_type != TransactionType::Deposit || existing.identity_id != identity_id {
        warn!("💰️ Reference {} is already used by another transaction", existing.reference);
        return Err(WalletError::DuplicateReference(existing.reference));
    }
    match existing.status {
        TransactionStatus::Success => {
            debug!("💰️ {} has already been credited. Nothing to do", existing.reference);
            Ok(Replay::Settled(existing))
        },
        TransactionStatus::Failed => {
            warn!("💰️ {} previously failed and cannot be credited again", existing.reference);
            Err(WalletError::TransactionAlreadySettled { reference: existing.reference, status: existing.status })
        },
        TransactionStatus::Pending if existing.amount != amount => Err(WalletError::ValidationFailure(format!(
            "Deposit {} was recorded for {}, but {amount} was confirmed",
            existing.reference, existing.amount
        ))),
        TransactionStatus::Pending => Ok(Replay::Pending(existing)),
    }
}

pub(crate) fn validate_amount(amount: Amount) -> Result<(), WalletError> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(WalletError::ValidationFailure(format!("Amount must be positive, got {amount}")))
    }
}

fn validate_reference(reference: &str) -> Result<(), WalletError> {
    if is_valid_reference(reference) {
        Ok(())
    } else {
        Err(WalletError::ValidationFailure(format!("'{reference}' is not a valid transaction reference")))
    }
}
