//! `SqliteDatabase` is a concrete implementation of a wallet engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the storage traits defined in the [`traits`]
//! module.
//!
//! [`traits`]: crate::traits
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{api_keys, identities, new_pool, transactions, wallets};
use crate::{
    db_types::{
        ApiKey,
        Identity,
        NewApiKey,
        NewIdentity,
        NewTransaction,
        Transaction,
        TransactionStatus,
        TransferLegs,
        Wallet,
    },
    traits::{
        CredentialError,
        CredentialManagement,
        IdentityError,
        IdentityManagement,
        LedgerError,
        TransactionLedger,
        WalletError,
        WalletManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool for {url}");
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Runs the embedded migrations against this database.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        debug!("🗃️ Migrations applied to {}", self.url);
        Ok(())
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&mut self) -> Result<(), sqlx::Error> {
        self.pool.close().await;
        Ok(())
    }
}

impl IdentityManagement for SqliteDatabase {
    async fn fetch_identity(&self, identity_id: i64) -> Result<Option<Identity>, IdentityError> {
        let mut conn = self.pool.acquire().await?;
        identities::fetch_identity(identity_id, &mut conn).await
    }

    async fn fetch_identity_by_subject(&self, subject: &str) -> Result<Option<Identity>, IdentityError> {
        let mut conn = self.pool.acquire().await?;
        identities::fetch_identity_by_subject(subject, &mut conn).await
    }

    async fn fetch_identity_by_email(&self, email: &str) -> Result<Option<Identity>, IdentityError> {
        let mut conn = self.pool.acquire().await?;
        identities::fetch_identity_by_email(email, &mut conn).await
    }

    async fn fetch_identity_by_wallet_number(&self, wallet_number: &str) -> Result<Option<Identity>, IdentityError> {
        let mut conn = self.pool.acquire().await?;
        identities::fetch_identity_by_wallet_number(wallet_number, &mut conn).await
    }

    async fn wallet_number_exists(&self, wallet_number: &str) -> Result<bool, IdentityError> {
        let mut conn = self.pool.acquire().await?;
        identities::wallet_number_exists(wallet_number, &mut conn).await
    }

    async fn insert_identity(&self, identity: NewIdentity, wallet_number: &str) -> Result<Identity, IdentityError> {
        let mut conn = self.pool.acquire().await?;
        let identity = identities::insert_identity(identity, wallet_number, &mut conn).await?;
        debug!("🗃️ Identity #{} ({}) saved with wallet number {}", identity.id, identity.email, identity.wallet_number);
        Ok(identity)
    }
}

impl WalletManagement for SqliteDatabase {
    async fn fetch_or_create_wallet(&self, identity_id: i64, currency: &str) -> Result<Wallet, WalletError> {
        let mut conn = self.pool.acquire().await?;
        wallets::fetch_or_create_wallet(identity_id, currency, &mut conn).await
    }

    async fn fetch_wallet_for_identity(&self, identity_id: i64) -> Result<Option<Wallet>, WalletError> {
        let mut conn = self.pool.acquire().await?;
        wallets::fetch_wallet_for_identity(identity_id, &mut conn).await
    }

    async fn fetch_wallet_by_number(&self, wallet_number: &str) -> Result<Option<Wallet>, WalletError> {
        let mut conn = self.pool.acquire().await?;
        wallets::fetch_wallet_by_number(wallet_number, &mut conn).await
    }

    /// The status compare-and-swap is the first statement, so it also takes the write lock. If it matches no row,
    /// the transaction is rolled back on drop and the balance is never read.
    async fn apply_credit(&self, tx: &Transaction, wallet_number: &str) -> Result<Option<Wallet>, WalletError> {
        let mut db_tx = self.pool.begin().await?;
        let now = Utc::now();
        if transactions::settle(tx.id, TransactionStatus::Success, now, &mut db_tx).await?.is_none() {
            debug!("🗃️ Transaction {} is no longer pending. Credit not applied", tx.reference);
            return Ok(None);
        }
        let wallet = wallets::credit_balance(wallet_number, tx.amount, now, &mut db_tx).await?;
        db_tx.commit().await?;
        debug!("🗃️ Wallet {wallet_number} credited with {} for {}", tx.amount, tx.reference);
        Ok(Some(wallet))
    }

    async fn apply_transfer(&self, legs: &TransferLegs) -> Result<(), WalletError> {
        let mut db_tx = self.pool.begin().await?;
        let now = Utc::now();
        let mut lock_order = [legs.sender_wallet.as_str(), legs.receiver_wallet.as_str()];
        lock_order.sort_unstable();
        for wallet_number in lock_order {
            if !wallets::lock_wallet(wallet_number, &mut db_tx).await? {
                return Err(WalletError::WalletNotFound(wallet_number.to_string()));
            }
        }
        trace!("🗃️ Locked wallets {} and {}", lock_order[0], lock_order[1]);
        let debited = wallets::debit_balance(&legs.sender_wallet, legs.amount, now, &mut db_tx).await?;
        if debited.is_none() {
            let balance = wallets::fetch_wallet_by_number(&legs.sender_wallet, &mut db_tx)
                .await?
                .map(|w| w.balance)
                .unwrap_or_default();
            return Err(WalletError::InsufficientBalance {
                wallet_number: legs.sender_wallet.clone(),
                balance,
                requested: legs.amount,
            });
        }
        wallets::credit_balance(&legs.receiver_wallet, legs.amount, now, &mut db_tx).await?;
        for leg in [&legs.debit, &legs.credit] {
            if transactions::settle(leg.id, TransactionStatus::Success, now, &mut db_tx).await?.is_none() {
                let status = transactions::fetch_by_id(leg.id, &mut db_tx).await?.map(|t| t.status).unwrap_or(leg.status);
                return Err(WalletError::TransactionAlreadySettled { reference: leg.reference.clone(), status });
            }
        }
        db_tx.commit().await?;
        debug!(
            "🗃️ Transfer {} committed. {} moved from {} to {}",
            legs.debit.reference, legs.amount, legs.sender_wallet, legs.receiver_wallet
        );
        Ok(())
    }
}

impl TransactionLedger for SqliteDatabase {
    async fn record_pending(&self, tx: NewTransaction) -> Result<Transaction, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let tx = transactions::insert_pending(tx, &mut conn).await?;
        debug!("🗃️ {} {} of {} recorded as pending", tx.tx_type, tx.reference, tx.amount);
        Ok(tx)
    }

    async fn record_pending_transfer(
        &self,
        debit: NewTransaction,
        credit: NewTransaction,
    ) -> Result<(Transaction, Transaction), LedgerError> {
        let mut db_tx = self.pool.begin().await?;
        let debit = transactions::insert_pending(debit, &mut db_tx).await?;
        let credit = transactions::insert_pending(credit, &mut db_tx).await?;
        db_tx.commit().await?;
        debug!("🗃️ Transfer legs {} and {} recorded as pending", debit.reference, credit.reference);
        Ok((debit, credit))
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Transaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_by_reference(reference, &mut conn).await
    }

    async fn find_by_external_reference(&self, external_reference: &str) -> Result<Option<Transaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_by_external_reference(external_reference, &mut conn).await
    }

    async fn mark_terminal(&self, tx: &Transaction, status: TransactionStatus) -> Result<Transaction, LedgerError> {
        if !status.is_terminal() {
            return Err(LedgerError::IllegalStatusTransition {
                reference: tx.reference.clone(),
                from: tx.status,
                to: status,
            });
        }
        let mut conn = self.pool.acquire().await?;
        match transactions::settle(tx.id, status, Utc::now(), &mut conn).await? {
            Some(updated) => {
                debug!("🗃️ Transaction {} marked {status}", updated.reference);
                Ok(updated)
            },
            None => {
                let current = transactions::fetch_by_id(tx.id, &mut conn)
                    .await?
                    .ok_or_else(|| LedgerError::TransactionNotFound(tx.reference.clone()))?;
                Err(LedgerError::IllegalStatusTransition {
                    reference: current.reference,
                    from: current.status,
                    to: status,
                })
            },
        }
    }

    async fn mark_transfer_failed(&self, debit: &Transaction, credit: &Transaction) -> Result<(), LedgerError> {
        let mut db_tx = self.pool.begin().await?;
        let now = Utc::now();
        for leg in [debit, credit] {
            if transactions::settle(leg.id, TransactionStatus::Failed, now, &mut db_tx).await?.is_none() {
                warn!("🗃️ Transfer leg {} was already settled when marking it failed", leg.reference);
            }
        }
        db_tx.commit().await?;
        debug!("🗃️ Transfer legs {} and {} marked failed", debit.reference, credit.reference);
        Ok(())
    }

    async fn list_for_identity(&self, identity_id: i64) -> Result<Vec<Transaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_for_identity(identity_id, &mut conn).await
    }

    async fn fetch_pending_deposits(&self) -> Result<Vec<Transaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_pending_deposits(&mut conn).await
    }
}

impl CredentialManagement for SqliteDatabase {
    async fn insert_api_key(&self, key: NewApiKey, max_active: usize) -> Result<ApiKey, CredentialError> {
        let mut conn = self.pool.acquire().await?;
        let identity_id = key.identity_id;
        let key = api_keys::insert_api_key(key, max_active, &mut conn)
            .await?
            .ok_or(CredentialError::TooManyActiveKeys(max_active))?;
        debug!("🗃️ API key #{} issued to identity #{identity_id}", key.id);
        Ok(key)
    }

    async fn replace_api_key(
        &self,
        old_key_id: i64,
        key: NewApiKey,
        max_active: usize,
    ) -> Result<ApiKey, CredentialError> {
        let mut db_tx = self.pool.begin().await?;
        if !api_keys::deactivate_api_key(old_key_id, &mut db_tx).await? {
            return Err(CredentialError::KeyInactive(old_key_id));
        }
        let key = api_keys::insert_api_key(key, max_active, &mut db_tx)
            .await?
            .ok_or(CredentialError::TooManyActiveKeys(max_active))?;
        db_tx.commit().await?;
        debug!("🗃️ API key #{old_key_id} replaced by #{}", key.id);
        Ok(key)
    }

    async fn fetch_api_key(&self, key_id: i64) -> Result<Option<ApiKey>, CredentialError> {
        let mut conn = self.pool.acquire().await?;
        api_keys::fetch_api_key(key_id, &mut conn).await
    }

    async fn fetch_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, CredentialError> {
        let mut conn = self.pool.acquire().await?;
        api_keys::fetch_api_key_by_hash(key_hash, &mut conn).await
    }

    async fn fetch_api_keys_for_identity(&self, identity_id: i64) -> Result<Vec<ApiKey>, CredentialError> {
        let mut conn = self.pool.acquire().await?;
        api_keys::fetch_api_keys_for_identity(identity_id, &mut conn).await
    }

    async fn deactivate_api_key(&self, key_id: i64) -> Result<bool, CredentialError> {
        let mut conn = self.pool.acquire().await?;
        api_keys::deactivate_api_key(key_id, &mut conn).await
    }

    async fn touch_api_key(&self, key_id: i64, used_at: DateTime<Utc>) -> Result<(), CredentialError> {
        let mut conn = self.pool.acquire().await?;
        api_keys::touch_api_key(key_id, used_at, &mut conn).await
    }
}
