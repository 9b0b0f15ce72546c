use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
pub use ledger_common::Amount;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, Row, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------       Identity        ---------------------------------------------------------
/// A wallet-owning user, as resolved from the external identity provider.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Identity {
    pub id: i64,
    /// The identity provider's subject id. Optional, since some identities are only known by email.
    pub subject: Option<String>,
    pub email: String,
    pub name: Option<String>,
    /// The wallet number assigned when the identity was first seen. It never changes and is never reused.
    pub wallet_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewIdentity {
    pub subject: Option<String>,
    pub email: String,
    pub name: Option<String>,
}

impl NewIdentity {
    pub fn new<S: Into<String>>(email: S) -> Self {
        Self { email: email.into(), ..Default::default() }
    }

    pub fn with_subject<S: Into<String>>(mut self, subject: S) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }
}

//--------------------------------------        Wallet         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Wallet {
    pub id: i64,
    pub identity_id: i64,
    pub wallet_number: String,
    pub balance: Amount,
    pub currency: String,
    pub active: bool,
    pub last_transaction_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub wallet_number: String,
    pub balance: Amount,
    pub currency: String,
}

impl From<Wallet> for Balance {
    fn from(wallet: Wallet) -> Self {
        Self { wallet_number: wallet.wallet_number, balance: wallet.balance, currency: wallet.currency }
    }
}

impl Display for Balance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.balance, self.currency)
    }
}

//--------------------------------------   TransactionType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TransactionType {
    Deposit,
    Transfer,
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Deposit => write!(f, "Deposit"),
            TransactionType::Transfer => write!(f, "Transfer"),
        }
    }
}

impl FromStr for TransactionType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Deposit" => Ok(Self::Deposit),
            "Transfer" => Ok(Self::Transfer),
            s => Err(ConversionError(format!("Invalid transaction type: {s}"))),
        }
    }
}

//--------------------------------------  TransactionStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// The transaction has been recorded, but its balance effect has not been applied yet.
    Pending,
    /// Terminal. The balance effect has been applied.
    Success,
    /// Terminal. The balance was never touched.
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "Pending"),
            TransactionStatus::Success => write!(f, "Success"),
            TransactionStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Success" => Ok(Self::Success),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid transaction status: {s}"))),
        }
    }
}

//--------------------------------------      Transaction      ---------------------------------------------------------
/// A single monetary movement against one identity's wallet. The amount is signed: debits are negative.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub reference: String,
    pub identity_id: i64,
    pub tx_type: TransactionType,
    pub amount: Amount,
    pub status: TransactionStatus,
    pub sender_wallet_number: Option<String>,
    pub receiver_wallet_number: Option<String>,
    pub external_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub tx_type: TransactionType,
    pub identity_id: i64,
    pub amount: Amount,
    pub reference: String,
    pub external_reference: Option<String>,
    pub sender_wallet_number: Option<String>,
    pub receiver_wallet_number: Option<String>,
}

impl NewTransaction {
    pub fn deposit<S: Into<String>>(identity_id: i64, amount: Amount, reference: S) -> Self {
        Self {
            tx_type: TransactionType::Deposit,
            identity_id,
            amount,
            reference: reference.into(),
            external_reference: None,
            sender_wallet_number: None,
            receiver_wallet_number: None,
        }
    }

    pub fn transfer<S: Into<String>>(identity_id: i64, amount: Amount, reference: S) -> Self {
        Self { tx_type: TransactionType::Transfer, ..Self::deposit(identity_id, amount, reference) }
    }

    pub fn with_external_reference<S: Into<String>>(mut self, external_reference: S) -> Self {
        self.external_reference = Some(external_reference.into());
        self
    }

    pub fn with_sender<S: Into<String>>(mut self, wallet_number: S) -> Self {
        self.sender_wallet_number = Some(wallet_number.into());
        self
    }

    pub fn with_receiver<S: Into<String>>(mut self, wallet_number: S) -> Self {
        self.receiver_wallet_number = Some(wallet_number.into());
        self
    }
}

/// The two ledger rows of a transfer, plus the wallets they move funds between.
#[derive(Debug, Clone)]
pub struct TransferLegs {
    pub debit: Transaction,
    pub credit: Transaction,
    pub sender_wallet: String,
    pub receiver_wallet: String,
    pub amount: Amount,
}

//--------------------------------------      Capability       ---------------------------------------------------------
/// The operations a principal can be granted. Full-trust principals implicitly hold all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    #[serde(alias = "READ")]
    Read,
    #[serde(alias = "DEPOSIT")]
    Deposit,
    #[serde(alias = "TRANSFER")]
    Transfer,
}

impl Capability {
    pub fn all() -> Vec<Capability> {
        vec![Capability::Read, Capability::Deposit, Capability::Transfer]
    }
}

impl Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Read => write!(f, "read"),
            Capability::Deposit => write!(f, "deposit"),
            Capability::Transfer => write!(f, "transfer"),
        }
    }
}

impl FromStr for Capability {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "deposit" => Ok(Self::Deposit),
            "transfer" => Ok(Self::Transfer),
            _ => Err(ConversionError(format!("Invalid capability: {s}"))),
        }
    }
}

/// Sorts and de-duplicates a permission set.
pub fn normalize_permissions(permissions: &[Capability]) -> Vec<Capability> {
    let mut result = permissions.to_vec();
    result.sort();
    result.dedup();
    result
}

pub fn permissions_to_string(permissions: &[Capability]) -> String {
    normalize_permissions(permissions).iter().map(|p| p.to_string()).collect::<Vec<String>>().join(",")
}

pub fn permissions_from_str(s: &str) -> Result<Vec<Capability>, ConversionError> {
    let permissions = s
        .split(',')
        .filter(|p| !p.trim().is_empty())
        .map(Capability::from_str)
        .collect::<Result<Vec<Capability>, ConversionError>>()?;
    Ok(normalize_permissions(&permissions))
}

//--------------------------------------    ExpiryDuration     ---------------------------------------------------------
/// The fixed set of lifetimes an API key can be issued with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryDuration {
    OneHour,
    OneDay,
    OneMonth,
    OneYear,
}

impl ExpiryDuration {
    pub fn code(&self) -> &'static str {
        match self {
            ExpiryDuration::OneHour => "1H",
            ExpiryDuration::OneDay => "1D",
            ExpiryDuration::OneMonth => "1M",
            ExpiryDuration::OneYear => "1Y",
        }
    }

    pub fn hours(&self) -> i64 {
        match self {
            ExpiryDuration::OneHour => 1,
            ExpiryDuration::OneDay => 24,
            ExpiryDuration::OneMonth => 720,
            ExpiryDuration::OneYear => 8760,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::hours(self.hours())
    }
}

impl Display for ExpiryDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ExpiryDuration {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1H" => Ok(Self::OneHour),
            "1D" => Ok(Self::OneDay),
            "1M" => Ok(Self::OneMonth),
            "1Y" => Ok(Self::OneYear),
            s => Err(ConversionError(format!("Invalid expiry code: {s}"))),
        }
    }
}

//--------------------------------------        ApiKey         ---------------------------------------------------------
/// A scoped credential. Only the digest of the secret is kept; the plaintext is handed out once, at issuance.
#[derive(Debug, Clone, Serialize)]
pub struct ApiKey {
    pub id: i64,
    #[serde(skip_serializing)]
    pub key_hash: String,
    pub identity_id: i64,
    pub label: String,
    pub permissions: Vec<Capability>,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApiKey {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.is_expired_at(now)
    }
}

impl<'r> FromRow<'r, SqliteRow> for ApiKey {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let permissions: String = row.try_get("permissions")?;
        let permissions = permissions_from_str(&permissions)
            .map_err(|e| sqlx::Error::ColumnDecode { index: "permissions".into(), source: Box::new(e) })?;
        Ok(Self {
            id: row.try_get("id")?,
            key_hash: row.try_get("key_hash")?,
            identity_id: row.try_get("identity_id")?,
            label: row.try_get("label")?,
            permissions,
            expires_at: row.try_get("expires_at")?,
            active: row.try_get("active")?,
            last_used_at: row.try_get("last_used_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub identity_id: i64,
    pub label: String,
    pub key_hash: String,
    pub permissions: Vec<Capability>,
    pub expires_at: DateTime<Utc>,
}

/// Returned exactly once, when a key is issued or rolled over. This is the only place the plaintext secret appears.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedApiKey {
    pub id: i64,
    pub secret: String,
    pub label: String,
    pub permissions: Vec<Capability>,
    pub expires_at: DateTime<Utc>,
}
