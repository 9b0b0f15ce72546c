//! #  Ledger storage contracts
//!
//! This module defines what a database *backend* must provide for the wallet engine. The engine's public APIs
//! (see [`crate::WalletApi`] and friends) are generic over these traits, and contain all the business rules; the
//! backends are responsible for persistence and, crucially, for making the multi-row updates atomic.
//!
//! ## Traits
//! * [`IdentityManagement`] stores wallet-owning identities.
//! * [`WalletManagement`] owns wallet rows and applies balance changes as atomic units that also settle the ledger
//!   rows they belong to.
//! * [`TransactionLedger`] appends and queries transaction records keyed by a unique reference.
//! * [`CredentialManagement`] stores scoped API keys.
//! * [`DepositGateway`] is not a storage trait. It is the engine's view of the external payment gateway.
mod credential_management;
mod deposit_gateway;
mod identity_management;
mod transaction_ledger;
mod wallet_management;

pub use credential_management::{CredentialError, CredentialManagement};
pub use deposit_gateway::{DepositGateway, DepositIntent, GatewayError};
pub use identity_management::{IdentityError, IdentityManagement};
pub use transaction_ledger::{LedgerError, TransactionLedger};
pub use wallet_management::{WalletError, WalletManagement};

/// Everything the balance engine needs from a backend.
pub trait LedgerBackend: WalletManagement + TransactionLedger + IdentityManagement {}

impl<T> LedgerBackend for T where T: WalletManagement + TransactionLedger + IdentityManagement {}
