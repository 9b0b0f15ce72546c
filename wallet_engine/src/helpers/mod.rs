//! Generators and validators for the identifiers the ledger hands out: wallet numbers, transaction references and
//! API key secrets.
mod identifiers;

pub use identifiers::{
    generate_api_key_secret,
    generate_reference,
    generate_wallet_number,
    hash_api_key,
    is_valid_reference,
    is_valid_wallet_number,
    TRANSFER_CREDIT_SUFFIX,
    WALLET_NUMBER_LENGTH,
};
