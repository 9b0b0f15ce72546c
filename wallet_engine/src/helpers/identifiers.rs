use blake2::{digest::consts::U32, Blake2b, Digest};
use rand::{distributions::Alphanumeric, Rng};
use regex::Regex;

type Blake2b256 = Blake2b<U32>;

pub const WALLET_NUMBER_LENGTH: usize = 13;
/// Appended to a transfer's reference to form the reference of the receiver's credit leg.
pub const TRANSFER_CREDIT_SUFFIX: &str = "_R";
const API_KEY_SECRET_LENGTH: usize = 43;
const MAX_REFERENCE_LENGTH: usize = 100;

/// A random 13-digit wallet number. The leading digit is never zero.
pub fn generate_wallet_number() -> String {
    let mut rng = rand::thread_rng();
    let mut result = String::with_capacity(WALLET_NUMBER_LENGTH);
    result.push(char::from(b'0' + rng.gen_range(1..=9u8)));
    for _ in 1..WALLET_NUMBER_LENGTH {
        result.push(char::from(b'0' + rng.gen_range(0..=9u8)));
    }
    result
}

/// `tx_` followed by 16 lowercase hex digits.
pub fn generate_reference() -> String {
    format!("tx_{:016x}", rand::random::<u64>())
}

/// A fresh API key secret: the configured prefix followed by 43 alphanumeric characters from the thread-local CSPRNG.
pub fn generate_api_key_secret(prefix: &str) -> String {
    let body: String =
        rand::thread_rng().sample_iter(&Alphanumeric).take(API_KEY_SECRET_LENGTH).map(char::from).collect();
    format!("{prefix}{body}")
}

/// The stored, comparable form of an API key secret.
pub fn hash_api_key(secret: &str) -> String {
    hex::encode(Blake2b256::digest(secret.as_bytes()))
}

pub fn is_valid_wallet_number(s: &str) -> bool {
    s.len() == WALLET_NUMBER_LENGTH && s.bytes().all(|b| b.is_ascii_digit())
}

/// References come from callers and from the gateway, so only a conservative character set is allowed.
pub fn is_valid_reference(s: &str) -> bool {
    if s.is_empty() || s.len() > MAX_REFERENCE_LENGTH {
        return false;
    }
    match Regex::new(r"^[A-Za-z0-9_.\-]+$") {
        Ok(re) => re.is_match(s),
        Err(_) => false,
    }
}
