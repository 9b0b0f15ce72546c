//! Webhook signatures.
//!
//! Paystack signs every webhook body with HMAC-SHA512, keyed with the account's secret key, and sends the lowercase
//! hex digest in the `x-paystack-signature` header. The signature covers the raw bytes, so it must be checked before
//! the body is parsed.
use hmac::{digest::InvalidLength, Hmac, Mac};
use sha2::Sha512;

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

type HmacSha512 = Hmac<Sha512>;

/// The lowercase hex signature Paystack would send for `data`. HMAC takes keys of any length, so the error case is
/// never hit in practice.
pub fn calculate_signature(secret: &str, data: &[u8]) -> Result<String, InvalidLength> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())?;
    mac.update(data);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks `signature` against the body in constant time. Malformed hex is simply a mismatch.
pub fn verify_signature(secret: &str, data: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(data);
    mac.verify_slice(&expected).is_ok()
}
