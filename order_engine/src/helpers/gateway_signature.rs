//! # Payment gateway notification signatures
//!
//! Every notification the gateway posts carries a `signature_key`, the lowercase hex encoding of
//!
//! ```text
//!    SHA-512(order_id || status_code || gross_amount || server_key)
//! ```
//!
//! where `||` is plain string concatenation and `server_key` is the secret shared with the gateway. The fields are
//! hashed exactly as they appear in the payload, so `gross_amount` must not be reformatted before verification.
use sha2::{Digest, Sha512};

/// Calculates the hex-encoded signature the gateway would attach to a notification with these fields.
pub fn gateway_signature(order_id: &str, status_code: &str, gross_amount: &str, server_key: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Recomputes the signature and compares it with `signature` in constant time. Hex case is ignored.
pub fn verify_gateway_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
    signature: &str,
) -> bool {
    let expected = gateway_signature(order_id, status_code, gross_amount, server_key);
    constant_time_eq(expected.as_bytes(), signature.trim().to_ascii_lowercase().as_bytes())
}

/// Compares two byte strings without short-circuiting on the first difference.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let diff = a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y));
    diff == 0
}
