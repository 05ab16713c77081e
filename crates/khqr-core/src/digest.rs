//! # Settlement Hash
//!
//! The Bakong network indexes transactions by the MD5 of the exact payload
//! string that was scanned. The hash is the lookup key for every later
//! status check.

use md5::{Digest, Md5};

/// Lowercase hex MD5 of a KHQR payload.
pub fn settlement_hash(payload: &str) -> String {
    let digest = Md5::digest(payload.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Whether `value` looks like a settlement hash (32 hex characters).
pub fn is_settlement_hash(value: &str) -> bool {
    value.len() == 32 && value.bytes().all(|b| b.is_ascii_hexdigit())
}
