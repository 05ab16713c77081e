//! # Wall-Clock Timestamps
//!
//! KHQR timestamps and `checkedAt` values are Unix epoch milliseconds taken
//! from the local clock, never from a server.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde_json::Value;

static LAST_CREATION_MS: AtomicI64 = AtomicI64::new(0);

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// A creation timestamp that is strictly greater than every one issued
/// before it in this process.
///
/// Two checkouts started within the same millisecond still get distinct
/// creation timestamps, so their payloads (and settlement hashes) differ.
pub fn fresh_creation_ms() -> i64 {
    let now = now_ms();
    let mut last = LAST_CREATION_MS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_CREATION_MS.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
        {
            Ok(_) => return next,
            Err(observed) => last = observed,
        }
    }
}

/// Interpret a timestamp or duration field as epoch milliseconds.
///
/// Numbers below 10^9 are seconds after `reference_ms`; below 10^12, epoch
/// seconds; anything larger, epoch milliseconds. Strings are tried as
/// numbers, then as RFC 3339. Zero, negatives and non-finite values are
/// rejected.
pub fn parse_epoch_ms(value: &Value, reference_ms: i64) -> Option<i64> {
    let from_number = |n: f64| -> Option<i64> {
        if !n.is_finite() || n <= 0.0 {
            None
        } else if n < 1e9 {
            Some(reference_ms + (n * 1000.0) as i64)
        } else if n < 1e12 {
            Some((n * 1000.0) as i64)
        } else {
            Some(n as i64)
        }
    };
    match value {
        Value::Number(n) => n.as_f64().and_then(from_number),
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<f64>() {
                Ok(n) => from_number(n),
                Err(_) => DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| dt.timestamp_millis()),
            }
        }
        _ => None,
    }
}
