//! # Status Normalizer
//!
//! Maps the status vocabularies of the primary backend and the Bakong Open
//! API onto one [`PaymentStatus`].
//!
//! Three independent signals are combined by [`resolve_status`]:
//!
//! 1. [`normalize_status_text`] gives the literal status string, looked up in a
//!    closed synonym table.
//! 2. [`detect_payment_evidence`] finds structural proof of payment (a paid
//!    timestamp, a paid amount, a settled balance, an alternate status
//!    field, or a provider acknowledgement).
//! 3. [`message_indicates_payment`] looks for paid-adjacent phrases in a free-text
//!    message.
//!
//! The literal `PAID` is treated as weak: some providers use it as a
//! generic "processed" label, so on its own it resolves to
//! [`PaymentStatus::Pending`]. Evidence and message phrases can only move a
//! status toward [`PaymentStatus::Paid`].

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lookup::{
    first_decimal, first_i64, first_string, get_path, is_present, value_as_decimal,
    value_as_string, FieldPath,
};

/// Canonical payment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// No payment has been made.
    Unpaid,
    /// Payment was initiated or the QR was issued; not settled yet.
    Pending,
    /// The provider is processing the payment.
    Processing,
    /// Settled. Never downgraded once reached.
    Paid,
    /// The payment failed.
    Failed,
    /// The QR or the transaction expired.
    Expired,
    /// The payment was cancelled or reversed.
    Cancelled,
    /// A status was reported but not recognised.
    Unknown,
}

impl PaymentStatus {
    /// Upper-case wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unpaid => "UNPAID",
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Paid => "PAID",
            Self::Failed => "FAILED",
            Self::Expired => "EXPIRED",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether polling can stop: the payment settled or can no longer settle.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Paid | Self::Failed | Self::Expired | Self::Cancelled
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize_status_text(s).ok_or_else(|| "empty status".to_string())
    }
}

/// Closed synonym table. Keys are upper-case with spaces and dashes folded
/// into underscores.
const STATUS_SYNONYMS: &[(&str, PaymentStatus)] = &[
    ("PAID", PaymentStatus::Paid),
    ("SUCCESS", PaymentStatus::Paid),
    ("SUCCEEDED", PaymentStatus::Paid),
    ("SUCCESSFUL", PaymentStatus::Paid),
    ("SETTLED", PaymentStatus::Paid),
    ("COMPLETED", PaymentStatus::Paid),
    ("COMPLETE", PaymentStatus::Paid),
    ("APPROVED", PaymentStatus::Paid),
    ("CAPTURED", PaymentStatus::Paid),
    ("CONFIRMED", PaymentStatus::Paid),
    ("UNPAID", PaymentStatus::Unpaid),
    ("NOT_PAID", PaymentStatus::Unpaid),
    ("UNSETTLED", PaymentStatus::Unpaid),
    ("NOT_FOUND", PaymentStatus::Unpaid),
    ("PENDING", PaymentStatus::Pending),
    ("WAITING", PaymentStatus::Pending),
    ("AWAITING_PAYMENT", PaymentStatus::Pending),
    ("CREATED", PaymentStatus::Pending),
    ("NEW", PaymentStatus::Pending),
    ("QUEUE", PaymentStatus::Pending),
    ("QUEUED", PaymentStatus::Pending),
    ("INITIATED", PaymentStatus::Pending),
    ("PROCESSING", PaymentStatus::Processing),
    ("IN_PROGRESS", PaymentStatus::Processing),
    ("AUTHORIZED", PaymentStatus::Processing),
    ("VERIFYING", PaymentStatus::Processing),
    ("FAILED", PaymentStatus::Failed),
    ("FAILURE", PaymentStatus::Failed),
    ("ERROR", PaymentStatus::Failed),
    ("DECLINED", PaymentStatus::Failed),
    ("REJECTED", PaymentStatus::Failed),
    ("EXPIRED", PaymentStatus::Expired),
    ("TIMEOUT", PaymentStatus::Expired),
    ("TIMED_OUT", PaymentStatus::Expired),
    ("CANCELLED", PaymentStatus::Cancelled),
    ("CANCELED", PaymentStatus::Cancelled),
    ("VOIDED", PaymentStatus::Cancelled),
    ("REVERSED", PaymentStatus::Cancelled),
];

/// The one paid synonym that does not count as confirmation by itself.
const WEAK_PAID_TEXT: &str = "PAID";

fn fold_status_text(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

/// Normalise raw status text. Blank input has no opinion (`None`);
/// unrecognised text is [`PaymentStatus::Unknown`].
pub fn normalize_status_text(raw: &str) -> Option<PaymentStatus> {
    let folded = fold_status_text(raw);
    if folded.is_empty() {
        return None;
    }
    Some(
        STATUS_SYNONYMS
            .iter()
            .find(|(word, _)| *word == folded)
            .map_or(PaymentStatus::Unknown, |(_, status)| *status),
    )
}

/// Whether `raw` is a paid synonym other than the bare literal `PAID`.
pub fn is_strong_paid_text(raw: &str) -> bool {
    let folded = fold_status_text(raw);
    folded != WEAK_PAID_TEXT && normalize_status_text(raw) == Some(PaymentStatus::Paid)
}

// ── Evidence ────────────────────────────────────────────────────────

/// Kind of structural proof that a payment settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    /// A paid/acknowledged timestamp is set.
    PaidTimestamp,
    /// A paid-amount field is positive.
    PaidAmount,
    /// The outstanding balance is zero and a paid amount is reported.
    SettledBalance,
    /// A secondary status field says paid, settled or completed.
    AlternateStatus,
    /// Bakong acknowledged the transaction (`responseCode == 0` with data).
    ProviderAcknowledged,
}

/// Objects inspected for evidence, in order.
pub const EVIDENCE_SCOPES: &[FieldPath] = &[&[], &["data"], &["raw"], &["raw", "data"], &["result"]];

/// Timestamp fields that are only set once a payment settles.
pub const PAID_TIMESTAMP_KEYS: &[FieldPath] = &[
    &["paidAt"],
    &["paid_at"],
    &["paidTime"],
    &["paidDate"],
    &["paymentDate"],
    &["settledAt"],
    &["completedAt"],
    &["acknowledgedDateMs"],
];

/// Paid-amount fields.
pub const PAID_AMOUNT_KEYS: &[FieldPath] = &[
    &["paidAmount"],
    &["paid_amount"],
    &["amountPaid"],
    &["amount_paid"],
];

/// Outstanding-balance fields.
pub const OUTSTANDING_KEYS: &[FieldPath] = &[
    &["outstanding"],
    &["outstandingAmount"],
    &["outstanding_amount"],
    &["balanceDue"],
    &["amountDue"],
];

/// Status-like fields other than the primary `status`.
pub const ALTERNATE_STATUS_KEYS: &[FieldPath] = &[
    &["paymentStatus"],
    &["payment_status"],
    &["transactionStatus"],
    &["transaction_status"],
    &["txnStatus"],
    &["result"],
    &["state"],
];

const ALTERNATE_PAID_WORDS: &[&str] = &["paid", "settled", "completed"];
const ALTERNATE_NEGATIONS: &[&str] = &[
    "not", "unpaid", "unsettled", "pending", "awaiting", "partial", "partially", "failed",
];

/// Lower-case alphanumeric words of `text`. Underscores, dashes and
/// punctuation separate words.
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether `phrase` occurs in `words` as a run of whole words.
fn contains_phrase(words: &[String], phrase: &str) -> bool {
    let needle: Vec<&str> = phrase.split(' ').collect();
    words
        .windows(needle.len())
        .any(|window| window.iter().zip(&needle).all(|(w, n)| w == n))
}

fn alternate_status_says_paid(text: &str) -> bool {
    let words = words(text);
    ALTERNATE_PAID_WORDS.iter().any(|w| contains_phrase(&words, w))
        && !ALTERNATE_NEGATIONS.iter().any(|n| contains_phrase(&words, n))
}

fn timestamp_is_set(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f > 0.0),
        other => is_present(other),
    }
}

fn evidence_in(node: &Value) -> Option<EvidenceKind> {
    if !node.is_object() {
        return None;
    }

    if PAID_TIMESTAMP_KEYS
        .iter()
        .filter_map(|path| get_path(node, path))
        .any(timestamp_is_set)
    {
        return Some(EvidenceKind::PaidTimestamp);
    }

    let paid_amount = first_decimal(node, PAID_AMOUNT_KEYS);
    if paid_amount.is_some_and(|a| a > Decimal::ZERO) {
        return Some(EvidenceKind::PaidAmount);
    }

    let outstanding = first_decimal(node, OUTSTANDING_KEYS);
    if outstanding == Some(Decimal::ZERO) && paid_amount.is_some_and(|a| a >= Decimal::ZERO) {
        return Some(EvidenceKind::SettledBalance);
    }

    let alternate_paid = ALTERNATE_STATUS_KEYS
        .iter()
        .filter_map(|path| get_path(node, path))
        .filter_map(value_as_string)
        .any(|text| alternate_status_says_paid(&text));
    if alternate_paid {
        return Some(EvidenceKind::AlternateStatus);
    }

    let acknowledged = first_i64(node, &[&["responseCode"]]) == Some(0)
        && get_path(node, &["data"]).is_some_and(|d| d.is_object() && is_present(d));
    if acknowledged {
        return Some(EvidenceKind::ProviderAcknowledged);
    }

    None
}

/// Look for structural proof of payment anywhere in the known scopes.
pub fn detect_payment_evidence(body: &Value) -> Option<EvidenceKind> {
    EVIDENCE_SCOPES
        .iter()
        .filter_map(|scope| get_path(body, scope))
        .find_map(evidence_in)
}

// ── Message heuristics ──────────────────────────────────────────────

const PAID_PHRASES: &[&str] = &[
    "has been paid",
    "was paid successfully",
    "paid successfully",
    "successfully paid",
    "payment received",
    "payment successful",
    "payment success",
    "payment completed",
    "payment complete",
    "payment settled",
    "transaction completed",
    "transaction successful",
];

const MESSAGE_NEGATIONS: &[&str] = &[
    "unpaid",
    "not paid",
    "not yet paid",
    "not been paid",
    "not received",
    "not completed",
    "not settled",
    "unsettled",
    "could not",
    "unable",
    "failed",
    "pending",
    "expired",
    "to be paid",
    "before",
];

/// Whether a free-text message says the payment went through.
///
/// Phrases match whole words only, so "prepaid" or "amount to be paid"
/// never count.
pub fn message_indicates_payment(message: &str) -> bool {
    let words = words(message);
    !MESSAGE_NEGATIONS.iter().any(|n| contains_phrase(&words, n))
        && PAID_PHRASES.iter().any(|p| contains_phrase(&words, p))
}

// ── Resolution ──────────────────────────────────────────────────────

/// Combine the three signals.
///
/// - A weak `PAID` without evidence becomes `PENDING`.
/// - Evidence forces `PAID`.
/// - A paid-adjacent message forces `PAID` on a status that is still open;
///   it never moves a terminal status.
/// - No text and no evidence is `UNKNOWN`.
pub fn resolve_status(
    text: Option<&str>,
    evidence: Option<EvidenceKind>,
    message: Option<&str>,
) -> PaymentStatus {
    let normalized = text.and_then(normalize_status_text);
    let strong = text.is_some_and(is_strong_paid_text);

    let mut status = match normalized {
        Some(PaymentStatus::Paid) if !strong && evidence.is_none() => PaymentStatus::Pending,
        Some(status) => status,
        None => PaymentStatus::Unknown,
    };

    if evidence.is_some() {
        status = PaymentStatus::Paid;
    }
    if !status.is_terminal() && message.is_some_and(message_indicates_payment) {
        status = PaymentStatus::Paid;
    }
    status
}

// ── Result records ──────────────────────────────────────────────────

/// Outcome of one status check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResult {
    /// Canonical status.
    pub status: PaymentStatus,
    /// Settlement hash that was checked.
    pub md5: String,
    /// Transaction data reported by the source, if any.
    pub data: Option<Value>,
    /// The source's raw response.
    pub raw: Option<Value>,
    /// Human-readable message from the source.
    pub message: Option<String>,
    /// Local wall-clock capture time, epoch milliseconds.
    pub checked_at: i64,
}

/// Where the primary status text may sit. Keys listed in
/// [`ALTERNATE_STATUS_KEYS`] are evidence, not status text.
pub const STATUS_TEXT_PATHS: &[FieldPath] = &[
    &["status"],
    &["data", "status"],
    &["result", "status"],
    &["raw", "data", "status"],
];

/// Where a human-readable message may sit.
pub const MESSAGE_PATHS: &[FieldPath] = &[
    &["message"],
    &["responseMessage"],
    &["data", "message"],
    &["raw", "responseMessage"],
];

/// Where the checked hash may be echoed back. Bakong's `data.hash` is the
/// transaction hash, not the settlement md5, and is not consulted.
pub const MD5_PATHS: &[FieldPath] = &[&["md5"], &["data", "md5"]];

/// Bakong error codes meaning "transaction not found", i.e. not paid yet.
pub const NOT_FOUND_ERROR_CODES: &[i64] = &[11, 12];

const ERROR_CODE_PATHS: &[FieldPath] = &[&["errorCode"], &["raw", "errorCode"]];

/// Interpret a status response body of any supported shape.
pub fn interpret_status_response(body: &Value, md5: &str, checked_at: i64) -> PaymentStatusResult {
    let text = first_string(body, STATUS_TEXT_PATHS).or_else(|| {
        first_i64(body, ERROR_CODE_PATHS)
            .filter(|code| NOT_FOUND_ERROR_CODES.contains(code))
            .map(|_| PaymentStatus::Unpaid.as_str().to_string())
    });
    let evidence = detect_payment_evidence(body);
    let message = first_string(body, MESSAGE_PATHS);
    let status = resolve_status(text.as_deref(), evidence, message.as_deref());

    tracing::debug!(
        md5,
        raw_status = text.as_deref().unwrap_or(""),
        evidence = ?evidence,
        status = %status,
        "status response interpreted"
    );

    let data = get_path(body, &["data"])
        .filter(|d| d.is_object() && is_present(d))
        .cloned();
    let raw = get_path(body, &["raw"])
        .filter(|r| is_present(r))
        .cloned()
        .unwrap_or_else(|| body.clone());

    PaymentStatusResult {
        status,
        md5: first_string(body, MD5_PATHS).unwrap_or_else(|| md5.to_string()),
        data,
        raw: Some(raw),
        message,
        checked_at,
    }
}

fn present_or<T>(primary: Option<T>, fallback: Option<T>, present: impl Fn(&T) -> bool) -> Option<T> {
    match primary {
        Some(value) if present(&value) => Some(value),
        _ => fallback.filter(|v| present(v)),
    }
}

/// Merge a fallback result into the primary one.
///
/// - A `PAID` primary is returned unchanged.
/// - A `PAID` fallback replaces the primary.
/// - Otherwise each primary field wins unless it is empty, and the
///   fallback status only replaces a primary `UNKNOWN`.
pub fn merge_fallback(
    primary: PaymentStatusResult,
    fallback: Option<PaymentStatusResult>,
) -> PaymentStatusResult {
    if primary.status == PaymentStatus::Paid {
        return primary;
    }
    let Some(fallback) = fallback else {
        return primary;
    };
    if fallback.status == PaymentStatus::Paid {
        return fallback;
    }

    let status = if primary.status == PaymentStatus::Unknown {
        fallback.status
    } else {
        primary.status
    };
    let md5 = if primary.md5.trim().is_empty() {
        fallback.md5
    } else {
        primary.md5
    };

    PaymentStatusResult {
        status,
        md5,
        data: present_or(primary.data, fallback.data, is_present),
        raw: present_or(primary.raw, fallback.raw, is_present),
        message: present_or(primary.message, fallback.message, |m: &String| {
            !m.trim().is_empty()
        }),
        checked_at: primary.checked_at,
    }
}

/// Amount reported alongside a status, when the source includes one.
pub fn reported_amount(result: &PaymentStatusResult) -> Option<Decimal> {
    result
        .data
        .as_ref()
        .and_then(|d| get_path(d, &["amount"]))
        .and_then(value_as_decimal)
}
