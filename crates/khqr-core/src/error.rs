//! # Error Hierarchy
//!
//! Structured error types for payload construction, built with `thiserror`.
//!
//! [`ConfigurationError`] is always raised before any network call is made:
//! it signals that the merchant account or the checkout request cannot
//! produce a valid KHQR payload. [`KhqrError`] adds the failure modes of the
//! generator itself.

use thiserror::Error;

/// The merchant account or checkout request is unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// No Bakong account identifier is configured.
    #[error("Bakong account id is not configured")]
    MissingAccountId,

    /// No merchant display name is configured.
    #[error("merchant name is not configured")]
    MissingMerchantName,

    /// A merchant-type account is missing its merchant id.
    #[error("merchant id is required for merchant accounts")]
    MissingMerchantId,

    /// A merchant-type account is missing its acquiring bank code.
    #[error("acquiring bank is required for merchant accounts")]
    MissingAcquiringBank,

    /// The requested currency has no KHQR numeric code.
    #[error("unsupported currency: {0:?} (supported: USD, KHR)")]
    UnsupportedCurrency(String),

    /// The amount is zero or negative.
    #[error("amount must be greater than zero, got {0}")]
    NonPositiveAmount(String),

    /// The account type is neither `individual` nor `merchant`.
    #[error("unknown account type: {0:?} (expected individual or merchant)")]
    UnknownAccountType(String),

    /// A status lookup was requested without a settlement hash.
    #[error("md5 hash is required")]
    MissingMd5,

    /// A bulk status lookup exceeded the provider limit.
    #[error("at most {max} hashes may be checked per request, got {got}")]
    TooManyHashes {
        /// Provider limit.
        max: usize,
        /// Number of hashes supplied.
        got: usize,
    },
}

/// Errors from KHQR payload generation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KhqrError {
    /// Invalid configuration or request.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The generator reported a non-zero status code.
    #[error("KHQR generation failed (code {code}): {message}")]
    Generation {
        /// Generator status code.
        code: i32,
        /// Generator-provided message.
        message: String,
    },

    /// The generator result did not contain a payload string.
    #[error("KHQR generator returned an empty payload")]
    EmptyPayload,

    /// A TLV value cannot be encoded.
    #[error("cannot encode tag {tag}: value is {len} characters (max 99)")]
    Encoding {
        /// The EMV tag being written.
        tag: String,
        /// Character length of the offending value.
        len: usize,
    },
}
