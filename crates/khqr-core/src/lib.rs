//! # khqr-core -- KHQR payload construction and status normalization
//!
//! Pure, synchronous domain logic for collecting payment over the KHQR
//! account-to-account QR network:
//!
//! - **Sanitizer** ([`sanitize`]): per-field length limits, truncation with
//!   a warning, merchant category code defaulting.
//! - **Encoding** ([`tlv`], [`generator`]): EMV tag-length-value layout with
//!   a CRC-16 trailer, behind the [`KhqrGenerator`] seam.
//! - **Payload Builder** ([`payload`]): validation, timestamps, generator
//!   dispatch and defensive result extraction.
//! - **Status Normalizer** ([`status`]): synonym table, structural payment
//!   evidence, resolution policy and fallback merge.
//!
//! Nothing here performs I/O. The async clients live in `khqr-client`.

pub mod currency;
pub mod digest;
pub mod error;
pub mod generator;
pub mod lookup;
pub mod payload;
pub mod sanitize;
pub mod status;
pub mod temporal;
pub mod tlv;

pub use currency::Currency;
pub use digest::settlement_hash;
pub use error::{ConfigurationError, KhqrError};
pub use generator::{EmvGenerator, GeneratorResponse, KhqrGenerator};
pub use payload::{AccountType, CheckoutRequest, KhqrPayload, MerchantAccount, PayloadBuilder};
pub use sanitize::KhqrOptionalFields;
pub use status::{
    detect_payment_evidence, interpret_status_response, merge_fallback, normalize_status_text,
    resolve_status, EvidenceKind, PaymentStatus, PaymentStatusResult,
};
pub use temporal::now_ms;
