//! # KHQR Generator
//!
//! The [`KhqrGenerator`] trait is the seam between the payload builder and
//! whatever actually produces the scannable string. Production uses
//! [`EmvGenerator`], which encodes the EMV TLV layout locally; tests and
//! alternative deployments can plug in their own implementation.
//!
//! A generator reports failure the way the network's SDKs do: a
//! [`GeneratorStatus`] with a non-zero code and a message. Its `data` is
//! untyped JSON and the builder searches it for the payload.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::currency::Currency;
use crate::digest::settlement_hash;
use crate::error::KhqrError;
use crate::sanitize::KhqrOptionalFields;
use crate::tlv::{sub_tag, tag, TlvWriter};

/// Country code written into tag 58.
pub const COUNTRY_CODE: &str = "KH";

/// Account details shared by individual and merchant QR codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualInfo {
    /// Bakong account id, e.g. `merchant_name@bank`.
    pub bakong_account_id: String,
    /// Display name shown in the payer's app.
    pub merchant_name: String,
    /// Merchant city.
    pub merchant_city: String,
    /// Optional account information (tag 29/01).
    pub account_information: Option<String>,
    /// Optional acquiring bank (tag 29/02).
    pub acquiring_bank: Option<String>,
    /// Transaction details.
    pub transaction: TransactionInfo,
}

/// Account details of a registered merchant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantInfo {
    /// Bakong account id.
    pub bakong_account_id: String,
    /// Display name shown in the payer's app.
    pub merchant_name: String,
    /// Merchant city.
    pub merchant_city: String,
    /// Merchant id assigned by the acquirer.
    pub merchant_id: String,
    /// Acquiring bank code.
    pub acquiring_bank: String,
    /// Transaction details.
    pub transaction: TransactionInfo,
}

/// Amount, currency, expiry and free-text fields of one QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    /// Currency of the transaction.
    pub currency: Currency,
    /// Pre-formatted amount. `None` produces a static QR.
    pub amount: Option<String>,
    /// Sanitized optional fields.
    pub optional: KhqrOptionalFields,
    /// Creation time, epoch milliseconds.
    pub creation_timestamp: i64,
    /// Expiration time, epoch milliseconds.
    pub expiration_timestamp: i64,
}

/// Status block of a generator result. Code `0` means success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorStatus {
    /// Zero on success.
    pub code: i32,
    /// Failure description.
    #[serde(default)]
    pub message: Option<String>,
}

/// Result of a generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorResponse {
    /// Outcome.
    pub status: GeneratorStatus,
    /// Result data; shape depends on the generator.
    #[serde(default)]
    pub data: Value,
}

impl GeneratorResponse {
    /// A failed result.
    pub fn failure(code: i32, message: impl Into<String>) -> Self {
        Self {
            status: GeneratorStatus {
                code,
                message: Some(message.into()),
            },
            data: Value::Null,
        }
    }
}

/// Produces KHQR strings for individual and merchant accounts.
pub trait KhqrGenerator: Send + Sync {
    /// Generate a QR for an individual account (tag 29).
    fn generate_individual(&self, info: &IndividualInfo) -> GeneratorResponse;

    /// Generate a QR for a merchant account (tag 30).
    fn generate_merchant(&self, info: &MerchantInfo) -> GeneratorResponse;
}

/// Local EMV TLV encoder.
///
/// Returns `data = {"qr": <payload>, "md5": <hash>}` on success and status
/// code `1` with the encoding error message otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmvGenerator;

impl EmvGenerator {
    /// Create the generator.
    pub fn new() -> Self {
        Self
    }

    fn respond(result: Result<String, KhqrError>) -> GeneratorResponse {
        match result {
            Ok(qr) => {
                let md5 = settlement_hash(&qr);
                GeneratorResponse {
                    status: GeneratorStatus {
                        code: 0,
                        message: None,
                    },
                    data: json!({ "qr": qr, "md5": md5 }),
                }
            }
            Err(e) => GeneratorResponse::failure(1, e.to_string()),
        }
    }
}

impl KhqrGenerator for EmvGenerator {
    fn generate_individual(&self, info: &IndividualInfo) -> GeneratorResponse {
        Self::respond(encode_individual(info))
    }

    fn generate_merchant(&self, info: &MerchantInfo) -> GeneratorResponse {
        Self::respond(encode_merchant(info))
    }
}

fn encode_individual(info: &IndividualInfo) -> Result<String, KhqrError> {
    let mut account = TlvWriter::new();
    account
        .field(sub_tag::ACCOUNT_ID, &info.bakong_account_id)?
        .optional(sub_tag::MERCHANT_ID, info.account_information.as_deref())?
        .optional(sub_tag::ACQUIRING_BANK, info.acquiring_bank.as_deref())?;
    encode(
        tag::INDIVIDUAL_ACCOUNT,
        &account,
        &info.merchant_name,
        &info.merchant_city,
        &info.transaction,
    )
}

fn encode_merchant(info: &MerchantInfo) -> Result<String, KhqrError> {
    let mut account = TlvWriter::new();
    account
        .field(sub_tag::ACCOUNT_ID, &info.bakong_account_id)?
        .field(sub_tag::MERCHANT_ID, &info.merchant_id)?
        .field(sub_tag::ACQUIRING_BANK, &info.acquiring_bank)?;
    encode(
        tag::MERCHANT_ACCOUNT,
        &account,
        &info.merchant_name,
        &info.merchant_city,
        &info.transaction,
    )
}

fn encode(
    account_tag: &str,
    account: &TlvWriter,
    merchant_name: &str,
    merchant_city: &str,
    tx: &TransactionInfo,
) -> Result<String, KhqrError> {
    let point_of_initiation = if tx.amount.is_some() { "12" } else { "11" };

    let mut additional = TlvWriter::new();
    let opt = &tx.optional;
    additional
        .optional(sub_tag::BILL_NUMBER, opt.bill_number.as_deref())?
        .optional(sub_tag::MOBILE_NUMBER, opt.mobile_number.as_deref())?
        .optional(sub_tag::STORE_LABEL, opt.store_label.as_deref())?
        .optional(sub_tag::TERMINAL_LABEL, opt.terminal_label.as_deref())?
        .optional(
            sub_tag::PURPOSE_OF_TRANSACTION,
            opt.purpose_of_transaction.as_deref(),
        )?;

    let mut timestamps = TlvWriter::new();
    timestamps
        .field(
            sub_tag::CREATION_TIMESTAMP,
            &tx.creation_timestamp.to_string(),
        )?
        .field(
            sub_tag::EXPIRATION_TIMESTAMP,
            &tx.expiration_timestamp.to_string(),
        )?;

    let mut w = TlvWriter::new();
    w.field(tag::PAYLOAD_FORMAT_INDICATOR, "01")?
        .field(tag::POINT_OF_INITIATION, point_of_initiation)?
        .template(account_tag, account)?
        .field(tag::MERCHANT_CATEGORY_CODE, &opt.merchant_category_code)?
        .field(tag::TRANSACTION_CURRENCY, tx.currency.numeric_code())?
        .optional(tag::TRANSACTION_AMOUNT, tx.amount.as_deref())?
        .field(tag::COUNTRY_CODE, COUNTRY_CODE)?
        .field(tag::MERCHANT_NAME, merchant_name)?
        .field(tag::MERCHANT_CITY, merchant_city)?
        .template(tag::ADDITIONAL_DATA, &additional)?
        .template(tag::TIMESTAMP, &timestamps)?;
    Ok(w.finish_with_crc())
}
