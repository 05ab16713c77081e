//! # Payload Builder
//!
//! Turns a merchant account and a checkout request into a [`KhqrPayload`].
//!
//! ## Validation Order
//!
//! All configuration checks run before the generator is invoked:
//! account id, merchant name, amount > 0, currency mapping, then (for
//! merchant accounts) merchant id and acquiring bank. A failing check is a
//! [`ConfigurationError`]; nothing is generated.
//!
//! ## Result Extraction
//!
//! Generator results are searched for the payload under `qr`, `payload` or
//! `data` (at any depth, shallow keys first) and for the hash under `md5`
//! or `hash`. A result without a payload string is
//! [`KhqrError::EmptyPayload`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::currency::{ensure_positive, Currency};
use crate::error::{ConfigurationError, KhqrError};
use crate::generator::{
    EmvGenerator, GeneratorResponse, IndividualInfo, KhqrGenerator, MerchantInfo, TransactionInfo,
};
use crate::lookup::{find_key_recursive, value_as_string};
use crate::sanitize::{
    local_mobile_number, sanitize, KhqrOptionalFields, RawOptionalFields,
    MAX_ACCOUNT_FIELD_LENGTH, MAX_MERCHANT_CITY_LENGTH, MAX_MERCHANT_NAME_LENGTH,
};
use crate::temporal::fresh_creation_ms;

/// Default QR lifetime.
pub const DEFAULT_EXPIRY_MINUTES: u32 = 15;

/// Cambodian international dialling prefix.
pub const CAMBODIA_COUNTRY_PREFIX: &str = "855";

/// Keys that may hold the payload string in a generator result.
pub const PAYLOAD_KEYS: &[&str] = &["qr", "payload", "data"];

/// Keys that may hold the settlement hash in a generator result.
pub const MD5_KEYS: &[&str] = &["md5", "hash"];

const EXTRACTION_DEPTH: usize = 4;

/// Whether the account is a personal or a registered merchant account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Personal Bakong account (tag 29).
    #[default]
    Individual,
    /// Registered merchant account (tag 30).
    Merchant,
}

impl FromStr for AccountType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "individual" => Ok(Self::Individual),
            "merchant" => Ok(Self::Merchant),
            other => Err(ConfigurationError::UnknownAccountType(other.to_string())),
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Individual => write!(f, "individual"),
            Self::Merchant => write!(f, "merchant"),
        }
    }
}

/// The receiving account, as configured by the deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MerchantAccount {
    /// Bakong account id.
    pub account_id: Option<String>,
    /// Display name.
    pub merchant_name: Option<String>,
    /// City.
    pub merchant_city: Option<String>,
    /// Individual or merchant.
    pub account_type: AccountType,
    /// Merchant id (merchant accounts only).
    pub merchant_id: Option<String>,
    /// Acquiring bank code (merchant accounts only).
    pub acquiring_bank: Option<String>,
    /// International mobile number used for tag 62/02.
    pub mobile_number: Option<String>,
    /// Merchant category code; defaults to `5999`.
    pub merchant_category_code: Option<String>,
}

/// A request to collect payment for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Plan or product identifier.
    pub plan_id: String,
    /// Amount to collect. Must be positive.
    pub amount: Decimal,
    /// Alphabetic currency code.
    pub currency: String,
    /// Storefront order id.
    pub order_id: String,
}

impl CheckoutRequest {
    /// Check amount and currency, the request-level preconditions.
    pub fn validate(&self) -> Result<Currency, ConfigurationError> {
        ensure_positive(self.amount)?;
        let currency = Currency::from_code(&self.currency)?;
        currency.ensure_payable(self.amount)?;
        Ok(currency)
    }
}

/// A generated KHQR payload. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KhqrPayload {
    /// The scannable string.
    pub payload: String,
    /// Settlement hash used for status checks.
    pub md5: Option<String>,
    /// Creation time, epoch milliseconds.
    pub creation_timestamp: i64,
    /// Expiration time, epoch milliseconds.
    pub expiration_timestamp: i64,
}

/// Builds payloads for one merchant account.
#[derive(Clone)]
pub struct PayloadBuilder {
    generator: Arc<dyn KhqrGenerator>,
    expiry_minutes: u32,
}

impl fmt::Debug for PayloadBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadBuilder")
            .field("expiry_minutes", &self.expiry_minutes)
            .finish_non_exhaustive()
    }
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_EXPIRY_MINUTES)
    }
}

impl PayloadBuilder {
    /// Builder backed by the local [`EmvGenerator`].
    pub fn new(expiry_minutes: u32) -> Self {
        Self::with_generator(Arc::new(EmvGenerator::new()), expiry_minutes)
    }

    /// Builder backed by a custom generator.
    pub fn with_generator(generator: Arc<dyn KhqrGenerator>, expiry_minutes: u32) -> Self {
        Self {
            generator,
            expiry_minutes,
        }
    }

    /// QR lifetime in minutes.
    pub fn expiry_minutes(&self) -> u32 {
        self.expiry_minutes
    }

    /// Build a payload for `request` paid into `account`.
    pub fn build(
        &self,
        account: &MerchantAccount,
        request: &CheckoutRequest,
    ) -> Result<KhqrPayload, KhqrError> {
        let account_id = sanitize(
            account.account_id.as_deref(),
            MAX_ACCOUNT_FIELD_LENGTH,
            "bakongAccountID",
        )
        .ok_or(ConfigurationError::MissingAccountId)?;
        let merchant_name = sanitize(
            account.merchant_name.as_deref(),
            MAX_MERCHANT_NAME_LENGTH,
            "merchantName",
        )
        .ok_or(ConfigurationError::MissingMerchantName)?;
        let currency = request.validate()?;
        let merchant_city = sanitize(
            account.merchant_city.as_deref(),
            MAX_MERCHANT_CITY_LENGTH,
            "merchantCity",
        )
        .unwrap_or_else(|| "Phnom Penh".to_string());

        let creation_timestamp = fresh_creation_ms();
        let expiration_timestamp = creation_timestamp + i64::from(self.expiry_minutes) * 60_000;

        let mobile = account
            .mobile_number
            .as_deref()
            .map(|n| local_mobile_number(n, CAMBODIA_COUNTRY_PREFIX));
        let purpose = format!("Plan {}", request.plan_id.trim());
        let bill_number = if request.order_id.trim().is_empty() {
            request.plan_id.as_str()
        } else {
            request.order_id.as_str()
        };
        let optional = KhqrOptionalFields::sanitized(RawOptionalFields {
            bill_number: Some(bill_number),
            mobile_number: mobile.as_deref(),
            store_label: Some(&merchant_name),
            terminal_label: Some(&merchant_name),
            purpose_of_transaction: Some(&purpose),
            merchant_category_code: account.merchant_category_code.as_deref(),
        });

        let transaction = TransactionInfo {
            currency,
            amount: Some(currency.format_amount(request.amount)),
            optional,
            creation_timestamp,
            expiration_timestamp,
        };

        let response = match account.account_type {
            AccountType::Individual => self.generator.generate_individual(&IndividualInfo {
                bakong_account_id: account_id,
                merchant_name,
                merchant_city,
                account_information: None,
                acquiring_bank: None,
                transaction,
            }),
            AccountType::Merchant => {
                let merchant_id = sanitize(
                    account.merchant_id.as_deref(),
                    MAX_ACCOUNT_FIELD_LENGTH,
                    "merchantID",
                )
                .ok_or(ConfigurationError::MissingMerchantId)?;
                let acquiring_bank = sanitize(
                    account.acquiring_bank.as_deref(),
                    MAX_ACCOUNT_FIELD_LENGTH,
                    "acquiringBank",
                )
                .ok_or(ConfigurationError::MissingAcquiringBank)?;
                self.generator.generate_merchant(&MerchantInfo {
                    bakong_account_id: account_id,
                    merchant_name,
                    merchant_city,
                    merchant_id,
                    acquiring_bank,
                    transaction,
                })
            }
        };

        let (payload, md5) = extract_generated(&response)?;
        tracing::debug!(
            account_type = %account.account_type,
            currency = %currency,
            creation_timestamp,
            "KHQR payload generated"
        );
        Ok(KhqrPayload {
            payload,
            md5,
            creation_timestamp,
            expiration_timestamp,
        })
    }
}

/// Pull the payload string and settlement hash out of a generator result.
pub fn extract_generated(
    response: &GeneratorResponse,
) -> Result<(String, Option<String>), KhqrError> {
    if response.status.code != 0 {
        return Err(KhqrError::Generation {
            code: response.status.code,
            message: response
                .status
                .message
                .clone()
                .unwrap_or_else(|| "unknown generator error".to_string()),
        });
    }

    let payload = match &response.data {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        data => find_key_recursive(data, PAYLOAD_KEYS, EXTRACTION_DEPTH).and_then(value_as_string),
    }
    .ok_or(KhqrError::EmptyPayload)?;

    let md5 = find_key_recursive(&response.data, MD5_KEYS, EXTRACTION_DEPTH)
        .and_then(value_as_string);
    Ok((payload, md5))
}
