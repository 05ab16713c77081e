//! # Field Sanitizer
//!
//! Every free-text field in a KHQR payload has a maximum length. Overlong
//! values are truncated to exactly the limit and logged; they are never
//! rejected. Blank values are omitted rather than emitted empty.

use serde::{Deserialize, Serialize};

/// Maximum length of the bill number, mobile number, labels and purpose.
pub const MAX_OPTIONAL_FIELD_LENGTH: usize = 25;

/// Maximum length of the merchant display name (tag 59).
pub const MAX_MERCHANT_NAME_LENGTH: usize = 25;

/// Maximum length of the merchant city (tag 60).
pub const MAX_MERCHANT_CITY_LENGTH: usize = 15;

/// Maximum length of account identifiers inside the account template.
pub const MAX_ACCOUNT_FIELD_LENGTH: usize = 32;

/// Required length of a merchant category code.
pub const MERCHANT_CATEGORY_CODE_LENGTH: usize = 4;

/// Category code used when none (or a malformed one) is supplied.
pub const DEFAULT_MERCHANT_CATEGORY_CODE: &str = "5999";

/// Trim, drop blanks, and truncate to `max_length` characters.
///
/// Truncation counts characters, not bytes, so multi-byte merchant names
/// are never split inside a code point.
pub fn sanitize(value: Option<&str>, max_length: usize, field_name: &str) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        return None;
    }

    let length = trimmed.chars().count();
    if length <= max_length {
        return Some(trimmed.to_string());
    }

    tracing::warn!(
        field = field_name,
        length,
        max_length,
        "truncating overlong KHQR field"
    );
    Some(trimmed.chars().take(max_length).collect())
}

/// Normalise a merchant category code, replacing anything that is not
/// exactly four characters with [`DEFAULT_MERCHANT_CATEGORY_CODE`].
pub fn sanitize_merchant_category_code(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(code) if code.chars().count() == MERCHANT_CATEGORY_CODE_LENGTH => code.to_string(),
        Some(code) if !code.is_empty() => {
            tracing::warn!(
                merchant_category_code = code,
                "merchant category code must be 4 characters; using default"
            );
            DEFAULT_MERCHANT_CATEGORY_CODE.to_string()
        }
        _ => DEFAULT_MERCHANT_CATEGORY_CODE.to_string(),
    }
}

/// Optional KHQR fields after sanitization.
///
/// Every field is either absent or within its limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KhqrOptionalFields {
    /// Bill or invoice number (tag 62/01).
    pub bill_number: Option<String>,
    /// Local-format mobile number (tag 62/02).
    pub mobile_number: Option<String>,
    /// Store label (tag 62/03).
    pub store_label: Option<String>,
    /// Terminal label (tag 62/07).
    pub terminal_label: Option<String>,
    /// Purpose of transaction (tag 62/08).
    pub purpose_of_transaction: Option<String>,
    /// Merchant category code (tag 52), always four characters.
    pub merchant_category_code: String,
}

/// Raw, unsanitized optional field input.
#[derive(Debug, Clone, Default)]
pub struct RawOptionalFields<'a> {
    /// Bill number.
    pub bill_number: Option<&'a str>,
    /// Mobile number.
    pub mobile_number: Option<&'a str>,
    /// Store label.
    pub store_label: Option<&'a str>,
    /// Terminal label.
    pub terminal_label: Option<&'a str>,
    /// Purpose of transaction.
    pub purpose_of_transaction: Option<&'a str>,
    /// Merchant category code.
    pub merchant_category_code: Option<&'a str>,
}

impl KhqrOptionalFields {
    /// Sanitize raw input against the per-field limits.
    pub fn sanitized(raw: RawOptionalFields<'_>) -> Self {
        Self {
            bill_number: sanitize(raw.bill_number, MAX_OPTIONAL_FIELD_LENGTH, "billNumber"),
            mobile_number: sanitize(raw.mobile_number, MAX_OPTIONAL_FIELD_LENGTH, "mobileNumber"),
            store_label: sanitize(raw.store_label, MAX_OPTIONAL_FIELD_LENGTH, "storeLabel"),
            terminal_label: sanitize(
                raw.terminal_label,
                MAX_OPTIONAL_FIELD_LENGTH,
                "terminalLabel",
            ),
            purpose_of_transaction: sanitize(
                raw.purpose_of_transaction,
                MAX_OPTIONAL_FIELD_LENGTH,
                "purposeOfTransaction",
            ),
            merchant_category_code: sanitize_merchant_category_code(raw.merchant_category_code),
        }
    }
}

/// Convert an international Cambodian number (`+85512345678`, `85512345678`)
/// to local format (`012345678`). Numbers without the prefix pass through.
pub fn local_mobile_number(international: &str, country_prefix: &str) -> String {
    let trimmed = international.trim();
    let without_plus = trimmed.strip_prefix('+').unwrap_or(trimmed);
    match without_plus.strip_prefix(country_prefix) {
        Some(rest) if !country_prefix.is_empty() => format!("0{rest}"),
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn blank_values_are_omitted() {
        assert_eq!(sanitize(None, 25, "billNumber"), None);
        assert_eq!(sanitize(Some(""), 25, "billNumber"), None);
        assert_eq!(sanitize(Some("   \t"), 25, "billNumber"), None);
    }

    #[test]
    fn values_are_trimmed() {
        assert_eq!(sanitize(Some("  local-3m "), 25, "billNumber").as_deref(), Some("local-3m"));
    }

    #[test]
    fn overlong_values_are_truncated_without_ellipsis() {
        let out = sanitize(Some("ABCDEFGHIJKLMNOPQRSTUVWXYZ0123"), 25, "storeLabel").unwrap();
        assert_eq!(out, "ABCDEFGHIJKLMNOPQRSTUVWXY");
    }

    #[test]
    fn truncation_counts_characters() {
        let khmer = "ហាងកាហ្វេភ្នំពេញធំជាងគេបំផុតក្នុងក្រុង";
        let out = sanitize(Some(khmer), 10, "storeLabel").unwrap();
        assert_eq!(out.chars().count(), 10);
        assert!(khmer.starts_with(&out));
    }

    #[test]
    fn category_code_defaults() {
        assert_eq!(sanitize_merchant_category_code(None), "5999");
        assert_eq!(sanitize_merchant_category_code(Some("")), "5999");
        assert_eq!(sanitize_merchant_category_code(Some("599")), "5999");
        assert_eq!(sanitize_merchant_category_code(Some("59990")), "5999");
        assert_eq!(sanitize_merchant_category_code(Some(" 5411 ")), "5411");
    }

    #[test]
    fn mobile_number_prefix_is_stripped() {
        assert_eq!(local_mobile_number("+85569363243", "855"), "069363243");
        assert_eq!(local_mobile_number("85569363243", "855"), "069363243");
        assert_eq!(local_mobile_number("069363243", "855"), "069363243");
    }

    #[test]
    fn optional_field_set_is_sanitized() {
        let fields = KhqrOptionalFields::sanitized(RawOptionalFields {
            bill_number: Some("INV-2026-000000000000000000042"),
            mobile_number: Some("069363243"),
            store_label: Some("  "),
            purpose_of_transaction: Some("Plan local-3m"),
            merchant_category_code: Some("12"),
            ..RawOptionalFields::default()
        });
        assert_eq!(fields.bill_number.as_deref().map(str::len), Some(25));
        assert_eq!(fields.mobile_number.as_deref(), Some("069363243"));
        assert_eq!(fields.store_label, None);
        assert_eq!(fields.terminal_label, None);
        assert_eq!(fields.merchant_category_code, "5999");
    }

    proptest! {
        #[test]
        fn sanitized_length_never_exceeds_limit(value in "\\PC{0,60}", max in 1usize..40) {
            if let Some(out) = sanitize(Some(&value), max, "prop") {
                let trimmed_len = value.trim().chars().count();
                prop_assert_eq!(out.chars().count(), trimmed_len.min(max));
            }
        }

        #[test]
        fn category_code_is_always_four_chars(value in "\\PC{0,8}") {
            prop_assert_eq!(sanitize_merchant_category_code(Some(&value)).chars().count(), 4);
        }
    }
}
