//! # EMV Tag-Length-Value Encoding
//!
//! KHQR follows the EMVCo merchant-presented QR layout: each data object is
//! a two-digit tag, a two-digit decimal length (character count of the
//! value), then the value. The payload ends with tag `63`, a CRC-16 over
//! everything before it including the literal `6304`.

use crate::error::KhqrError;

/// Largest value a two-digit length can describe.
pub const MAX_VALUE_LENGTH: usize = 99;

/// Top-level tags.
pub mod tag {
    /// Payload format indicator.
    pub const PAYLOAD_FORMAT_INDICATOR: &str = "00";
    /// Point of initiation method.
    pub const POINT_OF_INITIATION: &str = "01";
    /// Individual account information template.
    pub const INDIVIDUAL_ACCOUNT: &str = "29";
    /// Merchant account information template.
    pub const MERCHANT_ACCOUNT: &str = "30";
    /// Merchant category code.
    pub const MERCHANT_CATEGORY_CODE: &str = "52";
    /// Transaction currency.
    pub const TRANSACTION_CURRENCY: &str = "53";
    /// Transaction amount.
    pub const TRANSACTION_AMOUNT: &str = "54";
    /// Country code.
    pub const COUNTRY_CODE: &str = "58";
    /// Merchant name.
    pub const MERCHANT_NAME: &str = "59";
    /// Merchant city.
    pub const MERCHANT_CITY: &str = "60";
    /// Additional data field template.
    pub const ADDITIONAL_DATA: &str = "62";
    /// CRC.
    pub const CRC: &str = "63";
    /// Timestamp template.
    pub const TIMESTAMP: &str = "99";
}

/// Sub-tags of the account, additional-data and timestamp templates.
pub mod sub_tag {
    /// Bakong account id (account templates).
    pub const ACCOUNT_ID: &str = "00";
    /// Merchant id (merchant template) or account information (individual template).
    pub const MERCHANT_ID: &str = "01";
    /// Acquiring bank (account templates).
    pub const ACQUIRING_BANK: &str = "02";
    /// Bill number (additional data).
    pub const BILL_NUMBER: &str = "01";
    /// Mobile number (additional data).
    pub const MOBILE_NUMBER: &str = "02";
    /// Store label (additional data).
    pub const STORE_LABEL: &str = "03";
    /// Terminal label (additional data).
    pub const TERMINAL_LABEL: &str = "07";
    /// Purpose of transaction (additional data).
    pub const PURPOSE_OF_TRANSACTION: &str = "08";
    /// Creation timestamp (timestamp template).
    pub const CREATION_TIMESTAMP: &str = "00";
    /// Expiration timestamp (timestamp template).
    pub const EXPIRATION_TIMESTAMP: &str = "01";
}

/// Accumulates TLV data objects in order.
#[derive(Debug, Default, Clone)]
pub struct TlvWriter {
    buf: String,
}

impl TlvWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one data object.
    pub fn field(&mut self, tag: &str, value: &str) -> Result<&mut Self, KhqrError> {
        let len = value.chars().count();
        if len > MAX_VALUE_LENGTH {
            return Err(KhqrError::Encoding {
                tag: tag.to_string(),
                len,
            });
        }
        self.buf.push_str(tag);
        self.buf.push_str(&format!("{len:02}"));
        self.buf.push_str(value);
        Ok(self)
    }

    /// Append a data object only when a value is present.
    pub fn optional(&mut self, tag: &str, value: Option<&str>) -> Result<&mut Self, KhqrError> {
        match value {
            Some(v) => self.field(tag, v),
            None => Ok(self),
        }
    }

    /// Append a nested template, skipping it entirely when it is empty.
    pub fn template(&mut self, tag: &str, inner: &TlvWriter) -> Result<&mut Self, KhqrError> {
        if inner.is_empty() {
            return Ok(self);
        }
        self.field(tag, inner.as_str())
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The encoded data so far.
    pub fn as_str(&self) -> &str {
        &self.buf
    }

    /// Append the CRC data object and return the finished payload.
    pub fn finish_with_crc(mut self) -> String {
        self.buf.push_str(tag::CRC);
        self.buf.push_str("04");
        let crc = crc16_ccitt_false(self.buf.as_bytes());
        self.buf.push_str(&format!("{crc:04X}"));
        self.buf
    }
}

/// CRC-16/CCITT-FALSE: polynomial 0x1021, initial value 0xFFFF, no reflection.
pub fn crc16_ccitt_false(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Check the trailing CRC of a complete payload.
pub fn verify_crc(payload: &str) -> bool {
    let Some(split) = payload.len().checked_sub(4) else {
        return false;
    };
    if !payload.is_char_boundary(split) {
        return false;
    }
    let (body, crc) = payload.split_at(split);
    if !body.ends_with("6304") {
        return false;
    }
    format!("{:04X}", crc16_ccitt_false(body.as_bytes())) == crc.to_ascii_uppercase()
}

/// Decode one level of TLV data objects. Returns `None` on malformed input.
pub fn parse_fields(data: &str) -> Option<Vec<(String, String)>> {
    let mut out = Vec::new();
    let mut rest = data;
    while !rest.is_empty() {
        let tag = rest.get(0..2)?;
        let len: usize = rest.get(2..4)?.parse().ok()?;
        let value_start = 4;
        let value_end = rest[value_start..]
            .char_indices()
            .nth(len)
            .map_or(rest.len(), |(i, _)| value_start + i);
        let value = &rest[value_start..value_end];
        if value.chars().count() != len {
            return None;
        }
        out.push((tag.to_string(), value.to_string()));
        rest = &rest[value_end..];
    }
    Some(out)
}
