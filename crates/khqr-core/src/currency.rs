//! # Currency Coding
//!
//! KHQR carries the transaction currency as an ISO 4217 numeric code. The
//! mapping is a closed table: a currency outside it is a hard
//! [`ConfigurationError::UnsupportedCurrency`], never a silent default.

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Currencies accepted by the KHQR network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// United States dollar.
    Usd,
    /// Cambodian riel.
    Khr,
}

/// Closed alpha-to-currency table.
const CURRENCY_TABLE: &[(&str, Currency)] = &[("USD", Currency::Usd), ("KHR", Currency::Khr)];

impl Currency {
    /// Resolve an alphabetic code (case-insensitive, surrounding whitespace ignored).
    pub fn from_code(code: &str) -> Result<Self, ConfigurationError> {
        let wanted = code.trim().to_ascii_uppercase();
        CURRENCY_TABLE
            .iter()
            .find(|(alpha, _)| *alpha == wanted)
            .map(|(_, currency)| *currency)
            .ok_or_else(|| ConfigurationError::UnsupportedCurrency(code.to_string()))
    }

    /// Three-letter alphabetic code.
    pub fn alpha_code(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Khr => "KHR",
        }
    }

    /// ISO 4217 numeric code written into tag 53.
    pub fn numeric_code(self) -> &'static str {
        match self {
            Self::Usd => "840",
            Self::Khr => "116",
        }
    }

    /// Render an amount the way the payload carries it.
    ///
    /// Riel has no minor unit in practice: KHR amounts are rounded to the
    /// nearest integer. Every other currency gets exactly two decimals.
    pub fn format_amount(self, amount: Decimal) -> String {
        let places = match self {
            Self::Khr => 0,
            Self::Usd => 2,
        };
        let mut rounded = amount.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(places);
        rounded.to_string()
    }

    /// Reject amounts that are not positive once rounded for the payload,
    /// such as KHR 0.4 or USD 0.004.
    pub fn ensure_payable(self, amount: Decimal) -> Result<Decimal, ConfigurationError> {
        let places = match self {
            Self::Khr => 0,
            Self::Usd => 2,
        };
        if amount.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero) > Decimal::ZERO {
            Ok(amount)
        } else {
            Err(ConfigurationError::NonPositiveAmount(amount.to_string()))
        }
    }
}

impl FromStr for Currency {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.alpha_code())
    }
}

/// Reject zero and negative amounts.
pub fn ensure_positive(amount: Decimal) -> Result<Decimal, ConfigurationError> {
    if amount > Decimal::ZERO {
        Ok(amount)
    } else {
        Err(ConfigurationError::NonPositiveAmount(amount.to_string()))
    }
}
