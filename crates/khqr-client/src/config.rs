//! KHQR engine configuration.
//!
//! Every setting is optional. Missing account data is not a load-time
//! failure: the payload builder reports it as a `ConfigurationError` before
//! any network call is made.

use khqr_core::payload::{AccountType, MerchantAccount, DEFAULT_EXPIRY_MINUTES};
use url::Url;
use zeroize::Zeroizing;

/// Default primary status backend.
pub const DEFAULT_STATUS_URL: &str = "http://localhost:3000";

/// Default Bakong Open API base.
pub const DEFAULT_BAKONG_API_BASE: &str = "https://api-bakong.nbc.gov.kh/v1";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Default merchant city.
pub const DEFAULT_MERCHANT_CITY: &str = "Phnom Penh";

/// Configuration for the KHQR engine.
///
/// Custom `Debug` implementation redacts the Bakong password and static
/// token to prevent credential leakage in log output.
#[derive(Clone)]
pub struct KhqrConfig {
    /// Receiving account.
    pub account: MerchantAccount,
    /// QR lifetime in minutes.
    pub expiry_minutes: u32,
    /// Backend checkout endpoint. `None` selects local payload generation.
    pub checkout_url: Option<Url>,
    /// Base URL of the primary status backend.
    pub status_url: Url,
    /// Base URL of the Bakong Open API.
    pub bakong_api_base: Url,
    /// Bakong login email.
    pub bakong_username: Option<String>,
    /// Bakong login password.
    pub bakong_password: Option<Zeroizing<String>>,
    /// Static Bakong token. Takes precedence over username/password.
    pub bakong_token: Option<Zeroizing<String>>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for KhqrConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |set: bool| if set { "[REDACTED]" } else { "<unset>" };
        f.debug_struct("KhqrConfig")
            .field("account", &self.account)
            .field("expiry_minutes", &self.expiry_minutes)
            .field("checkout_url", &self.checkout_url)
            .field("status_url", &self.status_url)
            .field("bakong_api_base", &self.bakong_api_base)
            .field("bakong_username", &self.bakong_username)
            .field("bakong_password", &redact(self.bakong_password.is_some()))
            .field("bakong_token", &redact(self.bakong_token.is_some()))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl KhqrConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `BAKONG_ACCOUNT_ID`, `BAKONG_MERCHANT_NAME`
    /// - `BAKONG_MERCHANT_CITY` (default: `Phnom Penh`)
    /// - `BAKONG_ACCOUNT_TYPE` (`individual` (default) or `merchant`)
    /// - `BAKONG_MERCHANT_ID`, `BAKONG_ACQUIRING_BANK` (merchant accounts)
    /// - `BAKONG_PHONE_NUMBER` (international format, e.g. `+85512345678`)
    /// - `KHQR_EXPIRY_MINUTES` (default: 15)
    /// - `KHQR_CHECKOUT_URL` (unset: build payloads locally)
    /// - `KHQR_STATUS_URL` (default: `http://localhost:3000`)
    /// - `BAKONG_API_BASE` (default: `https://api-bakong.nbc.gov.kh/v1`)
    /// - `BAKONG_USERNAME`, `BAKONG_PASSWORD`, `BAKONG_TOKEN`
    /// - `KHQR_TIMEOUT_SECS` (default: 15)
    pub fn from_env() -> Result<Self, ConfigError> {
        let account_type = match env_opt("BAKONG_ACCOUNT_TYPE") {
            Some(raw) => raw.parse::<AccountType>().map_err(|e| {
                ConfigError::InvalidValue("BAKONG_ACCOUNT_TYPE".to_string(), e.to_string())
            })?,
            None => AccountType::Individual,
        };

        let checkout_url = env_opt("KHQR_CHECKOUT_URL")
            .map(|raw| parse_url("KHQR_CHECKOUT_URL", &raw))
            .transpose()?;

        Ok(Self {
            account: MerchantAccount {
                account_id: env_opt("BAKONG_ACCOUNT_ID"),
                merchant_name: env_opt("BAKONG_MERCHANT_NAME"),
                merchant_city: Some(
                    env_opt("BAKONG_MERCHANT_CITY")
                        .unwrap_or_else(|| DEFAULT_MERCHANT_CITY.to_string()),
                ),
                account_type,
                merchant_id: env_opt("BAKONG_MERCHANT_ID"),
                acquiring_bank: env_opt("BAKONG_ACQUIRING_BANK"),
                mobile_number: env_opt("BAKONG_PHONE_NUMBER"),
                merchant_category_code: None,
            },
            expiry_minutes: env_opt("KHQR_EXPIRY_MINUTES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_EXPIRY_MINUTES),
            checkout_url,
            status_url: env_url("KHQR_STATUS_URL", DEFAULT_STATUS_URL)?,
            bakong_api_base: env_url("BAKONG_API_BASE", DEFAULT_BAKONG_API_BASE)?,
            bakong_username: env_opt("BAKONG_USERNAME"),
            bakong_password: env_opt("BAKONG_PASSWORD").map(Zeroizing::new),
            bakong_token: env_opt("BAKONG_TOKEN").map(Zeroizing::new),
            timeout_secs: env_opt("KHQR_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Create a configuration pointing at one local mock server (for testing).
    ///
    /// The status backend and the Bakong API share `server_uri`; their paths
    /// do not overlap. Checkout is local, and Bakong credentials are
    /// `tester` / `secret`.
    pub fn local_mock(server_uri: &str) -> Result<Self, ConfigError> {
        let url = parse_url("local_mock", server_uri)?;
        Ok(Self {
            account: MerchantAccount {
                account_id: Some("c4techhub@aclb".to_string()),
                merchant_name: Some("C4 TECH HUB".to_string()),
                merchant_city: Some(DEFAULT_MERCHANT_CITY.to_string()),
                mobile_number: Some("+85569363243".to_string()),
                ..MerchantAccount::default()
            },
            expiry_minutes: DEFAULT_EXPIRY_MINUTES,
            checkout_url: None,
            status_url: url.clone(),
            bakong_api_base: url,
            bakong_username: Some("tester".to_string()),
            bakong_password: Some(Zeroizing::new("secret".to_string())),
            bakong_token: None,
            timeout_secs: 5,
        })
    }

    /// Whether username/password login is possible.
    pub fn has_credentials(&self) -> bool {
        self.bakong_username.is_some() && self.bakong_password.is_some()
    }
}

fn env_opt(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = env_opt(var).unwrap_or_else(|| default.to_string());
    parse_url(var, &raw)
}

fn parse_url(var: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}
