//! # khqr-client -- Async KHQR checkout and status client
//!
//! Wraps the pure logic in `khqr-core` with the network side:
//!
//! - **Checkout** ([`checkout`]): backend-delegated or local payload
//!   generation, plus QR rasterization ([`qr`]).
//! - **Primary status** ([`status`]): the storefront's own status backend.
//! - **Fallback** ([`fallback`]): the Bakong Open API, behind a
//!   single-flight token session.
//!
//! [`KhqrEngine`] ties them together and exposes the two calls the
//! storefront uses: [`KhqrEngine::generate_checkout_details`] and
//! [`KhqrEngine::check_bakong_payment_status`]. There is no polling loop
//! here; callers decide how often to ask.

pub mod checkout;
pub mod config;
pub mod error;
pub mod fallback;
pub(crate) mod http;
pub mod qr;
pub mod status;

pub use checkout::{CheckoutDetails, CheckoutSource};
pub use config::KhqrConfig;
pub use error::ClientError;
pub use fallback::{AuthSession, AuthToken, SessionPhase};
pub use http::extract_error_message;

use std::sync::Arc;

use khqr_core::payload::{CheckoutRequest, PayloadBuilder};
use khqr_core::status::{merge_fallback, PaymentStatus, PaymentStatusResult};
use khqr_core::{ConfigurationError, KhqrGenerator};

/// Top-level KHQR client. Holds one sub-client per upstream.
#[derive(Debug, Clone)]
pub struct KhqrEngine {
    checkout: checkout::CheckoutClient,
    status: status::StatusClient,
    fallback: fallback::FallbackClient,
}

impl KhqrEngine {
    /// Create an engine with its own token session.
    pub fn new(config: KhqrConfig) -> Result<Self, ClientError> {
        Self::with_session(config, Arc::new(AuthSession::new()))
    }

    /// Create an engine that shares `session` with other engines.
    pub fn with_session(config: KhqrConfig, session: Arc<AuthSession>) -> Result<Self, ClientError> {
        let builder = PayloadBuilder::new(config.expiry_minutes);
        Self::build(config, session, builder)
    }

    /// Create an engine whose local payloads come from `generator`.
    pub fn with_generator(
        config: KhqrConfig,
        generator: Arc<dyn KhqrGenerator>,
    ) -> Result<Self, ClientError> {
        let builder = PayloadBuilder::with_generator(generator, config.expiry_minutes);
        Self::build(config, Arc::new(AuthSession::new()), builder)
    }

    fn build(
        config: KhqrConfig,
        session: Arc<AuthSession>,
        builder: PayloadBuilder,
    ) -> Result<Self, ClientError> {
        let http = http::build_http(config.timeout_secs)?;
        tracing::debug!(
            checkout_mode = if config.checkout_url.is_some() { "backend" } else { "local" },
            fallback = config.bakong_token.is_some() || config.has_credentials(),
            "KHQR engine configured"
        );

        Ok(Self {
            checkout: checkout::CheckoutClient::new(
                http.clone(),
                config.checkout_url,
                config.account,
                builder,
            ),
            status: status::StatusClient::new(http.clone(), config.status_url),
            fallback: fallback::FallbackClient::new(
                http,
                config.bakong_api_base,
                config.bakong_username,
                config.bakong_password,
                config.bakong_token,
                session,
            ),
        })
    }

    /// Access the checkout client.
    pub fn checkout(&self) -> &checkout::CheckoutClient {
        &self.checkout
    }

    /// Access the primary status client.
    pub fn status(&self) -> &status::StatusClient {
        &self.status
    }

    /// Access the Bakong fallback client.
    pub fn fallback(&self) -> &fallback::FallbackClient {
        &self.fallback
    }

    /// Build checkout details for `request`.
    ///
    /// Configuration errors (missing account data, unsupported currency,
    /// non-positive amount) are returned before any network call.
    pub async fn generate_checkout_details(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutDetails, ClientError> {
        self.checkout.generate(request).await
    }

    /// Reconcile the status of one settlement hash.
    ///
    /// The primary backend is always asked first and its failures
    /// propagate. The Bakong fallback is consulted only when the primary
    /// result is not `PAID`, and its result is merged without downgrading.
    pub async fn check_bakong_payment_status(
        &self,
        md5: &str,
    ) -> Result<PaymentStatusResult, ClientError> {
        let md5 = md5.trim();
        if md5.is_empty() {
            return Err(ConfigurationError::MissingMd5.into());
        }

        let primary = self.status.check(md5).await?;
        if primary.status == PaymentStatus::Paid {
            return Ok(primary);
        }

        let fallback = self.fallback.check_status(md5).await;
        if let Some(f) = &fallback {
            tracing::debug!(md5, primary = %primary.status, fallback = %f.status, "merging fallback status");
        }
        Ok(merge_fallback(primary, fallback))
    }
}
