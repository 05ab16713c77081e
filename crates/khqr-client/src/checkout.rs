//! # Checkout Orchestrator
//!
//! Turns a [`CheckoutRequest`] into [`CheckoutDetails`] in one of two modes:
//!
//! | Mode | Selected by | Payload | QR image |
//! |------|-------------|---------|----------|
//! | Backend | `KHQR_CHECKOUT_URL` set | `POST {checkout_url}` | backend's if usable, else local |
//! | Local | `KHQR_CHECKOUT_URL` unset | [`PayloadBuilder`] | always local |
//!
//! Amount and currency are validated before either mode runs, so an
//! unsupported currency never reaches the network.
//!
//! ## Backend response shapes
//!
//! Each logical field has an ordered list of accessor paths (the `*_PATHS`
//! constants below). The first non-empty value wins; the request's own
//! values are the last resort for amount and currency.

use khqr_core::lookup::{first_decimal, first_string, get_path, FieldPath};
use khqr_core::payload::{CheckoutRequest, KhqrPayload, MerchantAccount, PayloadBuilder};
use khqr_core::temporal::{fresh_creation_ms, now_ms, parse_epoch_ms};
use khqr_core::{settlement_hash, Currency};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::ClientError;
use crate::http::post_json;
use crate::qr::{is_usable_image, render_data_url};

/// Payload string.
pub const PAYLOAD_PATHS: &[FieldPath] = &[
    &["payload"],
    &["qr"],
    &["qrString"],
    &["khqr"],
    &["khqrPayload"],
    &["khqrPayload", "payload"],
    &["data", "payload"],
    &["data", "qr"],
    &["data", "qrString"],
    &["data", "khqrPayload", "payload"],
];

/// Settlement hash.
pub const MD5_PATHS: &[FieldPath] = &[
    &["md5"],
    &["hash"],
    &["khqrPayload", "md5"],
    &["data", "md5"],
    &["data", "hash"],
    &["data", "khqrPayload", "md5"],
];

/// Confirmed amount.
pub const AMOUNT_PATHS: &[FieldPath] = &[
    &["amount"],
    &["data", "amount"],
    &["transaction", "amount"],
    &["khqrPayload", "amount"],
];

/// Confirmed currency.
pub const CURRENCY_PATHS: &[FieldPath] = &[
    &["currency"],
    &["data", "currency"],
    &["transaction", "currency"],
    &["khqrPayload", "currency"],
];

/// Creation time.
pub const CREATED_PATHS: &[FieldPath] = &[
    &["creationTimestamp"],
    &["createdAt"],
    &["khqrPayload", "creationTimestamp"],
    &["data", "creationTimestamp"],
    &["data", "createdAt"],
];

/// Expiration time.
pub const EXPIRES_PATHS: &[FieldPath] = &[
    &["expirationTimestamp"],
    &["expiresAt"],
    &["expiry"],
    &["khqrPayload", "expirationTimestamp"],
    &["data", "expirationTimestamp"],
    &["data", "expiresAt"],
];

/// Ready-made QR image.
pub const QR_IMAGE_PATHS: &[FieldPath] = &[
    &["qrCode"],
    &["qrImage"],
    &["qr_image"],
    &["image"],
    &["data", "qrCode"],
    &["data", "qrImage"],
];

/// Where a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutSource {
    /// Built by the checkout backend.
    Backend,
    /// Built in-process.
    Local,
}

/// Everything the storefront needs to show a payment screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutDetails {
    /// The payload and its timestamps.
    pub khqr_payload: KhqrPayload,
    /// Displayable QR image (data URL or http(s) URL).
    pub qr_code: String,
    /// Settlement hash used for status checks.
    pub md5: String,
    /// Amount as confirmed by whichever side built the payload.
    pub amount: Decimal,
    /// Currency as confirmed by whichever side built the payload.
    pub currency: String,
    /// Plan the checkout is for.
    pub plan_id: String,
    /// Storefront order id.
    pub order_id: String,
    /// Backend or local.
    pub source: CheckoutSource,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BackendCheckoutRequest<'a> {
    plan_id: &'a str,
    amount: f64,
    currency: &'a str,
    order_id: &'a str,
}

/// Builds checkout details, locally or through a backend.
#[derive(Debug, Clone)]
pub struct CheckoutClient {
    http: reqwest::Client,
    checkout_url: Option<Url>,
    account: MerchantAccount,
    builder: PayloadBuilder,
}

impl CheckoutClient {
    pub(crate) fn new(
        http: reqwest::Client,
        checkout_url: Option<Url>,
        account: MerchantAccount,
        builder: PayloadBuilder,
    ) -> Self {
        Self {
            http,
            checkout_url,
            account,
            builder,
        }
    }

    /// Which mode this client runs in.
    pub fn source(&self) -> CheckoutSource {
        if self.checkout_url.is_some() {
            CheckoutSource::Backend
        } else {
            CheckoutSource::Local
        }
    }

    /// Produce checkout details for `request`.
    pub async fn generate(&self, request: &CheckoutRequest) -> Result<CheckoutDetails, ClientError> {
        let currency = request.validate()?;
        match &self.checkout_url {
            Some(url) => self.generate_remote(url, request, currency).await,
            None => self.generate_local(request, currency),
        }
    }

    fn generate_local(
        &self,
        request: &CheckoutRequest,
        currency: Currency,
    ) -> Result<CheckoutDetails, ClientError> {
        let payload = self.builder.build(&self.account, request)?;
        let qr_code = render_data_url(&payload.payload)?;
        let md5 = payload
            .md5
            .clone()
            .unwrap_or_else(|| settlement_hash(&payload.payload));

        Ok(CheckoutDetails {
            khqr_payload: KhqrPayload {
                md5: Some(md5.clone()),
                ..payload
            },
            qr_code,
            md5,
            amount: request.amount,
            currency: currency.alpha_code().to_string(),
            plan_id: request.plan_id.clone(),
            order_id: request.order_id.clone(),
            source: CheckoutSource::Local,
        })
    }

    async fn generate_remote(
        &self,
        url: &Url,
        request: &CheckoutRequest,
        currency: Currency,
    ) -> Result<CheckoutDetails, ClientError> {
        let endpoint = "POST checkout";
        let amount = request
            .amount
            .to_f64()
            .ok_or_else(|| ClientError::UpstreamFormat {
                endpoint: endpoint.into(),
                reason: format!("amount {} has no JSON number form", request.amount),
            })?;
        let body = BackendCheckoutRequest {
            plan_id: &request.plan_id,
            amount,
            currency: currency.alpha_code(),
            order_id: &request.order_id,
        };

        tracing::debug!(plan_id = %request.plan_id, order_id = %request.order_id, "requesting backend checkout");
        let response = post_json(&self.http, url.as_str(), endpoint, &body, None).await?;
        self.details_from_response(&response, request, currency, endpoint)
    }

    fn details_from_response(
        &self,
        response: &Value,
        request: &CheckoutRequest,
        currency: Currency,
        endpoint: &str,
    ) -> Result<CheckoutDetails, ClientError> {
        let payload = first_string(response, PAYLOAD_PATHS).ok_or_else(|| {
            ClientError::UpstreamFormat {
                endpoint: endpoint.to_string(),
                reason: "no KHQR payload in response".to_string(),
            }
        })?;

        let md5 = first_string(response, MD5_PATHS).unwrap_or_else(|| settlement_hash(&payload));
        let creation_timestamp =
            first_timestamp_ms(response, CREATED_PATHS, now_ms()).unwrap_or_else(fresh_creation_ms);
        let expiration_timestamp = first_timestamp_ms(response, EXPIRES_PATHS, creation_timestamp)
            .unwrap_or_else(|| {
                creation_timestamp + i64::from(self.builder.expiry_minutes()) * 60_000
            });

        let qr_code = match first_string(response, QR_IMAGE_PATHS).filter(|q| is_usable_image(q)) {
            Some(image) => image,
            None => render_data_url(&payload)?,
        };

        Ok(CheckoutDetails {
            khqr_payload: KhqrPayload {
                payload,
                md5: Some(md5.clone()),
                creation_timestamp,
                expiration_timestamp,
            },
            qr_code,
            md5,
            amount: first_decimal(response, AMOUNT_PATHS).unwrap_or(request.amount),
            currency: first_string(response, CURRENCY_PATHS)
                .unwrap_or_else(|| currency.alpha_code().to_string()),
            plan_id: request.plan_id.clone(),
            order_id: request.order_id.clone(),
            source: CheckoutSource::Backend,
        })
    }
}

/// First parseable timestamp under `paths`. Relative values count from
/// `reference_ms`.
fn first_timestamp_ms(root: &Value, paths: &[FieldPath], reference_ms: i64) -> Option<i64> {
    paths
        .iter()
        .filter_map(|path| get_path(root, path))
        .find_map(|v| parse_epoch_ms(v, reference_ms))
}
