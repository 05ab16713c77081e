//! Primary status backend client.
//!
//! Calls `POST {status_url}/bakong/status` with `{"md5": ...}`. Failures
//! propagate to the caller; there are no automatic retries.

use khqr_core::status::{interpret_status_response, PaymentStatusResult};
use khqr_core::temporal::now_ms;
use serde_json::json;
use url::Url;

use crate::error::ClientError;
use crate::http::{endpoint_url, post_json};

/// Path of the status endpoint under the backend base URL.
pub const STATUS_PATH: &str = "bakong/status";

/// Client for the primary status backend.
#[derive(Debug, Clone)]
pub struct StatusClient {
    http: reqwest::Client,
    base_url: Url,
}

impl StatusClient {
    pub(crate) fn new(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// Check one settlement hash.
    ///
    /// Calls `POST {base_url}/bakong/status`.
    pub async fn check(&self, md5: &str) -> Result<PaymentStatusResult, ClientError> {
        let endpoint = "POST /bakong/status";
        let url = endpoint_url(&self.base_url, STATUS_PATH);

        let body = post_json(&self.http, &url, endpoint, &json!({ "md5": md5 }), None).await?;
        if !body.is_object() {
            return Err(ClientError::UpstreamFormat {
                endpoint: endpoint.into(),
                reason: "status response is not a JSON object".into(),
            });
        }
        Ok(interpret_status_response(&body, md5, now_ms()))
    }
}
