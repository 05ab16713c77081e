//! Shared HTTP plumbing: client construction, URL joining, JSON POSTs and
//! error-message extraction.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::error::ClientError;

/// Bodies longer than this are not shown to users verbatim.
const MAX_PLAIN_MESSAGE_LEN: usize = 200;

/// Keys searched for a readable message in an error body, in order.
const ERROR_MESSAGE_KEYS: &[&str] = &[
    "message",
    "error_description",
    "error",
    "responseMessage",
];

pub(crate) fn build_http(timeout_secs: u64) -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("khqr-client/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ClientError::Client)
}

/// Join `path` onto `base` without doubling or dropping slashes.
pub(crate) fn endpoint_url(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Readable message from an error body.
///
/// Preference order: the body itself if it is a JSON string or short plain
/// text, then `message`, `error_description`, `error` (or `error.message`)
/// and `responseMessage`.
pub fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(s)) => non_blank(&s),
        Ok(Value::Object(map)) => ERROR_MESSAGE_KEYS.iter().find_map(|key| match map.get(*key)? {
            Value::String(s) => non_blank(s),
            Value::Object(nested) => nested.get("message").and_then(Value::as_str).and_then(non_blank),
            _ => None,
        }),
        Ok(_) => None,
        Err(_) => (trimmed.chars().count() <= MAX_PLAIN_MESSAGE_LEN && !trimmed.starts_with('<'))
            .then(|| trimmed.to_string()),
    }
}

fn non_blank(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

pub(crate) fn transport_error(endpoint: &str, err: &reqwest::Error) -> ClientError {
    let message = if err.is_timeout() {
        "the request timed out".to_string()
    } else if err.is_connect() {
        "the service could not be reached".to_string()
    } else {
        err.to_string()
    };
    ClientError::Transport {
        endpoint: endpoint.to_string(),
        status: err.status().map(|s| s.as_u16()),
        message,
    }
}

/// POST a JSON body and decode a JSON response.
///
/// Non-2xx responses become [`ClientError::Transport`] carrying the status
/// code and the extracted message. A 2xx body that is not JSON is
/// [`ClientError::UpstreamFormat`].
pub(crate) async fn post_json<B: Serialize + ?Sized>(
    http: &reqwest::Client,
    url: &str,
    endpoint: &str,
    body: &B,
    bearer: Option<&str>,
) -> Result<Value, ClientError> {
    let mut request = http.post(url).json(body);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    let resp = request
        .send()
        .await
        .map_err(|e| transport_error(endpoint, &e))?;

    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| transport_error(endpoint, &e))?;

    if !status.is_success() {
        let message = extract_error_message(&text)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        tracing::debug!(endpoint, status = status.as_u16(), %message, "upstream returned an error");
        return Err(ClientError::Transport {
            endpoint: endpoint.to_string(),
            status: Some(status.as_u16()),
            message,
        });
    }

    serde_json::from_str(&text).map_err(|e| ClientError::UpstreamFormat {
        endpoint: endpoint.to_string(),
        reason: format!("response is not JSON: {e}"),
    })
}
