//! KHQR client error types.
//!
//! Only primary-path failures are errors. Fallback failures never surface
//! here; they degrade to `None`.

use khqr_core::{ConfigurationError, KhqrError};

/// Errors from checkout and status calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The account or request cannot produce a payload. Raised before any
    /// network call.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Local payload generation failed.
    #[error(transparent)]
    Payload(KhqrError),

    /// A response was missing required fields after every known key
    /// spelling was tried.
    #[error("unexpected response from {endpoint}: {reason}")]
    UpstreamFormat { endpoint: String, reason: String },

    /// Network failure, timeout or non-2xx status. `message` is the most
    /// readable text the error body offered.
    #[error("{endpoint} failed: {message}")]
    Transport {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    /// QR image rendering failed.
    #[error("QR rendering failed: {0}")]
    Render(String),

    /// The HTTP client could not be built.
    #[error("HTTP client initialisation failed: {0}")]
    Client(#[source] reqwest::Error),
}

impl From<KhqrError> for ClientError {
    fn from(err: KhqrError) -> Self {
        match err {
            KhqrError::Configuration(c) => Self::Configuration(c),
            other => Self::Payload(other),
        }
    }
}

impl ClientError {
    /// HTTP status of a transport failure, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether the caller may reasonably retry the same call.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { status, .. } => status.map_or(true, |s| s == 429 || s >= 500),
            _ => false,
        }
    }
}
