//! # Bakong Open API Fallback
//!
//! Secondary verification against the Bakong Open API, consulted only when
//! the primary backend is inconclusive. Every failure here degrades to
//! "no additional information": methods return `None` (or an empty list)
//! and log a warning.
//!
//! ## Token session
//!
//! ```text
//!   NoToken ──ensure_auth──▶ LoggingIn ──ok──▶ TokenCached
//!      ▲                        │                  │
//!      └──────── failure ───────┘        expiry ≤ 5 s away
//!      ▲                                           ▼
//!      └──────────── 401 / invalidate ──── TokenExpired
//! ```
//!
//! Concurrent callers that find no usable token share one in-flight login
//! (a [`Shared`] future held in the session). Only the flight that is still
//! current when it settles may write its result back.
//!
//! A configured static token bypasses the session entirely and never
//! expires.
//!
//! ## Endpoints
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST | `/login` | Obtain a bearer token |
//! | POST | `/check_transaction_by_md5` | Status of one hash |
//! | POST | `/check_transaction_by_md5_list` | Status of up to 50 hashes |

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use khqr_core::lookup::{first_i64, first_string, get_path, FieldPath};
use khqr_core::status::{interpret_status_response, normalize_status_text, PaymentStatus, PaymentStatusResult};
use khqr_core::temporal::{now_ms, parse_epoch_ms};
use khqr_core::ConfigurationError;
use parking_lot::Mutex;
use serde_json::{json, Value};
use url::Url;
use zeroize::Zeroizing;

use crate::error::ClientError;
use crate::http::{endpoint_url, post_json};

/// A cached token is reused only while its expiry is further away than this.
pub const TOKEN_EXPIRY_SKEW_MS: i64 = 5_000;

/// Provider limit for bulk hash checks.
pub const MAX_BULK_HASHES: usize = 50;

/// Bearer token locations in a login response.
pub const TOKEN_PATHS: &[FieldPath] = &[
    &["token"],
    &["accessToken"],
    &["access_token"],
    &["data", "token"],
    &["data", "accessToken"],
    &["data", "access_token"],
];

/// Expiry locations in a login response.
pub const EXPIRY_PATHS: &[FieldPath] = &[
    &["expiresAt"],
    &["expires_at"],
    &["expiresIn"],
    &["expires_in"],
    &["expiry"],
    &["data", "expiresAt"],
    &["data", "expires_at"],
    &["data", "expiresIn"],
    &["data", "expires_in"],
    &["data", "expiry"],
];

// ── Token ───────────────────────────────────────────────────────────

/// A bearer token for the fallback provider.
///
/// `expires_at == None` means "valid until a 401 says otherwise".
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    value: Zeroizing<String>,
    expires_at: Option<i64>,
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AuthToken {
    /// Wrap a token value and optional expiry (epoch milliseconds).
    pub fn new(value: impl Into<String>, expires_at: Option<i64>) -> Self {
        Self {
            value: Zeroizing::new(value.into()),
            expires_at,
        }
    }

    /// The bearer value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Expiry, epoch milliseconds.
    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    /// Whether the token may be used at `now_ms`.
    pub fn is_usable_at(&self, now_ms: i64) -> bool {
        self.expires_at
            .map_or(true, |exp| exp - now_ms > TOKEN_EXPIRY_SKEW_MS)
    }
}

// ── Session ─────────────────────────────────────────────────────────

type LoginFlight = Shared<BoxFuture<'static, Option<AuthToken>>>;

enum SessionState {
    Empty,
    Authenticating { generation: u64, flight: LoginFlight },
    Valid(AuthToken),
}

/// Observable lifecycle of an [`AuthSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// No token and no login in flight.
    NoToken,
    /// A login is in flight.
    LoggingIn,
    /// A usable token is cached.
    TokenCached,
    /// A token is cached but too close to expiry to use.
    TokenExpired,
}

/// Injectable token cache with single-flight login.
///
/// One session is normally shared process-wide through an `Arc`; tests
/// construct independent instances.
pub struct AuthSession {
    state: Mutex<SessionState>,
    generation: AtomicU64,
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("phase", &self.phase())
            .finish()
    }
}

impl AuthSession {
    /// An empty session.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::Empty),
            generation: AtomicU64::new(0),
        }
    }

    /// A session seeded with `token`.
    pub fn with_token(token: AuthToken) -> Self {
        Self {
            state: Mutex::new(SessionState::Valid(token)),
            generation: AtomicU64::new(0),
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        match &*self.state.lock() {
            SessionState::Empty => SessionPhase::NoToken,
            SessionState::Authenticating { .. } => SessionPhase::LoggingIn,
            SessionState::Valid(t) if t.is_usable_at(now_ms()) => SessionPhase::TokenCached,
            SessionState::Valid(_) => SessionPhase::TokenExpired,
        }
    }

    /// The cached token, if it is still usable.
    pub fn cached(&self) -> Option<AuthToken> {
        match &*self.state.lock() {
            SessionState::Valid(t) if t.is_usable_at(now_ms()) => Some(t.clone()),
            _ => None,
        }
    }

    /// Drop a cached token. A login in flight is left alone.
    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        if matches!(&*state, SessionState::Valid(_)) {
            *state = SessionState::Empty;
        }
    }

    /// Drop the cached token only if it is `rejected`. A newer token cached
    /// by a concurrent login survives.
    pub fn invalidate_token(&self, rejected: &AuthToken) {
        let mut state = self.state.lock();
        if matches!(&*state, SessionState::Valid(t) if t == rejected) {
            *state = SessionState::Empty;
        }
    }

    /// Return the cached token, or join (or start) the single login flight.
    ///
    /// `login` is only called when this caller starts a new flight.
    pub async fn get_or_login<F, Fut>(&self, login: F) -> Option<AuthToken>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<AuthToken>> + Send + 'static,
    {
        let (generation, flight) = {
            let mut state = self.state.lock();
            match &*state {
                SessionState::Valid(t) if t.is_usable_at(now_ms()) => return Some(t.clone()),
                SessionState::Authenticating { generation, flight } => (*generation, flight.clone()),
                SessionState::Empty | SessionState::Valid(_) => {
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
                    let flight = login().boxed().shared();
                    *state = SessionState::Authenticating {
                        generation,
                        flight: flight.clone(),
                    };
                    (generation, flight)
                }
            }
        };

        let result = flight.await;

        let mut state = self.state.lock();
        let current = matches!(
            &*state,
            SessionState::Authenticating { generation: g, .. } if *g == generation
        );
        if current {
            *state = match &result {
                Some(token) => SessionState::Valid(token.clone()),
                None => SessionState::Empty,
            };
        }
        result
    }
}

// ── Client ──────────────────────────────────────────────────────────

#[derive(Clone)]
struct Credentials {
    username: String,
    password: Zeroizing<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Client for the Bakong Open API fallback.
#[derive(Debug, Clone)]
pub struct FallbackClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Option<Credentials>,
    static_token: Option<AuthToken>,
    session: Arc<AuthSession>,
}

impl FallbackClient {
    pub(crate) fn new(
        http: reqwest::Client,
        base_url: Url,
        username: Option<String>,
        password: Option<Zeroizing<String>>,
        static_token: Option<Zeroizing<String>>,
        session: Arc<AuthSession>,
    ) -> Self {
        let credentials = match (username, password) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            _ => None,
        };
        Self {
            http,
            base_url,
            credentials,
            static_token: static_token.map(|t| AuthToken::new(t.as_str(), None)),
            session,
        }
    }

    /// The token session this client uses.
    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    /// Whether a static token or login credentials are configured.
    pub fn is_configured(&self) -> bool {
        self.static_token.is_some() || self.credentials.is_some()
    }

    /// A usable token: the static one, a cached one, or a fresh login.
    pub async fn ensure_auth(&self) -> Option<AuthToken> {
        if let Some(token) = &self.static_token {
            return Some(token.clone());
        }
        let Some(credentials) = self.credentials.clone() else {
            tracing::debug!("Bakong fallback has no credentials; skipping");
            return None;
        };
        let http = self.http.clone();
        let url = endpoint_url(&self.base_url, "login");
        self.session
            .get_or_login(move || login_request(http, url, credentials))
            .await
    }

    /// Force a fresh login, discarding any cached token.
    pub async fn login(&self) -> Option<AuthToken> {
        self.session.invalidate();
        self.ensure_auth().await
    }

    /// Check one hash. `None` means the fallback had nothing to add.
    ///
    /// Calls `POST {base_url}/check_transaction_by_md5`.
    pub async fn check_status(&self, md5: &str) -> Option<PaymentStatusResult> {
        let endpoint = "POST /check_transaction_by_md5";
        let md5 = md5.trim();
        if md5.is_empty() {
            return None;
        }
        let token = self.ensure_auth().await?;
        let url = endpoint_url(&self.base_url, "check_transaction_by_md5");

        match post_json(&self.http, &url, endpoint, &json!({ "md5": md5 }), Some(token.value())).await {
            Ok(body) => Some(interpret_status_response(&body, md5, now_ms())),
            Err(e) => {
                self.degrade(endpoint, &e, &token);
                None
            }
        }
    }

    /// Hashes among `md5s` that Bakong reports as paid.
    ///
    /// Calls `POST {base_url}/check_transaction_by_md5_list`. Blank entries
    /// are dropped; more than [`MAX_BULK_HASHES`] remaining is an error.
    pub async fn check_bulk(&self, md5s: &[String]) -> Result<Vec<String>, ConfigurationError> {
        let endpoint = "POST /check_transaction_by_md5_list";
        let hashes: Vec<&str> = md5s.iter().map(|h| h.trim()).filter(|h| !h.is_empty()).collect();
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        if hashes.len() > MAX_BULK_HASHES {
            return Err(ConfigurationError::TooManyHashes {
                max: MAX_BULK_HASHES,
                got: hashes.len(),
            });
        }

        let Some(token) = self.ensure_auth().await else {
            return Ok(Vec::new());
        };
        let url = endpoint_url(&self.base_url, "check_transaction_by_md5_list");

        let body = match post_json(&self.http, &url, endpoint, &hashes, Some(token.value())).await {
            Ok(body) => body,
            Err(e) => {
                self.degrade(endpoint, &e, &token);
                return Ok(Vec::new());
            }
        };

        if first_i64(&body, &[&["responseCode"]]) != Some(0) {
            return Ok(Vec::new());
        }
        let paid = get_path(&body, &["data"])
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| {
                        first_string(item, &[&["status"]])
                            .and_then(|s| normalize_status_text(&s))
                            == Some(PaymentStatus::Paid)
                    })
                    .filter_map(|item| first_string(item, &[&["md5"]]))
                    .collect()
            })
            .unwrap_or_default();
        Ok(paid)
    }

    fn degrade(&self, endpoint: &str, err: &ClientError, token: &AuthToken) {
        if err.status() == Some(401) {
            if self.static_token.is_some() {
                tracing::warn!(endpoint, "Bakong rejected the static token");
            } else {
                tracing::warn!(endpoint, "Bakong token rejected; clearing cached token");
                self.session.invalidate_token(token);
            }
            return;
        }
        tracing::warn!(endpoint, error = %err, "Bakong fallback unavailable");
    }
}

/// Post credentials and extract a token. Every failure is `None`.
async fn login_request(
    http: reqwest::Client,
    url: String,
    credentials: Credentials,
) -> Option<AuthToken> {
    let endpoint = "POST /login";
    let body = json!({
        "username": credentials.username,
        "password": credentials.password.as_str(),
    });

    let response = match post_json(&http, &url, endpoint, &body, None).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(endpoint, error = %e, "Bakong login failed");
            return None;
        }
    };

    let Some(value) = first_string(&response, TOKEN_PATHS) else {
        tracing::warn!(endpoint, "Bakong login response carried no token");
        return None;
    };
    let now = now_ms();
    let expires_at = EXPIRY_PATHS
        .iter()
        .filter_map(|path| get_path(&response, path))
        .find_map(|v| parse_epoch_ms(v, now));

    tracing::debug!(endpoint, expires_at = ?expires_at, "Bakong login succeeded");
    Some(AuthToken::new(value, expires_at))
}
