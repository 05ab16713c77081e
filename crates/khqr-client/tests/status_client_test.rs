//! Status reconciliation against a mock primary backend and a mock Bakong
//! Open API.
//!
//! ## Endpoints
//!
//! | Method | Path | Role |
//! |--------|------|------|
//! | POST | `/bakong/status` | Primary backend |
//! | POST | `/login` | Bakong login |
//! | POST | `/check_transaction_by_md5` | Bakong fallback |
//! | POST | `/check_transaction_by_md5_list` | Bakong bulk check |

use std::sync::Arc;

use khqr_client::{AuthSession, AuthToken, ClientError, KhqrConfig, KhqrEngine, SessionPhase};
use khqr_core::{ConfigurationError, PaymentStatus};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

fn engine(mock_server: &MockServer) -> KhqrEngine {
    KhqrEngine::new(KhqrConfig::local_mock(&mock_server.uri()).unwrap()).unwrap()
}

fn engine_with_session(mock_server: &MockServer, session: Arc<AuthSession>) -> KhqrEngine {
    KhqrEngine::with_session(KhqrConfig::local_mock(&mock_server.uri()).unwrap(), session).unwrap()
}

async fn mount_primary(mock_server: &MockServer, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/bakong/status"))
        .and(body_json(json!({ "md5": MD5 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(mock_server)
        .await;
}

async fn mount_login(mock_server: &MockServer, token: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({ "username": "tester", "password": "secret" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "responseCode": 0,
            "data": { "token": token, "expiresIn": 3600 }
        })))
        .expect(times)
        .mount(mock_server)
        .await;
}

fn bakong_paid() -> serde_json::Value {
    json!({
        "responseCode": 0,
        "responseMessage": "Success",
        "errorCode": null,
        "data": {
            "hash": "f0e1d2",
            "fromAccountId": "payer@aclb",
            "toAccountId": "c4techhub@aclb",
            "currency": "USD",
            "amount": 29.99,
            "createdDateMs": 1_760_000_000_000_i64,
            "acknowledgedDateMs": 1_760_000_004_000_i64
        }
    })
}

fn bakong_not_found() -> serde_json::Value {
    json!({
        "responseCode": 1,
        "responseMessage": "Transaction could not be found. Please check and try again.",
        "errorCode": 11,
        "data": null
    })
}

// ── Primary path ─────────────────────────────────────────────────────

#[tokio::test]
async fn primary_paid_skips_fallback() {
    let mock_server = MockServer::start().await;
    mount_primary(
        &mock_server,
        json!({
            "status": "PAID",
            "responseCode": 0,
            "data": { "hash": "f0e1d2", "amount": 29.99 },
            "raw": bakong_paid()
        }),
    )
    .await;
    mount_login(&mock_server, "unused", 0).await;

    let result = engine(&mock_server)
        .check_bakong_payment_status(MD5)
        .await
        .unwrap();

    assert_eq!(result.status, PaymentStatus::Paid);
    assert_eq!(result.md5, MD5);
    assert!(result.checked_at > 0);
}

#[tokio::test]
async fn primary_error_message_is_surfaced() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bakong/status"))
        .respond_with(ResponseTemplate::new(502).set_body_json(json!({
            "status": "UNPAID",
            "responseCode": -1,
            "message": "Unable to check Bakong payment status. Please try again later."
        })))
        .mount(&mock_server)
        .await;

    let err = engine(&mock_server)
        .check_bakong_payment_status(MD5)
        .await
        .unwrap_err();

    match err {
        ClientError::Transport {
            status, message, ..
        } => {
            assert_eq!(status, Some(502));
            assert_eq!(
                message,
                "Unable to check Bakong payment status. Please try again later."
            );
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn blank_md5_is_rejected() {
    let mock_server = MockServer::start().await;
    let err = engine(&mock_server)
        .check_bakong_payment_status("   ")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Configuration(ConfigurationError::MissingMd5)
    ));
}

// ── Fallback merge ───────────────────────────────────────────────────

#[tokio::test]
async fn fallback_paid_replaces_pending_primary() {
    let mock_server = MockServer::start().await;
    mount_primary(&mock_server, json!({ "status": "PENDING", "message": "waiting for payer" })).await;
    mount_login(&mock_server, "fresh-token", 1).await;

    Mock::given(method("POST"))
        .and(path("/check_transaction_by_md5"))
        .and(header("authorization", "Bearer fresh-token"))
        .and(body_json(json!({ "md5": MD5 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(bakong_paid()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = engine(&mock_server)
        .check_bakong_payment_status(MD5)
        .await
        .unwrap();

    assert_eq!(result.status, PaymentStatus::Paid);
    assert_eq!(result.message.as_deref(), Some("Success"));
    assert_eq!(result.data.unwrap()["fromAccountId"], "payer@aclb");
}

#[tokio::test]
async fn weak_paid_primary_is_not_demoted_by_not_found() {
    let mock_server = MockServer::start().await;
    mount_primary(&mock_server, json!({ "status": "PAID" })).await;
    mount_login(&mock_server, "fresh-token", 1).await;

    Mock::given(method("POST"))
        .and(path("/check_transaction_by_md5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bakong_not_found()))
        .mount(&mock_server)
        .await;

    let result = engine(&mock_server)
        .check_bakong_payment_status(MD5)
        .await
        .unwrap();

    assert_eq!(result.status, PaymentStatus::Pending);
    assert!(result
        .message
        .unwrap()
        .starts_with("Transaction could not be found"));
}

#[tokio::test]
async fn unknown_primary_takes_fallback_status() {
    let mock_server = MockServer::start().await;
    mount_primary(&mock_server, json!({ "state": "weird" })).await;
    mount_login(&mock_server, "fresh-token", 1).await;

    Mock::given(method("POST"))
        .and(path("/check_transaction_by_md5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bakong_not_found()))
        .mount(&mock_server)
        .await;

    let result = engine(&mock_server)
        .check_bakong_payment_status(MD5)
        .await
        .unwrap();

    assert_eq!(result.status, PaymentStatus::Unpaid);
}

#[tokio::test]
async fn fallback_failure_degrades_to_primary() {
    let mock_server = MockServer::start().await;
    mount_primary(&mock_server, json!({ "status": "PENDING" })).await;
    mount_login(&mock_server, "fresh-token", 1).await;

    Mock::given(method("POST"))
        .and(path("/check_transaction_by_md5"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = engine(&mock_server)
        .check_bakong_payment_status(MD5)
        .await
        .unwrap();

    assert_eq!(result.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn login_failure_degrades_to_primary() {
    let mock_server = MockServer::start().await;
    mount_primary(&mock_server, json!({ "status": "PENDING" })).await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Bad credentials"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/check_transaction_by_md5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bakong_paid()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let session = Arc::new(AuthSession::new());
    let result = engine_with_session(&mock_server, Arc::clone(&session))
        .check_bakong_payment_status(MD5)
        .await
        .unwrap();

    assert_eq!(result.status, PaymentStatus::Pending);
    assert_eq!(session.phase(), SessionPhase::NoToken);
}

// ── Token session ────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_checks_share_one_login() {
    let mock_server = MockServer::start().await;
    mount_primary(&mock_server, json!({ "status": "PENDING" })).await;
    mount_login(&mock_server, "fresh-token", 1).await;

    Mock::given(method("POST"))
        .and(path("/check_transaction_by_md5"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bakong_not_found()))
        .expect(2)
        .mount(&mock_server)
        .await;

    let engine = engine(&mock_server);
    let (a, b) = tokio::join!(
        engine.check_bakong_payment_status(MD5),
        engine.check_bakong_payment_status(MD5),
    );

    assert_eq!(a.unwrap().status, PaymentStatus::Pending);
    assert_eq!(b.unwrap().status, PaymentStatus::Pending);
    assert_eq!(engine.fallback().session().phase(), SessionPhase::TokenCached);
}

#[tokio::test]
async fn rejected_token_is_cleared_and_next_call_logs_in() {
    let mock_server = MockServer::start().await;
    mount_primary(&mock_server, json!({ "status": "PENDING" })).await;
    mount_login(&mock_server, "fresh-token", 1).await;

    Mock::given(method("POST"))
        .and(path("/check_transaction_by_md5"))
        .and(header("authorization", "Bearer stale-token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "responseCode": 1,
            "responseMessage": "Unauthorized",
            "errorCode": 6
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/check_transaction_by_md5"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bakong_paid()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = Arc::new(AuthSession::with_token(AuthToken::new("stale-token", None)));
    let engine = engine_with_session(&mock_server, Arc::clone(&session));

    let first = engine.check_bakong_payment_status(MD5).await.unwrap();
    assert_eq!(first.status, PaymentStatus::Pending);
    assert_eq!(session.phase(), SessionPhase::NoToken);

    let second = engine.check_bakong_payment_status(MD5).await.unwrap();
    assert_eq!(second.status, PaymentStatus::Paid);
    assert_eq!(
        session.cached().map(|t| t.value().to_string()).as_deref(),
        Some("fresh-token")
    );
}

#[tokio::test]
async fn forced_login_discards_cached_token() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "fresh-token", 1).await;

    let session = Arc::new(AuthSession::with_token(AuthToken::new("old-token", None)));
    let engine = engine_with_session(&mock_server, Arc::clone(&session));

    let token = engine.fallback().login().await.unwrap();

    assert_eq!(token.value(), "fresh-token");
    assert_eq!(
        session.cached().map(|t| t.value().to_string()).as_deref(),
        Some("fresh-token")
    );
    assert_eq!(session.phase(), SessionPhase::TokenCached);
}

#[tokio::test]
async fn static_token_skips_login() {
    let mock_server = MockServer::start().await;
    mount_primary(&mock_server, json!({ "status": "PENDING" })).await;
    mount_login(&mock_server, "unused", 0).await;

    Mock::given(method("POST"))
        .and(path("/check_transaction_by_md5"))
        .and(header("authorization", "Bearer static-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bakong_paid()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = KhqrConfig::local_mock(&mock_server.uri()).unwrap();
    config.bakong_token = Some(zeroize::Zeroizing::new("static-token".to_string()));
    let result = KhqrEngine::new(config)
        .unwrap()
        .check_bakong_payment_status(MD5)
        .await
        .unwrap();

    assert_eq!(result.status, PaymentStatus::Paid);
}

#[tokio::test]
async fn no_credentials_means_no_fallback() {
    let mock_server = MockServer::start().await;
    mount_primary(&mock_server, json!({ "status": "PENDING" })).await;
    mount_login(&mock_server, "unused", 0).await;

    let mut config = KhqrConfig::local_mock(&mock_server.uri()).unwrap();
    config.bakong_username = None;
    let engine = KhqrEngine::new(config).unwrap();

    assert!(!engine.fallback().is_configured());
    let result = engine.check_bakong_payment_status(MD5).await.unwrap();
    assert_eq!(result.status, PaymentStatus::Pending);
}

// ── Bulk check ───────────────────────────────────────────────────────

#[tokio::test]
async fn bulk_check_returns_paid_hashes() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "fresh-token", 1).await;

    Mock::given(method("POST"))
        .and(path("/check_transaction_by_md5_list"))
        .and(body_json(json!(["aaa", "bbb", "ccc"])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "responseCode": 0,
            "data": [
                { "md5": "aaa", "status": "SUCCESS", "message": null },
                { "md5": "bbb", "status": "NOT_FOUND", "message": "Transaction not found" },
                { "md5": "ccc", "status": "PAID", "message": null }
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let hashes = vec![" aaa ".to_string(), "bbb".to_string(), "".to_string(), "ccc".to_string()];
    let paid = engine(&mock_server).fallback().check_bulk(&hashes).await.unwrap();
    assert_eq!(paid, vec!["aaa".to_string(), "ccc".to_string()]);
}

#[tokio::test]
async fn bulk_check_rejects_more_than_fifty() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "unused", 0).await;

    let hashes: Vec<String> = (0..51).map(|i| format!("hash-{i}")).collect();
    let err = engine(&mock_server)
        .fallback()
        .check_bulk(&hashes)
        .await
        .unwrap_err();
    assert_eq!(err, ConfigurationError::TooManyHashes { max: 50, got: 51 });
}
