//! Checkout orchestration against a mock checkout backend.
//!
//! | Mode | Test |
//! |------|------|
//! | Backend | `backend_*` |
//! | Local | `local_*` |

use khqr_client::{CheckoutSource, ClientError, KhqrConfig, KhqrEngine};
use khqr_core::payload::CheckoutRequest;
use khqr_core::tlv::verify_crc;
use khqr_core::{settlement_hash, ConfigurationError};
use rust_decimal::Decimal;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(amount: &str, currency: &str) -> CheckoutRequest {
    CheckoutRequest {
        plan_id: "local-3m".into(),
        amount: amount.parse().unwrap(),
        currency: currency.into(),
        order_id: "ORD-1001".into(),
    }
}

fn backend_engine(mock_server: &MockServer) -> KhqrEngine {
    let mut config = KhqrConfig::local_mock(&mock_server.uri()).unwrap();
    config.checkout_url = Some(
        format!("{}/api/khqr/checkout", mock_server.uri())
            .parse()
            .unwrap(),
    );
    KhqrEngine::new(config).unwrap()
}

fn local_engine(mock_server: &MockServer) -> KhqrEngine {
    KhqrEngine::new(KhqrConfig::local_mock(&mock_server.uri()).unwrap()).unwrap()
}

// ── Backend mode ─────────────────────────────────────────────────────

#[tokio::test]
async fn backend_response_with_nested_keys_is_parsed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/khqr/checkout"))
        .and(body_partial_json(serde_json::json!({
            "planId": "local-3m",
            "currency": "USD",
            "orderId": "ORD-1001"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "qrString": "00020101021229190015c4techhub@aclb6304ABCD",
                "hash": "backend-md5",
                "amount": "29.99",
                "currency": "USD",
                "expiresAt": 1_760_000_900_000_i64
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let engine = backend_engine(&mock_server);
    assert_eq!(engine.checkout().source(), CheckoutSource::Backend);
    let details = engine
        .generate_checkout_details(&request("29.99", "USD"))
        .await
        .unwrap();

    assert_eq!(details.source, CheckoutSource::Backend);
    assert_eq!(
        details.khqr_payload.payload,
        "00020101021229190015c4techhub@aclb6304ABCD"
    );
    assert_eq!(details.md5, "backend-md5");
    assert_eq!(details.amount, "29.99".parse::<Decimal>().unwrap());
    assert_eq!(details.currency, "USD");
    assert_eq!(details.khqr_payload.expiration_timestamp, 1_760_000_900_000);
    assert!(details.qr_code.starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn backend_image_and_missing_md5() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/khqr/checkout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "khqrPayload": { "payload": "000201010212" },
            "qrCode": "https://cdn.example.com/qr/ORD-1001.png"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let details = backend_engine(&mock_server)
        .generate_checkout_details(&request("15000", "KHR"))
        .await
        .unwrap();

    assert_eq!(details.qr_code, "https://cdn.example.com/qr/ORD-1001.png");
    assert_eq!(details.md5, settlement_hash("000201010212"));
    assert_eq!(details.khqr_payload.md5.as_deref(), Some(details.md5.as_str()));
    assert_eq!(details.amount, Decimal::from(15000));
    assert_eq!(details.currency, "KHR");
}

#[tokio::test]
async fn backend_unsupported_currency_makes_no_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/khqr/checkout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let err = backend_engine(&mock_server)
        .generate_checkout_details(&request("10", "EUR"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::Configuration(ConfigurationError::UnsupportedCurrency(ref c)) if c == "EUR"
    ));
}

#[tokio::test]
async fn backend_zero_amount_makes_no_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/khqr/checkout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let err = backend_engine(&mock_server)
        .generate_checkout_details(&request("0", "USD"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::Configuration(ConfigurationError::NonPositiveAmount(_))
    ));
}

#[tokio::test]
async fn backend_without_payload_is_upstream_format_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/khqr/checkout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "md5": "abc" }
        })))
        .mount(&mock_server)
        .await;

    let err = backend_engine(&mock_server)
        .generate_checkout_details(&request("29.99", "USD"))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::UpstreamFormat { .. }));
}

#[tokio::test]
async fn backend_error_message_is_extracted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/khqr/checkout"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "error": "internal",
            "message": "Checkout backend is down"
        })))
        .mount(&mock_server)
        .await;

    let err = backend_engine(&mock_server)
        .generate_checkout_details(&request("29.99", "USD"))
        .await
        .unwrap_err();

    match err {
        ClientError::Transport {
            status, message, ..
        } => {
            assert_eq!(status, Some(500));
            assert_eq!(message, "Checkout backend is down");
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

// ── Local mode ───────────────────────────────────────────────────────

#[tokio::test]
async fn local_checkout_builds_and_renders() {
    let mock_server = MockServer::start().await;
    let engine = local_engine(&mock_server);
    assert_eq!(engine.checkout().source(), CheckoutSource::Local);

    let details = engine
        .generate_checkout_details(&request("29.99", "USD"))
        .await
        .unwrap();

    assert_eq!(details.source, CheckoutSource::Local);
    assert!(verify_crc(&details.khqr_payload.payload));
    assert!(details.khqr_payload.payload.contains("540529.99"));
    assert_eq!(details.md5, settlement_hash(&details.khqr_payload.payload));
    assert!(details.qr_code.starts_with("data:image/png;base64,"));
    assert_eq!(
        details.khqr_payload.expiration_timestamp - details.khqr_payload.creation_timestamp,
        15 * 60_000
    );
}

#[tokio::test]
async fn local_checkout_is_fresh_each_call() {
    let mock_server = MockServer::start().await;
    let engine = local_engine(&mock_server);
    let req = request("29.99", "USD");

    let first = engine.generate_checkout_details(&req).await.unwrap();
    let second = engine.generate_checkout_details(&req).await.unwrap();

    assert_eq!(first.amount, second.amount);
    assert_eq!(first.currency, second.currency);
    assert_ne!(
        first.khqr_payload.creation_timestamp,
        second.khqr_payload.creation_timestamp
    );
    assert_ne!(first.md5, second.md5);
}

#[tokio::test]
async fn local_checkout_without_account_fails_early() {
    let mock_server = MockServer::start().await;
    let mut config = KhqrConfig::local_mock(&mock_server.uri()).unwrap();
    config.account.account_id = None;

    let err = KhqrEngine::new(config)
        .unwrap()
        .generate_checkout_details(&request("29.99", "USD"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::Configuration(ConfigurationError::MissingAccountId)
    ));
}
