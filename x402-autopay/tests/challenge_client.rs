mod common;

use std::time::Duration;

use axum::{Router, http::StatusCode, routing::get};
use common::*;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use x402_autopay::errors::ProtocolError;
use x402_autopay_core::{errors::ErrorKind, types::AmountValue};
use x402_autopay_paywall::paywall::{ChallengeEncoding, PayWall};

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_pays_json_header_challenge() {
    let resource = spawn(paywall(10_000)).await;
    let payer = SigningPayer::default();
    let client = client(payer.clone());

    let result = client
        .fetch(&resource.endpoint(), Some(AmountValue(10_000)))
        .await
        .unwrap();

    assert!(result.ok);
    assert_eq!(result.status, 200);
    assert!(result.paid);
    assert!(result.authorization_echoed);
    assert!(result.authorization_ref.is_some());
    assert_eq!(result.body["status"], "active");
    assert_eq!(result.body["subscription"], "Test Service");

    assert_eq!(payer.calls(), 1);
    assert_eq!(resource.counters.total(), 2);
    assert_eq!(resource.counters.challenged(), 1);
    assert_eq!(resource.counters.paid(), 1);
}

#[tokio::test]
async fn test_pays_base64_and_body_challenges() {
    for encoding in [ChallengeEncoding::Base64Header, ChallengeEncoding::Body] {
        let resource = spawn(paywall_with(500, encoding, 60_000)).await;
        let result = client(SigningPayer::default())
            .fetch(&resource.endpoint(), None)
            .await
            .unwrap();

        assert!(result.ok, "{encoding:?}");
        assert!(result.paid, "{encoding:?}");
        assert_eq!(resource.counters.paid(), 1, "{encoding:?}");
    }
}

#[tokio::test]
async fn test_unchallenged_response_passes_through() {
    let base = serve(
        Router::new()
            .route("/free", get(|| async { axum::Json(json!({ "free": true })) }))
            .route("/text", get(|| async { "plain words" }))
            .route(
                "/missing",
                get(|| async { (StatusCode::NOT_FOUND, "no such thing") }),
            ),
    )
    .await;
    let payer = SigningPayer::default();
    let client = client(payer.clone());

    let free = client.fetch(&format!("{base}/free"), None).await.unwrap();
    assert!(free.ok);
    assert!(!free.paid);
    assert_eq!(free.body, json!({ "free": true }));

    let text = client.fetch(&format!("{base}/text"), None).await.unwrap();
    assert_eq!(text.body, json!("plain words"));

    let missing = client.fetch(&format!("{base}/missing"), None).await.unwrap();
    assert!(!missing.ok);
    assert_eq!(missing.status, 404);
    assert!(!missing.paid);

    assert_eq!(payer.calls(), 0);
}

#[tokio::test]
async fn test_expired_requirements_are_not_paid() {
    let resource = spawn(paywall_with(10_000, ChallengeEncoding::JsonHeader, -1_000)).await;
    let payer = SigningPayer::default();

    let err = client(payer.clone())
        .fetch(&resource.endpoint(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, ProtocolError::RequirementsRejected(_)));
    assert_eq!(err.kind(), ErrorKind::RequirementsRejected);
    assert_eq!(payer.calls(), 0);
    assert_eq!(resource.counters.total(), 1);
    assert_eq!(resource.counters.paid(), 0);
}

#[tokio::test]
async fn test_amount_over_cap_is_not_paid() {
    let resource = spawn(paywall(20_000)).await;
    let payer = SigningPayer::default();

    let err = client(payer.clone())
        .fetch(&resource.endpoint(), Some(AmountValue(10_000)))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RequirementsRejected);
    assert_eq!(payer.calls(), 0);
    assert_eq!(resource.counters.total(), 1);
}

#[tokio::test]
async fn test_second_challenge_is_rejection() {
    let paywall = PayWall::builder()
        .amount(10_000u64)
        .token(TOKEN)
        .recipient(TOKEN)
        .chain("local")
        .reject_payments(true)
        .build();
    let resource = spawn(paywall).await;
    let payer = SigningPayer::default();

    let err = client(payer.clone())
        .fetch(&resource.endpoint(), None)
        .await
        .unwrap_err();

    let ProtocolError::PaymentRejected { status, ref message } = err else {
        panic!("expected a rejection, got {err:?}");
    };
    assert_eq!(status, 402);
    assert!(message.starts_with("payment required again"));
    assert_eq!(err.status(), Some(402));
    assert_eq!(payer.calls(), 1);
    assert_eq!(resource.counters.total(), 2);
}

#[tokio::test]
async fn test_malformed_challenge() {
    let base = serve(Router::new().route(
        "/broken",
        get(|| async {
            (
                StatusCode::PAYMENT_REQUIRED,
                [("x-payment-required", "{not json")],
                "pay up",
            )
        }),
    ))
    .await;
    let payer = SigningPayer::default();

    let err = client(payer.clone())
        .fetch(&format!("{base}/broken"), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MalformedChallenge);
    assert_eq!(payer.calls(), 0);
}

#[tokio::test]
async fn test_refusing_payer() {
    let resource = spawn(paywall(10_000)).await;

    let err = client(RefusingPayer)
        .fetch(&resource.endpoint(), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthorizationDenied);
    assert!(err.to_string().contains("user declined"));
    assert_eq!(resource.counters.total(), 1);
}

#[tokio::test]
async fn test_cancelled_authorization_sends_no_retry() {
    let resource = spawn(paywall(10_000)).await;
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = client(StuckPayer)
        .fetch_with_cancellation(&resource.endpoint(), None, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, ProtocolError::Cancelled));
    assert_eq!(err.kind(), ErrorKind::AuthorizationDenied);
    assert_eq!(resource.counters.total(), 1);
}

#[tokio::test]
async fn test_unreachable_endpoint() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(SigningPayer::default())
        .fetch(&format!("http://{addr}/gone"), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NetworkError);

    let err = client(SigningPayer::default())
        .fetch("not a url", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NetworkError);
}
