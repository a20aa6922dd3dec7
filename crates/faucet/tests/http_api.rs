// HTTP surface of the faucet
// Run with: cargo test -p evm-faucet --test http_api

mod common;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::{Extension, Router};
use common::*;
use evm_faucet::{api, ClaimApproval, FaucetConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

const PEER: &str = "192.0.2.10:51000";

fn app(config: FaucetConfig, chain: Arc<FakeChain>) -> Router {
    api::router(Arc::new(service_with(config, chain)))
}

fn get(uri: &str) -> Request<Body> {
    get_from(uri, PEER, None)
}

fn get_from(uri: &str, peer: &str, forwarded_for: Option<&str>) -> Request<Body> {
    let peer: SocketAddr = peer.parse().unwrap();
    let mut builder = Request::builder().uri(uri).extension(ConnectInfo(peer));
    if let Some(value) = forwarded_for {
        builder = builder.header("X-Forwarded-For", value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_claim_returns_json_receipt() {
    let chain = Arc::new(FakeChain::new());
    let app = app(config(), chain.clone());

    let response = app
        .clone()
        .oneshot(get(&format!("/claim?address={RECIPIENT}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let sent = chain.sent();
    assert_eq!(json["hash"], sent[0].hash().to_string());
    assert_eq!(json["address"], RECIPIENT);
    assert_eq!(json["value"], 10_000_000_000_000_000u64);
    assert!(json["timestamp"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_claim_error_responses() {
    let chain = Arc::new(FakeChain::new());
    let app = app(config(), chain.clone());

    let (status, body) = send(&app, get("/claim")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "invalid ethereum address");

    let (status, _) = send(&app, get("/claim?address=0xnothex")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, get(&format!("/claim?address={RECIPIENT}"))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get(&format!("/claim?address={RECIPIENT}"))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, "this address has already claimed recently");

    let (status, body) = send(&app, get(&format!("/claim?address={OTHER_RECIPIENT}"))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, "this ip has already claimed recently");
}

#[tokio::test]
async fn test_dispatch_failure_is_opaque() {
    let chain = Arc::new(FakeChain {
        fail_broadcast: true,
        ..Default::default()
    });
    let app = app(config(), chain);

    let (status, body) = send(&app, get(&format!("/claim?address={RECIPIENT}"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "failed to claim");
}

#[tokio::test]
async fn test_custom_address_query_key() {
    let chain = Arc::new(FakeChain::new());
    let app = app(
        FaucetConfig {
            address_query_key: "to".to_string(),
            ..config()
        },
        chain,
    );

    let (status, _) = send(&app, get(&format!("/claim?address={RECIPIENT}"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, get(&format!("/claim?to={RECIPIENT}"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_forwarded_for_identifies_origin_behind_proxy() {
    let chain = Arc::new(FakeChain::new());
    let app = app(
        FaucetConfig {
            proxy_hops: 1,
            ..config()
        },
        chain,
    );

    // Same proxy peer, different clients: both are served.
    let first = get_from(
        &format!("/claim?address={RECIPIENT}"),
        "10.0.0.1:443",
        Some("203.0.113.5"),
    );
    assert_eq!(send(&app, first).await.0, StatusCode::OK);

    let second = get_from(
        &format!("/claim?address={OTHER_RECIPIENT}"),
        "10.0.0.1:443",
        Some("203.0.113.6"),
    );
    assert_eq!(send(&app, second).await.0, StatusCode::OK);

    // A spoofed leading entry does not change the identity.
    let third = get_from(
        "/claim?address=0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "10.0.0.1:443",
        Some("198.51.100.1, 203.0.113.5"),
    );
    let (status, body) = send(&app, third).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, "this ip has already claimed recently");
}

#[tokio::test]
async fn test_forwarded_for_ignored_without_proxies() {
    let chain = Arc::new(FakeChain::new());
    let app = app(config(), chain);

    let first = get_from(&format!("/claim?address={RECIPIENT}"), PEER, Some("203.0.113.5"));
    assert_eq!(send(&app, first).await.0, StatusCode::OK);

    let second = get_from(&format!("/claim?address={OTHER_RECIPIENT}"), PEER, Some("203.0.113.6"));
    assert_eq!(send(&app, second).await.0, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_approval_from_middleware() {
    let required = FaucetConfig {
        require_approval: true,
        ..config()
    };

    let denied = app(required.clone(), Arc::new(FakeChain::new()));
    let (status, body) = send(&denied, get(&format!("/claim?address={RECIPIENT}"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "claim requires approval");

    let approved = app(required, Arc::new(FakeChain::new())).layer(Extension(ClaimApproval::Approved));
    let (status, _) = send(&approved, get(&format!("/claim?address={RECIPIENT}"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_info_routes() {
    let app = app(config(), Arc::new(FakeChain::new()));

    let (status, body) = send(&app, get("/address")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.to_lowercase(), FAUCET_ADDRESS);

    let (status, body) = send(&app, get("/amount")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "0.01");

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "healthy");
}

#[tokio::test]
async fn test_metrics_count_outcomes() {
    let app = app(config(), Arc::new(FakeChain::new()));

    send(&app, get(&format!("/claim?address={RECIPIENT}"))).await;
    send(&app, get("/claim?address=bogus")).await;

    let (status, body) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"faucet_claims_total{outcome="success"} 1"#));
    assert!(body.contains(r#"faucet_claims_total{outcome="invalid_address"} 1"#));
    assert!(body.contains(r#"faucet_claims_total{outcome="rate_limited"} 0"#));
}

#[tokio::test]
async fn test_cors_origin_header() {
    let app = app(
        FaucetConfig {
            cors_origin: "https://faucet.example".to_string(),
            ..config()
        },
        Arc::new(FakeChain::new()),
    );

    let request = Request::builder()
        .uri("/amount")
        .header(header::ORIGIN, "https://faucet.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "https://faucet.example"
    );
}
