//! HTTP API for faucet service

use crate::identity::{origin_identity, FORWARDED_FOR};
use crate::service::{ClaimApproval, ClaimRequest, FaucetService};
use axum::{
    extract::{ConnectInfo, Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

/// Builds the faucet router with CORS and request tracing.
pub fn router(service: Arc<FaucetService>) -> Router {
    let allow_origin = match &service.settings().cors_origin {
        Some(origin) => AllowOrigin::exact(origin.clone()),
        None => AllowOrigin::any(),
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/claim", get(claim_handler))
        .route("/address", get(address_handler))
        .route("/amount", get(amount_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(service)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Claim handler
pub async fn claim_handler(
    State(service): State<Arc<FaucetService>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    approval: Option<Extension<ClaimApproval>>,
) -> Response {
    let settings = service.settings();
    let forwarded_for = headers.get(FORWARDED_FOR).and_then(|v| v.to_str().ok());
    let origin = origin_identity(&remote.to_string(), forwarded_for, settings.proxy_hops);

    let request = ClaimRequest {
        address: params.get(&settings.address_query_key).cloned(),
        origin,
        approval: approval.map(|Extension(a)| a).unwrap_or_default(),
    };

    match service.claim(request).await {
        Ok(receipt) => Json(receipt).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Faucet sending address as plain text
pub async fn address_handler(State(service): State<Arc<FaucetService>>) -> String {
    service.address().to_string()
}

/// Claim amount in display units as plain text
pub async fn amount_handler(State(service): State<Arc<FaucetService>>) -> String {
    service.display_amount().to_string()
}

/// Health check handler
pub async fn health_handler() -> &'static str {
    "healthy"
}

pub async fn metrics_handler(State(service): State<Arc<FaucetService>>) -> Result<String, StatusCode> {
    service.metrics().gather().map_err(|e| {
        error!("Failed to gather metrics: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
