//! Rate limiting middleware
//!
//! Applied to `GET /api/file/:id` only. Clients are keyed by peer IP and
//! request path, so each document has its own window per client.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::net::SocketAddr;
use tracing::warn;

use crate::cache::RateDecision;
use crate::AppState;

/// Limiter key for a request: `<peer ip>_<path>`
///
/// Requests without connection info (in-process tests) share the
/// `unknown` client.
pub fn client_key(request: &Request) -> String {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{}_{}", ip, request.uri().path())
}

/// Reject with 429 once a client exceeds its window
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = client_key(&request);

    match state.limiter.check(&key) {
        RateDecision::Allowed => next.run(request).await,
        RateDecision::Limited => {
            warn!("Rate limit exceeded for {}", key);
            let body = Json(json!({
                "error": "Too many requests",
                "retryAfter": state.limiter.window().as_millis() as u64,
            }));
            (StatusCode::TOO_MANY_REQUESTS, body).into_response()
        }
    }
}
