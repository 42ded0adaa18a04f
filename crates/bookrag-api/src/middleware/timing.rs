//! Request timing middleware
//!
//! Counts requests and logs their latency, warning on slow ones.

use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use bookrag_rag::SLOW_OPERATION_THRESHOLD;
use std::sync::Arc;
use std::time::Instant;

/// Request timing middleware
pub async fn timing_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    state.increment_requests();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status().as_u16();
    let latency_ms = elapsed.as_millis() as u64;

    if elapsed > SLOW_OPERATION_THRESHOLD {
        tracing::warn!(%method, %path, status, latency_ms, "Slow request");
    } else {
        tracing::info!(%method, %path, status, latency_ms, "Request completed");
    }

    response
}
