//! Health check handlers

use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

/// Liveness response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
}

/// Liveness check
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Detailed health for operators
#[derive(Debug, Serialize)]
pub struct AdminHealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub total_requests: u64,
    /// Vector store backend name
    pub vector_store: String,
    /// Chunks in the store, when it could be reached
    pub indexed_chunks: Option<u64>,
}

/// Admin health check
///
/// Reports `degraded` when the vector store cannot be counted.
pub async fn admin_health(State(state): State<Arc<AppState>>) -> Json<AdminHealthResponse> {
    let store = state.ingestion.store();
    let indexed_chunks = match store.count().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!(
                store = store.name(),
                error = %state.redactor.redact(&e.to_string()),
                "Vector store health check failed"
            );
            None
        }
    };

    Json(AdminHealthResponse {
        status: if indexed_chunks.is_some() {
            "healthy"
        } else {
            "degraded"
        }
        .to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_secs(),
        total_requests: state.get_request_count(),
        vector_store: store.name().to_string(),
        indexed_chunks,
    })
}
