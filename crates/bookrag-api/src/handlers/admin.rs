//! Admin handlers for content ingestion

use crate::error::{AppError, AppJson};
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of an ingestion request
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: String,
    pub message: String,
}

/// Refresh request body
#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    /// Clear the store before re-ingesting
    #[serde(default)]
    pub force: bool,
}

/// Result of a refresh request
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub status: String,
    pub message: String,
    pub processed_files: usize,
}

/// Load the book into the vector store
pub async fn ingest_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<IngestResponse>, AppError> {
    tracing::info!("Ingestion requested");

    let report = state
        .ingestion
        .run(false)
        .await
        .map_err(|e| state.app_error(e))?;
    tracing::info!(files = report.files, chunks = report.chunks, "Ingestion finished");

    Ok(Json(IngestResponse {
        status: "success".to_string(),
        message: "Content ingested successfully".to_string(),
    }))
}

/// Re-embed the book, optionally clearing the store first
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AppError> {
    tracing::info!(force = req.force, "Refresh requested");

    let report = state
        .ingestion
        .run(req.force)
        .await
        .map_err(|e| state.app_error(e))?;

    Ok(Json(RefreshResponse {
        status: "success".to_string(),
        message: format!(
            "Embeddings refresh completed successfully ({} chunks)",
            report.chunks
        ),
        processed_files: report.files,
    }))
}
