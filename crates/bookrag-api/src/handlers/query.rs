//! Question answering handler

use crate::error::{AppError, AppJson};
use crate::state::AppState;
use axum::{extract::State, Json};
use bookrag_core::ConversationTurn;
use bookrag_rag::{ChatRequest, ChatResponse};
use serde::Deserialize;
use std::sync::Arc;
use validator::{Validate, ValidationError};

/// Query request body
#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    /// The reader's question
    #[validate(
        length(max = 10_000, message = "Text is too long (max 10000 characters)"),
        custom(function = "not_blank", message = "Text cannot be empty")
    )]
    pub text: String,

    /// Highlighted passage to answer from instead of the whole book
    #[serde(default)]
    #[validate(
        length(
            max = 10_000,
            message = "Selected text is too long (max 10000 characters)"
        ),
        custom(function = "not_blank", message = "Selected text cannot be empty")
    )]
    pub selected_text: Option<String>,

    /// Earlier exchanges, oldest first
    #[serde(default)]
    pub conversation_history: Option<Vec<ConversationTurn>>,

    /// Number of chunks to retrieve
    #[serde(default)]
    #[validate(range(min = 1, max = 20, message = "top_k must be between 1 and 20"))]
    pub top_k: Option<usize>,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

impl From<QueryRequest> for ChatRequest {
    fn from(req: QueryRequest) -> Self {
        Self {
            text: req.text,
            selected_text: req.selected_text,
            conversation_history: req.conversation_history.unwrap_or_default(),
            top_k: req.top_k.unwrap_or(0),
        }
    }
}

/// Answer a question about the book
pub async fn query_handler(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<QueryRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    req.validate()?;

    tracing::info!(
        preview = %req.text.chars().take(50).collect::<String>(),
        selection = req.selected_text.is_some(),
        "Received query"
    );

    let response = state
        .chat
        .answer(&ChatRequest::from(req))
        .await
        .map_err(|e| state.app_error(e))?;

    tracing::info!(sources = response.sources.len(), "Answered query");
    Ok(Json(response))
}
