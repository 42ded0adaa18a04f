//! Shared fixtures for the API integration tests
//!
//! Builds the full router with fake embedding and completion providers and
//! an in-memory vector store.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
    Router,
};
use bookrag_api::{create_router, state::AppState};
use bookrag_content::ContentLoader;
use bookrag_core::{AppConfig, ChatMessage, ChatbotError, LlmClient, Result, SecretString};
use bookrag_rag::{ChatService, IngestionPipeline, RetrievalService};
use bookrag_vector::{EmbeddingClient, InMemoryStore};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const USER_KEY: &str = "user-key-1b7f0c";
pub const ADMIN_KEY: &str = "admin-key-93ad2e";

// =============================================================================
// Fakes
// =============================================================================

const KEYWORDS: [&str; 3] = ["robot", "sensor", "walk"];

/// Embeds text as keyword presence flags
pub struct KeywordEmbedder;

#[async_trait]
impl EmbeddingClient for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let lower = text.to_lowercase();
        Ok(KEYWORDS
            .iter()
            .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
            .collect())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        KEYWORDS.len()
    }
}

/// Answers with the number of messages it received
pub struct EchoLlm;

#[async_trait]
impl LlmClient for EchoLlm {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        Ok(format!("Answer from {} messages", messages.len()))
    }

    fn model(&self) -> &str {
        "echo"
    }
}

/// Fails with a message that includes both configured keys
pub struct FailingLlm;

#[async_trait]
impl LlmClient for FailingLlm {
    async fn generate(&self, _messages: &[ChatMessage]) -> Result<String> {
        Err(ChatbotError::Llm(format!(
            "upstream rejected key {USER_KEY} (admin {ADMIN_KEY})"
        )))
    }

    fn model(&self) -> &str {
        "failing"
    }
}

// =============================================================================
// Helpers
// =============================================================================

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub store: Arc<InMemoryStore>,
    _content: TempDir,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub fn secured_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.security.api_key = Some(SecretString::new(USER_KEY));
    config.security.admin_api_key = Some(SecretString::new(ADMIN_KEY));
    config
}

pub async fn build_app(config: AppConfig, llm: Arc<dyn LlmClient>, seed: bool) -> TestApp {
    let content = tempfile::tempdir().unwrap();
    std::fs::write(
        content.path().join("robots.md"),
        "# Humanoid Robots\n\n## Locomotion\n\nRobots walk on two legs.\n\nSensors help robots keep balance.\n",
    )
    .unwrap();

    let embedder: Arc<dyn EmbeddingClient> = Arc::new(KeywordEmbedder);
    let store = Arc::new(InMemoryStore::new());

    let retrieval = RetrievalService::new(
        embedder.clone(),
        store.clone(),
        config.retrieval.min_similarity,
    );
    let chat = ChatService::new(retrieval, llm, config.retrieval.clone());
    let ingestion = IngestionPipeline::new(
        ContentLoader::new(content.path()).without_sample_fallback(),
        embedder,
        store.clone(),
    );

    if seed {
        ingestion.run(false).await.unwrap();
    }

    let state = Arc::new(AppState::new(config, Arc::new(chat), Arc::new(ingestion)));
    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        _content: content,
    }
}

pub async fn secured_app() -> TestApp {
    build_app(secured_config(), Arc::new(EchoLlm), true).await
}

pub fn json_request(method: &str, uri: &str, key: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = key {
        builder = builder.header("X-API-Key", key);
    }

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn query_request(key: Option<&str>, body: Value) -> Request<Body> {
    json_request("POST", "/query", key, Some(body))
}

pub async fn body_text(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}
