//! bookrag API - HTTP server for the book chatbot
//!
//! Exposes question answering, admin ingestion and health endpoints.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use bookrag_content::ContentLoader;
use bookrag_core::AppConfig;
use bookrag_rag::{ChatService, IngestionPipeline, OpenAiClient, RetrievalService};
use bookrag_vector::{create_vector_store, OpenAiEmbedding};
use state::AppState;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let limited = Router::new()
        .merge(routes::query_routes(state.clone()))
        .merge(routes::admin_routes(state.clone()))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(limited)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.server.cors_origins))
                .layer(DefaultBodyLimit::max(state.config.server.max_body_size))
                .layer(from_fn_with_state(
                    state.clone(),
                    middleware::timing_middleware,
                ))
                .layer(from_fn(middleware::security_headers_middleware)),
        )
        .with_state(state)
}

/// CORS for the configured origins; any origin when none are configured
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(values)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(auth::API_KEY_HEADER),
        ])
}

/// Wire the production collaborators from configuration
pub async fn build_state(config: AppConfig) -> anyhow::Result<Arc<AppState>> {
    let embedder = Arc::new(OpenAiEmbedding::from_config(&config.llm)?);
    let llm = Arc::new(OpenAiClient::from_config(&config.llm)?);
    let store = create_vector_store(&config.vector).await?;

    let retrieval = RetrievalService::new(
        embedder.clone(),
        store.clone(),
        config.retrieval.min_similarity,
    );
    let chat = ChatService::new(retrieval, llm, config.retrieval.clone());
    let ingestion = IngestionPipeline::new(
        ContentLoader::new(&config.content.book_content_path),
        embedder,
        store,
    )
    .with_batch_size(config.llm.embedding_batch_size);

    Ok(Arc::new(AppState::new(
        config,
        Arc::new(chat),
        Arc::new(ingestion),
    )))
}
