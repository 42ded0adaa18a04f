//! bookrag API Server
//!
//! REST API server answering questions about the book.

use bookrag_api::{build_state, create_router, middleware::rate_limit::spawn_pruning_task};
use bookrag_core::{AppConfig, LoggingConfig};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "bookrag_api={level},bookrag_rag={level},bookrag_vector={level},bookrag_content={level},tower_http=info",
            level = config.level
        ))
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(&config.logging);
    config.validate()?;

    if config.security.api_key.is_none() {
        tracing::warn!("API_KEY is not set; /query is open to anyone");
    }
    if config.security.admin_api_key.is_none() {
        tracing::warn!("ADMIN_API_KEY is not set; admin endpoints are open to anyone");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let window = Duration::from_secs(config.security.rate_limit_window_secs);

    let state = build_state(config).await?;
    let pruning = spawn_pruning_task(state.clone(), window);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("bookrag API server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    pruning.abort();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
