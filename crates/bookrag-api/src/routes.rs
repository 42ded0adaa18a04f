//! API route definitions

use crate::auth::{require_admin_key, require_api_key};
use crate::handlers::{admin_health, ingest_handler, query_handler, refresh_handler};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Routes guarded by the regular API key
pub fn query_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/query", post(query_handler))
        .route_layer(middleware::from_fn_with_state(state, require_api_key))
}

/// Routes guarded by the admin API key
pub fn admin_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/ingest", post(ingest_handler))
        .route("/admin/refresh", post(refresh_handler))
        .route("/admin/health", get(admin_health))
        .route_layer(middleware::from_fn_with_state(state, require_admin_key))
}
