//! API key authentication
//!
//! Requests carry their key in the `X-API-Key` header. Regular routes
//! accept only `API_KEY`; admin routes accept only `ADMIN_API_KEY`. When a
//! key is not configured, the routes it guards are open.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use bookrag_core::SecretString;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Checks presented keys against one configured key
#[derive(Clone)]
pub struct ApiKeyVerifier {
    digest: Option<[u8; 32]>,
}

impl ApiKeyVerifier {
    /// Create a verifier; `None` or an empty key leaves the routes open
    pub fn new(key: Option<&SecretString>) -> Self {
        let digest = key
            .filter(|k| !k.is_empty())
            .map(|k| sha256(k.expose()));
        Self { digest }
    }

    /// True when no key is configured
    pub fn is_open(&self) -> bool {
        self.digest.is_none()
    }

    /// Check a presented key
    pub fn verify(&self, presented: Option<&str>) -> bool {
        match (&self.digest, presented) {
            (None, _) => true,
            (Some(expected), Some(key)) => sha256(key) == *expected,
            (Some(_), None) => false,
        }
    }

    fn check(&self, headers: &HeaderMap, scope: &str) -> Result<(), AppError> {
        let presented = headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());

        if self.verify(presented) {
            Ok(())
        } else {
            tracing::warn!(scope, key_present = presented.is_some(), "Rejected API key");
            Err(AppError::Unauthorized)
        }
    }
}

impl std::fmt::Debug for ApiKeyVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyVerifier")
            .field("open", &self.is_open())
            .finish()
    }
}

fn sha256(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

/// Require the regular API key
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    state.user_keys.check(request.headers(), "user")?;
    Ok(next.run(request).await)
}

/// Require the admin API key
pub async fn require_admin_key(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    state.admin_keys.check(request.headers(), "admin")?;
    Ok(next.run(request).await)
}
