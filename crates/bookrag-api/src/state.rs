//! Application state management

use crate::auth::ApiKeyVerifier;
use crate::error::AppError;
use crate::middleware::rate_limit::IpRateLimiter;
use bookrag_core::{AppConfig, ChatbotError, Redactor};
use bookrag_rag::{ChatService, IngestionPipeline};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Question answering
    pub chat: Arc<ChatService>,
    /// Book ingestion
    pub ingestion: Arc<IngestionPipeline>,
    /// Per-IP rate limiter
    pub rate_limiter: IpRateLimiter,
    /// Key check for `/query`
    pub user_keys: ApiKeyVerifier,
    /// Key check for `/admin/*`
    pub admin_keys: ApiKeyVerifier,
    /// Scrubs configured keys from error text before it is logged
    pub redactor: Redactor,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: AppConfig,
        chat: Arc<ChatService>,
        ingestion: Arc<IngestionPipeline>,
    ) -> Self {
        let rate_limiter = IpRateLimiter::new(
            config.security.rate_limit_requests,
            config.security.rate_limit_window_secs,
        );
        let user_keys = ApiKeyVerifier::new(config.security.api_key.as_ref());
        let admin_keys = ApiKeyVerifier::new(config.security.admin_api_key.as_ref());
        let redactor = config.redactor();

        Self {
            config,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            chat,
            ingestion,
            rate_limiter,
            user_keys,
            admin_keys,
            redactor,
        }
    }

    /// Convert a service error, scrubbing configured keys from its message
    pub fn app_error(&self, err: ChatbotError) -> AppError {
        match AppError::from(err) {
            AppError::Internal(msg) => AppError::Internal(self.redactor.redact(&msg)),
            AppError::Validation(msg) => AppError::Validation(self.redactor.redact(&msg)),
            other => other,
        }
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::Relaxed)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
