//! Rate limiting middleware
//!
//! Limits each client IP to a fixed number of requests per window. Every
//! admitted request is logged with its arrival time; a client is rejected
//! while the log for the trailing window is full.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Per-IP sliding window rate limiter
pub struct IpRateLimiter {
    clients: DashMap<IpAddr, VecDeque<Instant>>,
    max_requests: usize,
    window: Duration,
}

impl IpRateLimiter {
    /// Allow `requests` per `window_secs` for each IP
    pub fn new(requests: u32, window_secs: u64) -> Self {
        Self {
            clients: DashMap::new(),
            max_requests: requests.max(1) as usize,
            window: Duration::from_secs(window_secs.max(1)),
        }
    }

    /// Record a request from `ip`; on rejection returns how long to wait
    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        let now = Instant::now();
        let mut log = self.clients.entry(ip).or_default();

        while let Some(&oldest) = log.front() {
            if now.duration_since(oldest) > self.window {
                log.pop_front();
            } else {
                break;
            }
        }

        if log.len() >= self.max_requests {
            let oldest = log.front().copied().unwrap_or(now);
            return Err(self.window.saturating_sub(now.duration_since(oldest)));
        }

        log.push_back(now);
        Ok(())
    }

    /// Drop clients with no request inside the window
    pub fn prune(&self) {
        let now = Instant::now();
        self.clients.retain(|_, log| {
            log.back()
                .is_some_and(|last| now.duration_since(*last) <= self.window)
        });
        self.clients.shrink_to_fit();
    }

    /// Number of tracked clients
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}

/// Determine the client IP for rate limiting
///
/// Prefers the socket peer address, then the first `X-Forwarded-For` entry,
/// then `X-Real-IP`.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
    if let Some(addr) = peer {
        return addr.ip();
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok());

    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer);

    if let Err(retry_after) = state.rate_limiter.check(ip) {
        tracing::warn!(client_ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
        return Err(AppError::RateLimited { retry_after });
    }

    Ok(next.run(request).await)
}

/// Periodically prune idle clients from the limiter
pub fn spawn_pruning_task(state: Arc<AppState>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            state.rate_limiter.prune();
            tracing::debug!(
                clients = state.rate_limiter.tracked_clients(),
                "Pruned rate limiter state"
            );
        }
    })
}
