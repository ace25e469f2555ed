//! Per-client throttling for the unauthenticated `/api/auth/*` routes.

use axum::{
    extract::{Request, State},
    http::{header::RETRY_AFTER, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared_types::AppError;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Sliding-window limiter keyed by client address. Cloning shares the window.
#[derive(Clone)]
pub struct RateLimitState {
    limit: usize,
    window: Duration,
    hits: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
}

impl RateLimitState {
    /// Allow `max_requests` per client within any `window`.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            limit: max_requests as usize,
            window,
            hits: Arc::default(),
        }
    }

    fn hits(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.hits.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a request from `client`. When over the limit, nothing is
    /// recorded and the wait until a slot frees up is returned.
    pub fn admit(&self, client: &str) -> Result<(), Duration> {
        let now = Instant::now();
        let mut hits = self.hits();
        let recent = hits.entry(client.to_string()).or_default();
        while recent
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            recent.pop_front();
        }

        if recent.len() >= self.limit {
            let wait = recent
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window);
            return Err(wait);
        }
        recent.push_back(now);
        Ok(())
    }

    /// Forget clients whose newest request has left the window.
    pub fn prune(&self) {
        let now = Instant::now();
        let window = self.window;
        self.hits()
            .retain(|_, recent| recent.back().is_some_and(|t| now.duration_since(*t) < window));
    }

    /// Run [`prune`](Self::prune) on a fixed period for the life of the process.
    pub fn spawn_pruner(&self, every: Duration) {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                limiter.prune();
            }
        });
    }
}

/// Client key: first `X-Forwarded-For` hop, then `X-Real-IP`.
pub fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Reject with 429 `RateLimited` and a `Retry-After` header once a client
/// exceeds its allowance.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(request.headers());
    match limiter.admit(&client) {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            tracing::warn!(%client, path = %request.uri().path(), "Auth rate limit exceeded");
            let mut response =
                AppError::rate_limited("Too many attempts. Please try again later.")
                    .into_response();
            let seconds = wait.as_secs().max(1);
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(seconds));
            response
        }
    }
}
