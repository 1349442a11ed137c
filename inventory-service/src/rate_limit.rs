use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dashmap::DashMap;
use shared::{messages, ApiResponse, ErrorKind};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket per client address. Buckets start full and refill evenly
/// over the window.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<DashMap<String, TokenBucket>>,
    max_tokens: f64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max: u64, window: Duration) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            max_tokens: max as f64,
            window,
        }
    }

    pub fn try_acquire(&self, key: &str) -> bool {
        self.try_acquire_at(key, Instant::now())
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    /// Drops buckets untouched for a whole window. Such a bucket has refilled
    /// completely, so a later request starts from the same state.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now())
    }

    fn evict_idle_at(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < self.window);
        before.saturating_sub(self.buckets.len())
    }

    /// Evicts idle buckets once per window, forever.
    pub async fn run_eviction(&self) {
        let mut interval = time::interval(self.window);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let evicted = self.evict_idle();
            if evicted > 0 {
                debug!("Evicted {} idle rate-limit buckets", evicted);
            }
        }
    }

    fn try_acquire_at(&self, key: &str, now: Instant) -> bool {
        let mut bucket = self.buckets.entry(key.to_string()).or_insert_with(|| TokenBucket {
            tokens: self.max_tokens,
            last_refill: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let refill = (elapsed.as_secs_f64() / self.window.as_secs_f64()) * self.max_tokens;
        bucket.tokens = (bucket.tokens + refill).min(self.max_tokens);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

pub async fn limit_by_ip(State(limiter): State<RateLimiter>, req: Request, next: Next) -> Response {
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if !limiter.try_acquire(&client) {
        warn!("Rate limit exceeded for {}", client);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiResponse::<()>::failed(ErrorKind::RateLimited, messages::TOO_MANY_REQUESTS)),
        )
            .into_response();
    }
    next.run(req).await
}
