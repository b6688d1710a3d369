use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::AppError;

/// Paths that must stay reachable for orchestration probes.
const EXEMPT_PATHS: &[&str] = &["/health", "/ready"];

/// Full sweep of idle clients; per-key pruning happens on every check.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Sliding-window request limiter keyed by client identity.
///
/// Counters are process-local: with horizontal scaling each instance
/// enforces its own budget, so a shared store is required for a global
/// limit.
#[derive(Clone)]
pub struct SlidingWindowLimiter {
    inner: Arc<LimiterInner>,
}

struct LimiterInner {
    budget: u32,
    window: Duration,
    hits: DashMap<String, Vec<Instant>>,
    last_sweep: Mutex<Instant>,
}

pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

impl SlidingWindowLimiter {
    pub fn new(budget: u32, window_seconds: u64) -> Self {
        Self {
            inner: Arc::new(LimiterInner {
                budget: budget.max(1),
                window: Duration::from_secs(window_seconds.max(1)),
                hits: DashMap::new(),
                last_sweep: Mutex::new(Instant::now()),
            }),
        }
    }

    pub fn budget(&self) -> u32 {
        self.inner.budget
    }

    /// Record a hit for `key` if within budget.
    ///
    /// The read-modify-write on the per-key timestamp list happens under the
    /// map entry's lock, so concurrent checks for the same client are
    /// serialized.
    pub fn check(&self, key: &str) -> RateDecision {
        self.sweep_if_due();

        let now = Instant::now();
        let mut entry = self.inner.hits.entry(key.to_string()).or_default();
        entry.retain(|ts| now.duration_since(*ts) < self.inner.window);

        if entry.len() as u32 >= self.inner.budget {
            let oldest = entry.first().copied().unwrap_or(now);
            let retry_after = self
                .inner
                .window
                .saturating_sub(now.duration_since(oldest));
            RateDecision::Limited {
                retry_after_secs: retry_after.as_secs().max(1),
            }
        } else {
            entry.push(now);
            RateDecision::Allowed {
                remaining: self.inner.budget - entry.len() as u32,
            }
        }
    }

    fn sweep_if_due(&self) {
        {
            let Ok(mut last) = self.inner.last_sweep.lock() else {
                return;
            };
            if last.elapsed() < SWEEP_INTERVAL {
                return;
            }
            *last = Instant::now();
        }

        let now = Instant::now();
        let window = self.inner.window;
        self.inner.hits.retain(|_, stamps| {
            stamps.retain(|ts| now.duration_since(*ts) < window);
            !stamps.is_empty()
        });
    }
}

/// Client identity: first x-forwarded-for hop when behind a proxy, otherwise
/// the peer address.
fn client_key(request: &Request) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    if let Some(ip) = forwarded {
        return ip;
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware enforcing the per-client request budget.
pub async fn rate_limit_middleware(
    State(limiter): State<SlidingWindowLimiter>,
    request: Request,
    next: Next,
) -> Response {
    if EXEMPT_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let key = client_key(&request);

    match limiter.check(&key) {
        RateDecision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(limiter.budget()));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            response
        }
        RateDecision::Limited { retry_after_secs } => {
            tracing::warn!(client = %key, "Rate limit exceeded");
            let mut response = AppError::TooManyRequests(
                "Too many requests. Please try again later.".to_string(),
                Some(retry_after_secs),
            )
            .into_response();
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(limiter.budget()));
            headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
            response
        }
    }
}
