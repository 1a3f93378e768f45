//! Per-client fixed-window rate limiting.
//!
//! Every client (keyed by peer IP) gets a window of `RateLimitConfig::window`
//! starting with its first request; at most `RateLimitConfig::max` requests
//! pass inside that window. Windows live in a bounded in-memory cache whose
//! entries expire together with the window, so the limiter is local to one
//! process.
//!
//! Responses carry the standard `RateLimit-*` headers; rejected requests get
//! `429 Too Many Requests` with a `Retry-After` header.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use moka::future::Cache;

use crate::config::RateLimitConfig;

const MAX_TRACKED_CLIENTS: u64 = 100_000;
const LIMIT_MESSAGE: &str = "Too many requests, please try again later.";

const RATELIMIT_POLICY: HeaderName = HeaderName::from_static("ratelimit-policy");
const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Clients without connection info share the `None` bucket.
type ClientKey = Option<IpAddr>;

struct Window {
    hits: AtomicU32,
    reset_at: Instant,
}

impl Window {
    fn new(reset_at: Instant) -> Self {
        Self {
            hits: AtomicU32::new(0),
            reset_at,
        }
    }
}

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the client's current window ends.
    pub reset_after: Duration,
}

impl Decision {
    fn reset_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        if self.reset_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

/// Shared limiter state; clones share the same counters.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Cache<ClientKey, Arc<Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let windows = Cache::builder()
            .max_capacity(MAX_TRACKED_CLIENTS)
            .time_to_live(config.window)
            .build();
        Self { config, windows }
    }

    /// Count one request for `client` and decide whether it may pass.
    pub async fn hit(&self, client: ClientKey) -> Decision {
        let now = Instant::now();
        let length = self.config.window;

        let mut window = self
            .windows
            .get_with(client, async move { Arc::new(Window::new(now + length)) })
            .await;
        if window.reset_at <= now {
            window = Arc::new(Window::new(now + length));
            self.windows.insert(client, window.clone()).await;
        }

        let hits = window.hits.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        let limit = self.config.max;

        Decision {
            allowed: hits <= limit,
            limit,
            remaining: limit.saturating_sub(hits),
            reset_after: window.reset_at.saturating_duration_since(now),
        }
    }

    fn apply_headers(&self, decision: &Decision, headers: &mut HeaderMap) {
        let policy = format!("{};w={}", decision.limit, self.config.window.as_secs());
        if let Ok(value) = HeaderValue::from_str(&policy) {
            headers.insert(RATELIMIT_POLICY, value);
        }
        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
        headers.insert(RATELIMIT_RESET, HeaderValue::from(decision.reset_secs()));
    }
}

/// Middleware enforcing the limit for the connecting peer.
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let decision = limiter.hit(client).await;

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        tracing::warn!(client = ?client, limit = decision.limit, "Rate limit exceeded");
        let mut response = (StatusCode::TOO_MANY_REQUESTS, LIMIT_MESSAGE).into_response();
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(decision.reset_secs()));
        response
    };

    limiter.apply_headers(&decision, response.headers_mut());
    response
}
