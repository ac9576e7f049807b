//! Per-IP token bucket applied to write requests (view reports, comments,
//! sessions, admin mutations). Reads are never limited.
//!
//! Forwarded-address headers are honoured only when `TRUST_PROXY_HEADERS`
//! is set.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::ServerError;

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

impl Bucket {
    fn full(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            refilled_at: Instant::now(),
        }
    }

    fn take(&mut self, per_sec: f64, capacity: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.refilled_at).as_secs_f64();
        self.refilled_at = now;
        self.tokens = (self.tokens + elapsed * per_sec).min(capacity);

        if self.tokens < 1.0 {
            return false;
        }
        self.tokens -= 1.0;
        true
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<IpAddr, Bucket>>>,
    per_sec: f64,
    capacity: f64,
    trust_proxy_headers: bool,
}

impl RateLimiter {
    pub fn new(per_sec: f64, capacity: f64) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            per_sec,
            capacity: capacity.max(1.0),
            trust_proxy_headers: false,
        }
    }

    /// Key buckets on the forwarded client address instead of the peer.
    pub fn trusting_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    pub async fn check(&self, ip: IpAddr) -> bool {
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(ip)
            .or_insert_with(|| Bucket::full(self.capacity))
            .take(self.per_sec, self.capacity)
    }

    /// Forget clients idle for longer than `max_idle_secs`.
    pub async fn purge_stale(&self, max_idle_secs: f64) -> usize {
        let mut buckets = self.buckets.lock().await;
        let before = buckets.len();
        let now = Instant::now();
        buckets.retain(|_, b| now.duration_since(b.refilled_at).as_secs_f64() < max_idle_secs);
        before - buckets.len()
    }
}

pub async fn limit_writes(
    State(limiter): State<RateLimiter>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let is_read = matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS);
    if !is_read {
        let connect = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|c| c.0);
        if let Some(ip) = client_ip(connect, req.headers(), limiter.trust_proxy_headers) {
            if !limiter.check(ip).await {
                warn!(ip = %ip, path = %req.uri().path(), "Rate limit exceeded");
                return ServerError::RateLimited.into_response();
            }
        }
    }

    next.run(req).await
}

/// Resolve the client address. With `trust_proxy_headers` this is
/// `X-Forwarded-For` (first hop), then `X-Real-IP`, then the socket peer;
/// without it the headers are ignored and only the peer counts.
pub fn client_ip(
    peer: Option<SocketAddr>,
    headers: &HeaderMap,
    trust_proxy_headers: bool,
) -> Option<IpAddr> {
    let peer_ip = peer.map(|p| p.ip());
    if !trust_proxy_headers {
        return peer_ip;
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    forwarded.or_else(real_ip).or(peer_ip)
}
