//! Fixed-window request limiting keyed by client IP.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::error::ApiError;

struct Window {
    started_at: Instant,
    count: u32,
}

/// Allows `max` requests per client in each `window`.
///
/// Requests without a known peer address share a single bucket.
pub struct RateLimiter {
    max: u32,
    window: Duration,
    clients: Mutex<HashMap<Option<IpAddr>, Window>>,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Records one request and reports whether it is within the limit.
    pub fn check(&self, client: Option<IpAddr>, now: Instant) -> bool {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let window = self.window;
        clients.retain(|_, w| now.saturating_duration_since(w.started_at) < window);

        let entry = clients.entry(client).or_insert(Window {
            started_at: now,
            count: 0,
        });
        entry.count += 1;
        entry.count <= self.max
    }
}

pub async fn rate_limit(State(limiter): State<Arc<RateLimiter>>, request: Request, next: Next) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if !limiter.check(client, Instant::now()) {
        warn!(?client, path = %request.uri().path(), "rate limit exceeded");
        return ApiError::TooManyRequests.into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_applies_per_client() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let a = Some("10.0.0.1".parse().unwrap());
        let b = Some("10.0.0.2".parse().unwrap());
        let now = Instant::now();

        assert!(limiter.check(a, now));
        assert!(limiter.check(a, now));
        assert!(!limiter.check(a, now));
        assert!(limiter.check(b, now));
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(limiter.check(None, t0));
        assert!(!limiter.check(None, t0 + Duration::from_secs(59)));
        assert!(limiter.check(None, t0 + Duration::from_secs(60)));
    }
}
