//! Per-client fixed-window rate limiting for the responder endpoint.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

pub const DEFAULT_MAX_REQUESTS: u32 = 10;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Key used when neither a forwarded address nor a peer address is known.
pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Clone)]
pub struct RateLimiter {
    // client key -> (request_count, window_start)
    limits: Arc<RwLock<HashMap<String, (u32, Instant)>>>,
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            limits: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    /// Count one request from `client` and report whether it is allowed.
    pub async fn check_limit(&self, client: &str) -> bool {
        let mut limits = self.limits.write().await;
        let now = Instant::now();

        let state = limits.entry(client.to_string()).or_insert((0, now));

        if now.duration_since(state.1) >= self.window {
            state.0 = 1;
            state.1 = now;
            debug!(client, "Rate limit window reset");
            true
        } else {
            state.0 += 1;
            if state.0 > self.max_requests {
                warn!(client, "Rate limit exceeded");
                false
            } else {
                debug!(client, count = state.0, max = self.max_requests, "Rate limit OK");
                true
            }
        }
    }

    /// Drop windows that have already expired.
    pub async fn prune(&self) {
        let now = Instant::now();
        let window = self.window;
        self.limits
            .write()
            .await
            .retain(|_, (_, start)| now.duration_since(*start) < window);
    }
}

/// Identify the caller: first `x-forwarded-for` hop, else the peer address.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test(start_paused = true)]
    async fn test_window_limits_and_resets() {
        let limiter = RateLimiter::default();
        for _ in 0..10 {
            assert!(limiter.check_limit("1.2.3.4").await);
        }
        assert!(!limiter.check_limit("1.2.3.4").await);
        assert!(limiter.check_limit("5.6.7.8").await);

        tokio::time::advance(DEFAULT_WINDOW).await;
        assert!(limiter.check_limit("1.2.3.4").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_drops_expired_windows() {
        let limiter = RateLimiter::new(1, Duration::from_secs(1));
        limiter.check_limit("a").await;
        tokio::time::advance(Duration::from_secs(2)).await;
        limiter.prune().await;
        assert!(limiter.limits.read().await.is_empty());
    }

    #[test]
    fn test_client_key_precedence() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        assert_eq!(client_key(&headers, None), "unknown");
        assert_eq!(client_key(&headers, Some(peer)), "10.0.0.1");
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.2"));
        assert_eq!(client_key(&headers, Some(peer)), "203.0.113.9");
    }
}
