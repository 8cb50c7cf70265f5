//! # Per-Client Rate Limiting
//!
//! Fixed-window counter keyed by client address. The key is the peer
//! address from [`ConnectInfo`]. Behind a trusted proxy
//! (`trust_forwarded_for`) it is the first hop of `X-Forwarded-For`
//! instead. Requests with neither share the `"anonymous"` bucket.
//!
//! Expired buckets are swept once the table grows past
//! [`SWEEP_THRESHOLD`] entries.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use parking_lot::Mutex;

use crate::error::{ErrorBody, ErrorDetail};

/// Rate limiter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u64,
    /// Window duration in seconds.
    pub window_secs: u64,
    /// Key clients by `X-Forwarded-For`. Only safe behind a proxy that
    /// overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 600,
            window_secs: 60,
            trust_forwarded_for: false,
        }
    }
}

/// Table size above which expired buckets are dropped.
pub const SWEEP_THRESHOLD: usize = 4096;

#[derive(Debug, Clone)]
struct BucketState {
    count: u64,
    window_start: Instant,
}

/// Shared rate limiter state.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Arc<Mutex<HashMap<String, BucketState>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count one request against `key`. Returns `false` once the window's
    /// budget is spent.
    fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let window = Duration::from_secs(self.config.window_secs);
        let mut buckets = self.buckets.lock();

        if buckets.len() >= SWEEP_THRESHOLD {
            buckets.retain(|_, b| now.saturating_duration_since(b.window_start) < window);
        }

        let bucket = buckets.entry(key.to_string()).or_insert(BucketState {
            count: 0,
            window_start: now,
        });

        if now.saturating_duration_since(bucket.window_start) >= window {
            bucket.count = 0;
            bucket.window_start = now;
        }

        if bucket.count >= self.config.max_requests {
            false
        } else {
            bucket.count += 1;
            true
        }
    }

    #[cfg(test)]
    fn bucket_count(&self) -> usize {
        self.buckets.lock().len()
    }
}

fn forwarded_for(request: &Request) -> Option<String> {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn client_key(request: &Request, trust_forwarded_for: bool) -> String {
    let forwarded = trust_forwarded_for.then(|| forwarded_for(request)).flatten();
    forwarded
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Middleware that enforces per-client rate limits.
///
/// A no-op when no [`RateLimiter`] extension is installed.
pub async fn rate_limit_middleware(request: Request, next: Next) -> Response {
    let limiter = request.extensions().get::<RateLimiter>().cloned();

    if let Some(limiter) = limiter {
        let key = client_key(&request, limiter.config.trust_forwarded_for);
        if !limiter.check(&key) {
            tracing::warn!(client = %key, "rate limit exceeded");
            let body = ErrorBody {
                error: ErrorDetail {
                    code: "RATE_LIMITED".to_string(),
                    message: "rate limit exceeded".to_string(),
                    details: None,
                },
            };
            return (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn config(max_requests: u64, window_secs: u64) -> RateLimitConfig {
        RateLimitConfig {
            max_requests,
            window_secs,
            ..RateLimitConfig::default()
        }
    }

    fn test_app(config: RateLimitConfig) -> Router {
        Router::new()
            .route("/test", get(|| async { "ok" }))
            .layer(from_fn(rate_limit_middleware))
            .layer(axum::Extension(RateLimiter::new(config)))
    }

    fn request(forwarded: Option<&str>, peer: Option<&str>) -> axum::http::Request<Body> {
        let mut builder = axum::http::Request::builder().uri("/test");
        if let Some(forwarded) = forwarded {
            builder = builder.header("x-forwarded-for", forwarded);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        if let Some(peer) = peer {
            let addr: SocketAddr = peer.parse().unwrap();
            request.extensions_mut().insert(ConnectInfo(addr));
        }
        request
    }

    #[test]
    fn window_budget_is_enforced() {
        let limiter = RateLimiter::new(config(2, 60));
        let start = Instant::now();
        assert!(limiter.check_at("a", start));
        assert!(limiter.check_at("a", start));
        assert!(!limiter.check_at("a", start));
        assert!(limiter.check_at("b", start));
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = RateLimiter::new(config(1, 1));
        let start = Instant::now();
        assert!(limiter.check_at("a", start));
        assert!(!limiter.check_at("a", start));
        assert!(limiter.check_at("a", start + Duration::from_secs(2)));
    }

    #[test]
    fn expired_buckets_are_swept() {
        let limiter = RateLimiter::new(config(1, 1));
        let start = Instant::now();
        for i in 0..SWEEP_THRESHOLD {
            assert!(limiter.check_at(&format!("client-{i}"), start));
        }
        assert_eq!(limiter.bucket_count(), SWEEP_THRESHOLD);

        assert!(limiter.check_at("late", start + Duration::from_secs(5)));
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn live_buckets_survive_a_sweep() {
        let limiter = RateLimiter::new(config(1, 60));
        let start = Instant::now();
        for i in 0..SWEEP_THRESHOLD {
            assert!(limiter.check_at(&format!("client-{i}"), start));
        }
        assert!(limiter.check_at("late", start + Duration::from_secs(1)));
        assert_eq!(limiter.bucket_count(), SWEEP_THRESHOLD + 1);
        assert!(!limiter.check_at("client-0", start + Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn peer_address_is_the_default_key() {
        let app = test_app(config(1, 60));

        let first = app.clone().oneshot(request(None, Some("10.0.0.1:4000"))).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let same_host = app.clone().oneshot(request(None, Some("10.0.0.1:4001"))).await.unwrap();
        assert_eq!(same_host.status(), StatusCode::TOO_MANY_REQUESTS);

        let other = app.oneshot(request(None, Some("10.0.0.2:4000"))).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn forwarded_for_is_ignored_unless_trusted() {
        let app = test_app(config(1, 60));

        let mut admitted = 0;
        for i in 0..50 {
            let spoofed = format!("192.0.2.{i}");
            let response = app
                .clone()
                .oneshot(request(Some(&spoofed), Some("10.0.0.1:4000")))
                .await
                .unwrap();
            if response.status() == StatusCode::OK {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }

    #[tokio::test]
    async fn trusted_proxy_keys_on_first_forwarded_hop() {
        let app = test_app(RateLimitConfig {
            trust_forwarded_for: true,
            ..config(1, 60)
        });

        let first = app
            .clone()
            .oneshot(request(Some("10.0.0.1"), Some("172.16.0.1:80")))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .clone()
            .oneshot(request(Some("10.0.0.1"), Some("172.16.0.1:80")))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        let other = app
            .oneshot(request(Some("10.0.0.2, 172.16.0.1"), Some("172.16.0.1:80")))
            .await
            .unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_peer_uses_shared_bucket() {
        let app = test_app(config(1, 60));
        let first = app.clone().oneshot(request(None, None)).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let second = app.oneshot(request(None, None)).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
