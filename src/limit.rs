//! Fixed-window call limiting.
//!
//! One [`Limiter`] trait serves two callers: the HTTP middleware rejects
//! over-quota requests with 429, while the classifier uses
//! [`Limiter::acquire`] to sleep until the window frees.

use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, warn};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Limited { retry_after: Duration },
}

#[async_trait]
pub trait Limiter: Send + Sync {
    /// Count one call against `key`, or report how long until it would fit.
    async fn check(&self, key: &str) -> Decision;

    /// Block until a call against `key` is allowed.
    async fn acquire(&self, key: &str) {
        loop {
            match self.check(key).await {
                Decision::Allow => return,
                Decision::Limited { retry_after } => {
                    debug!(key, wait_ms = retry_after.as_millis() as u64, "limiter sleeping");
                    tokio::time::sleep(retry_after).await;
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Window {
    start: Instant,
    count: u32,
}

const PRUNE_THRESHOLD: usize = 1024;

/// `limit` calls per `period`, counted per key in fixed windows that open
/// on the first call after the previous window lapsed.
#[derive(Debug)]
pub struct WindowLimiter {
    limit: u32,
    period: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl WindowLimiter {
    pub fn new(limit: u32, period: Duration) -> Self {
        Self {
            limit,
            period,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    pub fn per_hour(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60 * 60))
    }
}

#[async_trait]
impl Limiter for WindowLimiter {
    async fn check(&self, key: &str) -> Decision {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        if windows.len() > PRUNE_THRESHOLD {
            let period = self.period;
            windows.retain(|_, w| now.duration_since(w.start) < period);
        }

        let window = windows.entry(key.to_string()).or_insert(Window {
            start: now,
            count: 0,
        });
        if now.duration_since(window.start) >= self.period {
            window.start = now;
            window.count = 0;
        }

        if window.count < self.limit {
            window.count += 1;
            Decision::Allow
        } else {
            let elapsed = now.duration_since(window.start);
            Decision::Limited {
                retry_after: self.period.saturating_sub(elapsed),
            }
        }
    }
}

/// Used when rate limiting is switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLimiter;

#[async_trait]
impl Limiter for NoopLimiter {
    async fn check(&self, _key: &str) -> Decision {
        Decision::Allow
    }
}

pub fn build(enabled: bool, make: impl FnOnce() -> WindowLimiter) -> Arc<dyn Limiter> {
    if enabled {
        Arc::new(make())
    } else {
        Arc::new(NoopLimiter)
    }
}

/// Per-route request limits for the public API.
#[derive(Clone)]
pub struct RouteLimits {
    pub signup: Arc<dyn Limiter>,
    pub login: Arc<dyn Limiter>,
    pub guest: Arc<dyn Limiter>,
    pub upload: Arc<dyn Limiter>,
}

impl RouteLimits {
    pub fn new(enabled: bool) -> Self {
        Self {
            signup: build(enabled, || WindowLimiter::per_hour(5)),
            login: build(enabled, || WindowLimiter::per_minute(10)),
            guest: build(enabled, || WindowLimiter::per_hour(10)),
            upload: build(enabled, || WindowLimiter::per_hour(20)),
        }
    }
}

fn client_key(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".into())
}

/// Middleware rejecting requests over the route's quota.
pub async fn enforce(
    State(limiter): State<Arc<dyn Limiter>>,
    req: Request,
    next: Next,
) -> Response {
    let key = client_key(&req);
    match limiter.check(&key).await {
        Decision::Allow => next.run(req).await,
        Decision::Limited { retry_after } => {
            warn!(
                method = %req.method(),
                uri = %req.uri(),
                client = %key,
                retry_after_secs = retry_after.as_secs(),
                "rate limit exceeded"
            );
            AppError::TooManyRequests { retry_after }.into_response()
        }
    }
}
