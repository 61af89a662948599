use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;

use crate::error::AppError;

/// Sliding-window limiter keyed by client address. Guards the credential
/// endpoints against brute force.
#[derive(Clone)]
pub struct RateLimiter {
    state: Arc<Mutex<Windows>>,
    max_requests: usize,
    window: Duration,
}

struct Windows {
    hits: HashMap<String, VecDeque<Instant>>,
    last_sweep: Instant,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(Windows {
                hits: HashMap::new(),
                last_sweep: Instant::now(),
            })),
            max_requests,
            window,
        }
    }

    /// Records a hit for `key` at `now`. On refusal returns how long until
    /// the oldest hit leaves the window.
    async fn hit(&self, key: &str, now: Instant) -> Result<(), Duration> {
        let mut windows = self.state.lock().await;

        if now.duration_since(windows.last_sweep) > self.window {
            let window = self.window;
            windows
                .hits
                .retain(|_, q| q.back().is_some_and(|t| now.duration_since(*t) < window));
            windows.last_sweep = now;
        }

        let queue = windows.hits.entry(key.to_string()).or_default();
        while queue
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            queue.pop_front();
        }

        if queue.len() >= self.max_requests {
            let oldest = queue.front().copied().unwrap_or(now);
            return Err(self.window.saturating_sub(now.duration_since(oldest)));
        }

        queue.push_back(now);
        Ok(())
    }
}

/// First hop of `X-Forwarded-For`, then `X-Real-IP`; requests with neither
/// share one bucket.
fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
        })
        .unwrap_or("anonymous")
        .to_string()
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(req.headers());

    if let Err(retry_after) = limiter.hit(&key, Instant::now()).await {
        tracing::warn!(client = %key, path = %req.uri().path(), "Rate limit exceeded");
        let mut response = AppError::RateLimited.into_response();
        let secs = retry_after.as_secs().max(1);
        if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return response;
    }

    next.run(req).await
}
