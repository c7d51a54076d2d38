use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Clone)]
struct RateLimitEntry {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window counter keyed by client identity, applied only to the
/// public booking-creation routes: the count resets when the window expires,
/// it does not slide. Ephemeral: this is not business data and restarts
/// reset it.
#[derive(Clone)]
pub struct RateLimiter {
    limits: Arc<RwLock<HashMap<String, RateLimitEntry>>>,
    max_requests: u32,
    window_seconds: u64,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            limits: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window_seconds,
        }
    }

    /// When 0, rate limiting is disabled (useful for local dev/testing).
    pub fn is_disabled(&self) -> bool {
        self.max_requests == 0
    }

    pub async fn check(&self, key: &str) -> Result<(), AppError> {
        let mut limits = self.limits.write().await;
        let now = Instant::now();

        // Clean up expired entries once the map grows
        if limits.len() > 10_000 {
            limits.retain(|_, entry| entry.reset_at > now);
        }

        match limits.get_mut(key) {
            Some(entry) => {
                if entry.reset_at <= now {
                    entry.count = 1;
                    entry.reset_at = now + Duration::from_secs(self.window_seconds);
                    return Ok(());
                }

                if entry.count >= self.max_requests {
                    return Err(AppError::TooManyRequests);
                }

                entry.count += 1;
                Ok(())
            }
            None => {
                limits.insert(
                    key.to_string(),
                    RateLimitEntry {
                        count: 1,
                        reset_at: now + Duration::from_secs(self.window_seconds),
                    },
                );
                Ok(())
            }
        }
    }
}

// Real client IP when behind a reverse proxy, else the peer address so
// direct clients do not all share one bucket.
fn extract_ip(req: &Request) -> String {
    if let Some(forwarded_for) = req.headers().get("x-forwarded-for") {
        if let Ok(ip) = forwarded_for.to_str() {
            return ip.split(',').next().unwrap_or("unknown").trim().to_string();
        }
    }

    if let Some(real_ip) = req.headers().get("x-real-ip") {
        if let Ok(ip) = real_ip.to_str() {
            return ip.to_string();
        }
    }

    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if state.rate_limiter.is_disabled() {
        return Ok(next.run(req).await);
    }

    let ip = extract_ip(&req);
    state.rate_limiter.check(&ip).await?;

    Ok(next.run(req).await)
}
