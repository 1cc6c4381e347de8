//! Per-client request throttling
//!
//! Keyed GCRA limiter from `governor`, equivalent to a token bucket per
//! client identity: `capacity` requests in a burst, refilled at
//! `refill_per_sec`. A rejected request gets 429. Keys are created on first
//! sight; a background sweep drops keys whose allowance has fully refilled,
//! since they are indistinguishable from a fresh client.
//!
//! The limiter lives in application state, so tests and multiple routers
//! never share buckets.

use crate::audit::{audit_log, extract_ip_address, AuditEvent};
use crate::error::ApiError;
use crate::state::AppState;
use accounts_core::RateLimitConfig;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::keyed::DefaultKeyedStateStore,
    Quota,
};
use std::fmt;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::debug;

type KeyedLimiter<C> = governor::RateLimiter<
    String,
    DefaultKeyedStateStore<String>,
    C,
    NoOpMiddleware<<C as Clock>::Instant>,
>;

/// Limiter parameters that cannot form a quota
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("rate limit capacity must be at least 1")]
    ZeroCapacity,

    #[error("invalid refill rate: {0} per second")]
    InvalidRefill(f64),
}

/// Burst of `capacity`, one token every `1 / refill_per_sec` seconds
fn quota(config: &RateLimitConfig) -> Result<Quota, RateLimitError> {
    let burst = NonZeroU32::new(config.capacity).ok_or(RateLimitError::ZeroCapacity)?;

    let refill = config.refill_per_sec;
    let period = Duration::try_from_secs_f64(1.0 / refill)
        .map_err(|_| RateLimitError::InvalidRefill(refill))?;

    Quota::with_period(period)
        .map(|quota| quota.allow_burst(burst))
        .ok_or(RateLimitError::InvalidRefill(refill))
}

/// Rate limiter keyed by client identity
pub struct RateLimiter<C: Clock = DefaultClock> {
    /// `None` when limiting is disabled
    limiter: Option<KeyedLimiter<C>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Result<Self, RateLimitError> {
        Self::with_clock(config, &DefaultClock::default())
    }

    /// Run `sweep_idle` every `interval` until the runtime shuts down
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = limiter.sweep_idle();
                if removed > 0 {
                    debug!(
                        removed,
                        tracked = limiter.tracked(),
                        "Evicted idle rate limit buckets"
                    );
                }
            }
        })
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(config: &RateLimitConfig, clock: &C) -> Result<Self, RateLimitError> {
        if !config.enabled {
            return Ok(Self { limiter: None });
        }

        let quota = quota(config)?;
        Ok(Self {
            limiter: Some(governor::RateLimiter::new(
                quota,
                DefaultKeyedStateStore::default(),
                clock,
            )),
        })
    }

    /// Admit or reject one request from `client`
    pub fn allow(&self, client: &str) -> bool {
        match &self.limiter {
            Some(limiter) => limiter.check_key(&client.to_string()).is_ok(),
            None => true,
        }
    }

    /// Drop buckets that have refilled completely; returns how many
    pub fn sweep_idle(&self) -> usize {
        let Some(limiter) = &self.limiter else {
            return 0;
        };

        let before = limiter.len();
        limiter.retain_recent();
        limiter.shrink_to_fit();
        before.saturating_sub(limiter.len())
    }

    /// Number of client buckets currently held
    pub fn tracked(&self) -> usize {
        self.limiter.as_ref().map_or(0, |limiter| limiter.len())
    }
}

impl<C: Clock> fmt::Debug for RateLimiter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("enabled", &self.limiter.is_some())
            .field("tracked", &self.tracked())
            .finish()
    }
}

/// Client identity used as the bucket key
///
/// The socket peer address, else "unknown". With `trust_proxy_headers` the
/// first X-Forwarded-For hop, then X-Real-IP, take precedence; those headers
/// are client-controlled unless a proxy rewrites them.
pub fn client_key(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy_headers: bool,
) -> String {
    trust_proxy_headers
        .then(|| extract_ip_address(headers))
        .flatten()
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate limiting middleware applied to every route
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_key(
        request.headers(),
        peer,
        state.config.server.trust_proxy_headers,
    );

    let allowed = state.rate_limiter.allow(&client);
    state
        .metrics
        .rate_limit_buckets
        .set(i64::try_from(state.rate_limiter.tracked()).unwrap_or(i64::MAX));

    if !allowed {
        state.metrics.rate_limited.inc();
        audit_log(&AuditEvent::RateLimited {
            client,
            path: request.uri().path().to_string(),
        });

        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, "1")],
            Json(ApiError::new("RATE_LIMITED", "Too many requests")),
        )
            .into_response();
    }

    next.run(request).await
}
