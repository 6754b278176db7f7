//! Rate limiting for credential endpoints.
//!
//! Token bucket per client IP to slow brute force against login and invite
//! claiming. Limits are raised under the `test-mode` feature so integration
//! tests can hammer the endpoints.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};

/// Per-IP keyed limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Limiters for the two credential endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Login attempts: 5 per 10 seconds per IP
    pub login: Arc<IpLimiter>,
    /// Invite claims: 3 per minute per IP
    pub claim: Arc<IpLimiter>,
}

impl RateLimitConfig {
    pub fn new() -> Self {
        #[cfg(feature = "test-mode")]
        const LOGIN_PER_SEC: u32 = 1000;
        #[cfg(not(feature = "test-mode"))]
        const LOGIN_PER_SEC: u32 = 1;

        #[cfg(feature = "test-mode")]
        const LOGIN_BURST: u32 = 1000;
        #[cfg(not(feature = "test-mode"))]
        const LOGIN_BURST: u32 = 5;

        #[cfg(feature = "test-mode")]
        const CLAIM_PER_MIN: u32 = 1000;
        #[cfg(not(feature = "test-mode"))]
        const CLAIM_PER_MIN: u32 = 3;

        Self {
            login: Arc::new(RateLimiter::keyed(
                Quota::per_second(NonZeroU32::new(LOGIN_PER_SEC).unwrap())
                    .allow_burst(NonZeroU32::new(LOGIN_BURST).unwrap()),
            )),
            claim: Arc::new(RateLimiter::keyed(Quota::per_minute(
                NonZeroU32::new(CLAIM_PER_MIN).unwrap(),
            ))),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Client IP for rate limit keying, from the connection info.
/// In test mode, requests driven without a socket fall back to a fixed key.
fn client_ip(request: &Request) -> Option<String> {
    let from_socket = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    #[cfg(feature = "test-mode")]
    let from_socket = from_socket.or_else(|| Some("local".to_string()));

    from_socket
}

/// Middleware for rate limiting login attempts.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(ip) = client_ip(&request) else {
        return (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response();
    };

    match config.login.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many login attempts. Please wait before trying again.",
        )
            .into_response(),
    }
}

/// Middleware for rate limiting invite claims.
pub async fn rate_limit_claim(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(ip) = client_ip(&request) else {
        return (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response();
    };

    match config.claim.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests. Please try again later.",
        )
            .into_response(),
    }
}
