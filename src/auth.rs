//! Rate & Auth Gate (SPEC_FULL.md §8): bearer-token (and, on the
//! streaming endpoint only, cookie-fallback) authentication plus a
//! per-user token-bucket rate limiter, both enforced as axum middleware
//! ahead of every handler.
//!
//! The constant-time comparison is lifted from
//! `src/cloudllm/mcp_server_builder_utils.rs::AuthConfig::validate`
//! (`Sha256::digest` + `subtle::ConstantTimeEq`, to avoid a timing oracle
//! on the bearer token) and extended with the cookie-header fallback this
//! crate's streaming endpoint needs (`EventSource` cannot set a custom
//! `Authorization` header, so a session cookie is accepted there as an
//! equivalent credential — SPEC_FULL.md's resolved OQ-3). The rate
//! limiter has no teacher precedent; it's a standard `DashMap`-keyed
//! lazily-refilled token bucket, consistent with the singleton-pool
//! idioms already established by `http_client_pool.rs`.

use crate::config::AgentServerConfig;
use crate::error::AgentError;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;
use subtle::ConstantTimeEq;

/// Constant-time comparison of a presented credential against the
/// configured bearer token, hashing both sides first so the comparison
/// operates on fixed-length digests regardless of input length.
fn constant_time_eq(candidate: &str, expected: &str) -> bool {
    let candidate_digest = Sha256::digest(candidate.as_bytes());
    let expected_digest = Sha256::digest(expected.as_bytes());
    candidate_digest.ct_eq(&expected_digest).into()
}

/// Resolves the caller's identity from an `Authorization: Bearer` header,
/// falling back to the configured session cookie when present and no
/// bearer header was given. Returns the raw credential value so the
/// caller can also use it as the per-user rate-limit key.
pub fn authenticate<B>(req: &Request<B>, config: &AgentServerConfig) -> Result<String, AgentError> {
    if let Some(header) = req.headers().get(axum::http::header::AUTHORIZATION) {
        let value = header.to_str().map_err(|_| AgentError::Auth("malformed Authorization header".to_string()))?;
        let token = value.strip_prefix("Bearer ").ok_or_else(|| AgentError::Auth("expected Bearer scheme".to_string()))?;
        if constant_time_eq(token, &config.bearer_token) {
            return Ok(token.to_string());
        }
        return Err(AgentError::Auth("invalid bearer token".to_string()));
    }

    let jar = CookieJar::from_headers(req.headers());
    if let Some(cookie) = jar.get(&config.streaming_cookie_name) {
        if constant_time_eq(cookie.value(), &config.bearer_token) {
            return Ok(cookie.value().to_string());
        }
        return Err(AgentError::Auth("invalid session cookie".to_string()));
    }

    Err(AgentError::Auth("no credential presented".to_string()))
}

/// A lazily-refilled token bucket for one caller.
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Per-user rate limiter shared process-wide, one bucket per caller
/// identity (the bearer token / cookie value resolved by
/// [`authenticate`]).
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    capacity: f64,
    refill_per_sec: f64,
}

impl RateLimiter {
    pub fn new(per_minute: u32, burst: u32) -> Arc<Self> {
        Arc::new(Self {
            buckets: DashMap::new(),
            capacity: burst as f64,
            refill_per_sec: per_minute as f64 / 60.0,
        })
    }

    /// Attempts to consume one token for `key`. Returns `Ok(())` on
    /// success, or the number of seconds to wait before retrying.
    pub fn try_acquire(&self, key: &str) -> Result<(), u64> {
        let now = Instant::now();
        let mut entry = self.buckets.entry(key.to_string()).or_insert_with(|| Bucket { tokens: self.capacity, last_refill: now });

        let elapsed = now.duration_since(entry.last_refill).as_secs_f64();
        entry.tokens = (entry.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        entry.last_refill = now;

        if entry.tokens >= 1.0 {
            entry.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - entry.tokens;
            let wait_secs = (deficit / self.refill_per_sec).ceil().max(1.0) as u64;
            Err(wait_secs)
        }
    }
}

/// Shared state the auth/rate-limit middleware layers need.
#[derive(Clone)]
pub struct AuthState {
    pub config: Arc<AgentServerConfig>,
    pub rate_limiter: Arc<RateLimiter>,
}

/// axum middleware enforcing auth then rate limiting, in that order — a
/// request with no valid credential is rejected before it can consume a
/// rate-limit token, so an unauthenticated prober can't exhaust a
/// legitimate caller's bucket.
pub async fn auth_and_rate_limit(
    State(state): State<AuthState>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, axum::http::StatusCode> {
    let identity = authenticate(&req, &state.config).map_err(|_| axum::http::StatusCode::UNAUTHORIZED)?;

    if state.rate_limiter.try_acquire(&identity).is_err() {
        return Err(axum::http::StatusCode::TOO_MANY_REQUESTS);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_matches_equal_strings() {
        assert!(constant_time_eq("secret", "secret"));
        assert!(!constant_time_eq("secret", "wrong"));
    }

    #[test]
    fn rate_limiter_allows_burst_then_throttles() {
        let limiter = RateLimiter::new(60, 2);
        assert!(limiter.try_acquire("user-1").is_ok());
        assert!(limiter.try_acquire("user-1").is_ok());
        assert!(limiter.try_acquire("user-1").is_err());
    }

    #[test]
    fn rate_limiter_tracks_callers_independently() {
        let limiter = RateLimiter::new(60, 1);
        assert!(limiter.try_acquire("user-1").is_ok());
        assert!(limiter.try_acquire("user-2").is_ok());
    }
}
