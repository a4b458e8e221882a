//! Raw-Data Client (SPEC_FULL.md §1): the only component permitted to make
//! outbound network calls for portfolio/price data.
//!
//! The pooled-client singleton and JSON request helper are adapted from
//! `src/cloudllm/clients/common.rs`'s `SHARED_HTTP_CLIENT` (`lazy_static`
//! there, `once_cell::Lazy` + `DashMap` here to key pools per base URL the
//! way `http_client_pool.rs` does). The retry/backoff helper has no
//! teacher precedent — this codebase's agent SDK never retries a failed
//! call anywhere — and is authored fresh, using `rand` for jitter the way
//! the sibling `open-agent-sdk-rust` example repos declare it in their
//! own `Cargo.toml` comments.

use crate::error::AgentError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

static CLIENT_POOL: Lazy<DashMap<String, Client>> = Lazy::new(DashMap::new);

fn pooled_client(base_url: &str, request_timeout_secs: u64) -> Client {
    if let Some(existing) = CLIENT_POOL.get(base_url) {
        return existing.clone();
    }
    let client = Client::builder()
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Duration::from_secs(60))
        .timeout(Duration::from_secs(request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .expect("reqwest client builder with static config cannot fail");
    CLIENT_POOL.insert(base_url.to_string(), client.clone());
    client
}

/// Retry policy: 3 attempts total, exponential backoff starting at 200ms
/// and doubling, capped at 2s, plus up to 100ms of jitter so concurrent
/// retries on the same upstream outage don't lock-step.
const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF_MS: u64 = 200;
const MAX_BACKOFF_MS: u64 = 2_000;

fn backoff_delay(attempt: u32) -> Duration {
    let exp = BASE_BACKOFF_MS.saturating_mul(1u64 << attempt.min(5)).min(MAX_BACKOFF_MS);
    let jitter_ms = rand::thread_rng().gen_range(0..=100);
    Duration::from_millis(exp + jitter_ms)
}

/// Whether an HTTP status is worth retrying. 429 and 5xx are transient;
/// everything else is a permanent caller-side or data-side fault.
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Read-only accessor over the portfolio/price data backend.
///
/// One method per raw-data operation needed by the six tool handlers in
/// `crate::tools`; no method here ever accepts a mutating verb, matching
/// the read-only-data-tools constraint in SPEC_FULL.md §1.
#[async_trait]
pub trait RawDataClient: Send + Sync {
    async fn portfolio_complete(&self, portfolio_id: &str, as_of: DateTime<Utc>) -> Result<serde_json::Value, AgentError>;
    async fn portfolio_data_quality(&self, portfolio_id: &str) -> Result<serde_json::Value, AgentError>;
    async fn positions_details(&self, portfolio_id: &str, as_of: DateTime<Utc>) -> Result<serde_json::Value, AgentError>;
    async fn prices_historical(&self, symbols: &[String], lookback_days: u32) -> Result<serde_json::Value, AgentError>;
    async fn prices_quotes(&self, symbols: &[String]) -> Result<serde_json::Value, AgentError>;
    async fn factor_etf_prices(&self, etf_symbols: &[String], lookback_days: u32) -> Result<serde_json::Value, AgentError>;
}

/// `reqwest`-backed implementation talking to a single configured base URL.
pub struct HttpRawDataClient {
    base_url: String,
    client: Client,
}

impl HttpRawDataClient {
    pub fn new(base_url: String, request_timeout_secs: u64) -> Self {
        let client = pooled_client(&base_url, request_timeout_secs);
        Self { base_url, client }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, AgentError> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_err: Option<AgentError> = None;

        for attempt in 0..MAX_ATTEMPTS {
            let response = self.client.get(&url).query(query).send().await;
            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp.json::<T>().await.map_err(|e| {
                            AgentError::UpstreamPermanent(format!("malformed response body from {}: {}", path, e))
                        });
                    }
                    if is_retryable_status(status) && attempt + 1 < MAX_ATTEMPTS {
                        if log::log_enabled!(log::Level::Warn) {
                            log::warn!("raw data backend {} returned {}, attempt {}/{}", path, status, attempt + 1, MAX_ATTEMPTS);
                        }
                        last_err = Some(AgentError::UpstreamTransient(format!("{} returned {}", path, status)));
                        tokio::time::sleep(backoff_delay(attempt)).await;
                        continue;
                    }
                    let err = if is_retryable_status(status) {
                        AgentError::UpstreamTransient(format!("{} returned {} after {} attempts", path, status, MAX_ATTEMPTS))
                    } else {
                        AgentError::UpstreamPermanent(format!("{} returned {}", path, status))
                    };
                    return Err(err);
                }
                Err(e) => {
                    if log::log_enabled!(log::Level::Warn) {
                        log::warn!("raw data backend {} request failed: {} (attempt {}/{})", path, e, attempt + 1, MAX_ATTEMPTS);
                    }
                    last_err = Some(AgentError::UpstreamTransient(format!("{} request failed: {}", path, e)));
                    if attempt + 1 < MAX_ATTEMPTS {
                        tokio::time::sleep(backoff_delay(attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| AgentError::UpstreamTransient(format!("{} exhausted retries", path))))
    }
}

#[async_trait]
impl RawDataClient for HttpRawDataClient {
    async fn portfolio_complete(&self, portfolio_id: &str, as_of: DateTime<Utc>) -> Result<serde_json::Value, AgentError> {
        self.get_json(
            "/portfolios/complete",
            &[("portfolio_id", portfolio_id.to_string()), ("as_of", as_of.to_rfc3339())],
        )
        .await
    }

    async fn portfolio_data_quality(&self, portfolio_id: &str) -> Result<serde_json::Value, AgentError> {
        self.get_json("/portfolios/data-quality", &[("portfolio_id", portfolio_id.to_string())])
            .await
    }

    async fn positions_details(&self, portfolio_id: &str, as_of: DateTime<Utc>) -> Result<serde_json::Value, AgentError> {
        self.get_json(
            "/positions/details",
            &[("portfolio_id", portfolio_id.to_string()), ("as_of", as_of.to_rfc3339())],
        )
        .await
    }

    async fn prices_historical(&self, symbols: &[String], lookback_days: u32) -> Result<serde_json::Value, AgentError> {
        self.get_json(
            "/prices/historical",
            &[("symbols", symbols.join(",")), ("lookback_days", lookback_days.to_string())],
        )
        .await
    }

    async fn prices_quotes(&self, symbols: &[String]) -> Result<serde_json::Value, AgentError> {
        self.get_json("/prices/quotes", &[("symbols", symbols.join(","))]).await
    }

    async fn factor_etf_prices(&self, etf_symbols: &[String], lookback_days: u32) -> Result<serde_json::Value, AgentError> {
        self.get_json(
            "/prices/factor-etfs",
            &[("symbols", etf_symbols.join(",")), ("lookback_days", lookback_days.to_string())],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_never_exceeds_cap_plus_jitter() {
        for attempt in 0..6 {
            let delay = backoff_delay(attempt);
            assert!(delay.as_millis() <= (MAX_BACKOFF_MS + 100) as u128);
        }
    }

    #[test]
    fn backoff_grows_with_attempt_before_cap() {
        assert!(backoff_delay(0).as_millis() < backoff_delay(2).as_millis() + 101);
    }

    #[test]
    fn retryable_status_classification() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
    }
}
