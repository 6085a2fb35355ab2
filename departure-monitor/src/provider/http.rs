//! Shared HTTP plumbing for provider clients.
//!
//! Every provider talks to a flaky public endpoint. The fetcher bounds
//! concurrent requests with a semaphore, maps status codes to
//! [`ProviderError`] variants, and retries transient failures with
//! exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderValue, RETRY_AFTER, USER_AGENT};
use serde::Deserialize;
use tokio::sync::Semaphore;

use super::error::ProviderError;

/// Default maximum concurrent requests per provider.
const DEFAULT_MAX_CONCURRENT: usize = 5;

const DEFAULT_USER_AGENT: &str = concat!("departure-monitor/", env!("CARGO_PKG_VERSION"));

/// Exponential backoff between attempts.
///
/// After failed attempt `n` (1-based) the fetcher waits `base_delay * 2^n`,
/// capped at `max_delay`: with the defaults that is 2 s, then 4 s.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.min(32));
        let millis = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(millis)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Configuration for an [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Sent as `User-Agent`
    pub user_agent: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    pub retry: RetryPolicy,
}

impl HttpConfig {
    /// Create a config with the given request timeout.
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            retry: RetryPolicy::default(),
        }
    }

    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Rate-limited, retrying HTTP client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: reqwest::Client,
    semaphore: Arc<Semaphore>,
    retry: RetryPolicy,
    timeout_secs: u64,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: HttpConfig) -> Result<Self, ProviderError> {
        let mut headers = reqwest::header::HeaderMap::new();
        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|_| ProviderError::NotConfigured("invalid user agent".to_string()))?;
        headers.insert(USER_AGENT, user_agent);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        Ok(Self {
            http,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            retry: config.retry,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Send the request produced by `build`, retrying transient failures.
    ///
    /// `build` is called once per attempt. Returns the body of the first
    /// successful (2xx) response, or the last error.
    pub async fn fetch<F>(&self, build: F) -> Result<Vec<u8>, ProviderError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let attempts = self.retry.attempts();
        let mut attempt = 1;

        loop {
            let result = self.fetch_once(&build).await;

            let err = match result {
                Ok(body) => return Ok(body),
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= attempts {
                return Err(err);
            }

            let mut delay = self.retry.delay_after(attempt);
            if let ProviderError::RateLimited {
                retry_after_secs: Some(secs),
            } = &err
            {
                delay = delay.max(Duration::from_secs(*secs).min(Duration::from_millis(
                    self.retry.max_delay_ms,
                )));
            }

            tracing::warn!(
                attempt,
                max_attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "request failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn fetch_once<F>(&self, build: &F) -> Result<Vec<u8>, ProviderError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ProviderError::NotConfigured("HTTP fetcher closed".to_string()))?;

        let response = build(&self.http)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProviderError::Unauthorized);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        Ok(body.to_vec())
    }

    fn map_transport_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            ProviderError::Http(err.to_string())
        }
    }
}
