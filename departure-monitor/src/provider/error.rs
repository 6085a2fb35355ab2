//! Provider error types.

use crate::domain::ProviderId;

/// Errors from provider HTTP clients.
///
/// Payloads are plain strings so the error can be cloned out of the shared
/// response cache.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// Network failure (connection refused, DNS, reset, ...)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Request exceeded the configured timeout
    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Invalid or missing API key
    #[error("unauthorized (check API key)")]
    Unauthorized,

    /// Endpoint or stop not found
    #[error("not found (404)")]
    NotFound,

    /// Rate limited by the provider (HTTP 429)
    #[error("rate limited by provider")]
    RateLimited { retry_after_secs: Option<u64> },

    /// API returned an unexpected status code
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// JSON deserialization failed
    #[error("JSON parse error: {message}")]
    Json {
        message: String,
        body: Option<String>,
    },

    /// Protobuf feed could not be decoded
    #[error("feed decode error: {0}")]
    Decode(String),

    /// Provider needs an API key but none is configured
    #[error("{provider} requires an API key")]
    MissingApiKey { provider: ProviderId },

    /// Provider can only look up stops by id
    #[error("{provider} requires a station id")]
    MissingStopId { provider: ProviderId },

    /// Provider or feature not configured
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// Mock data directory or file is missing or malformed
    #[error("mock data error: {0}")]
    MockData(String),

    /// GTFS static data could not be loaded
    #[error("GTFS static data unavailable: {0}")]
    Gtfs(String),
}

impl ProviderError {
    /// Whether a later attempt may succeed without any configuration change.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Http(_)
                | ProviderError::Timeout { .. }
                | ProviderError::RateLimited { .. }
                | ProviderError::Api { .. }
        )
    }

    /// Build a JSON error, keeping a bounded prefix of the offending body.
    pub(crate) fn json(err: &serde_json::Error, body: &[u8]) -> Self {
        let body = String::from_utf8_lossy(body);
        ProviderError::Json {
            message: err.to_string(),
            body: Some(body.chars().take(500).collect()),
        }
    }
}

impl From<crate::gtfs::GtfsError> for ProviderError {
    fn from(err: crate::gtfs::GtfsError) -> Self {
        ProviderError::Gtfs(err.to_string())
    }
}
