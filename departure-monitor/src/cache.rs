//! Caching layer for provider responses.
//!
//! Several monitors may watch the same stop. Caching the stop events for a
//! short time means they share one upstream request per scan, and moka
//! coalesces concurrent misses for the same key into a single fetch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;

use crate::domain::{ProviderId, StopRef, TransportType};
use crate::provider::{Provider, ProviderError, StopEvent, StopSuggestion};

/// Cache key for stop events: (stop, requested limit).
type EventsKey = (StopRef, u32);

/// Cached stop events.
type EventsEntry = Arc<Vec<StopEvent>>;

/// Configuration for the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL for cached entries.
    pub ttl: Duration,

    /// Maximum number of cached entries.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            max_capacity: 1000,
        }
    }
}

/// Provider with caching.
///
/// Wraps another provider and caches `fetch_stop_events` responses. Stop
/// search is passed through uncached. Errors are never cached.
pub struct CachedProvider {
    inner: Arc<dyn Provider>,
    events: MokaCache<EventsKey, EventsEntry>,
}

impl CachedProvider {
    /// Create a new cached provider.
    pub fn new(inner: Arc<dyn Provider>, config: &CacheConfig) -> Self {
        let events = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .support_invalidation_closures()
            .build();

        Self { inner, events }
    }

    /// Stop events at `stop`, from cache when fresh.
    pub async fn stop_events(&self, stop: &StopRef, limit: u32) -> Result<EventsEntry, ProviderError> {
        let key = (stop.clone(), limit);
        let inner = Arc::clone(&self.inner);
        let stop = stop.clone();

        self.events
            .try_get_with(key, async move {
                let events = inner.fetch_stop_events(&stop, limit).await?;
                tracing::debug!(
                    provider = %inner.id(),
                    stop = %stop,
                    events = events.len(),
                    "cached stop events"
                );
                Ok::<_, ProviderError>(Arc::new(events))
            })
            .await
            .map_err(|e| (*e).clone())
    }

    /// Drop the cached events of one stop, so the next fetch goes upstream.
    pub fn invalidate_stop(&self, stop: &StopRef) {
        // Limits vary per monitor, so sweep every key for the stop.
        let stop = stop.clone();
        if let Err(e) = self.events.invalidate_entries_if(move |(s, _), _| *s == stop) {
            tracing::warn!(error = %e, "failed to invalidate cached stop events");
        }
    }
}

#[async_trait]
impl Provider for CachedProvider {
    fn id(&self) -> ProviderId {
        self.inner.id()
    }

    async fn fetch_stop_events(
        &self,
        stop: &StopRef,
        limit: u32,
    ) -> Result<Vec<StopEvent>, ProviderError> {
        Ok(self.stop_events(stop, limit).await?.as_ref().clone())
    }

    async fn search_stops(&self, term: &str) -> Result<Vec<StopSuggestion>, ProviderError> {
        self.inner.search_stops(term).await
    }

    fn transport_type(&self, event: &StopEvent) -> TransportType {
        self.inner.transport_type(event)
    }

    fn platform(&self, event: &StopEvent) -> String {
        self.inner.platform(event)
    }

    fn is_realtime(&self, event: &StopEvent) -> bool {
        self.inner.is_realtime(event)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Counts upstream calls; fails when `fail` is set.
    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingProvider {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl Provider for CountingProvider {
        fn id(&self) -> ProviderId {
            ProviderId::Vrr
        }

        async fn fetch_stop_events(
            &self,
            _stop: &StopRef,
            limit: u32,
        ) -> Result<Vec<StopEvent>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                return Err(ProviderError::Http("connection refused".into()));
            }
            Ok(vec![StopEvent::default(); limit as usize])
        }

        async fn search_stops(&self, _term: &str) -> Result<Vec<StopSuggestion>, ProviderError> {
            Ok(Vec::new())
        }
    }

    fn stop(id: &str) -> StopRef {
        StopRef::id(id).unwrap()
    }

    #[test]
    fn default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(30));
        assert_eq!(config.max_capacity, 1000);
    }

    #[tokio::test]
    async fn second_fetch_is_cached() {
        let upstream = CountingProvider::new(false);
        let cached = CachedProvider::new(upstream.clone(), &CacheConfig::default());

        let first = cached.fetch_stop_events(&stop("1"), 3).await.unwrap();
        let second = cached.fetch_stop_events(&stop("1"), 3).await.unwrap();

        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn key_includes_stop_and_limit() {
        let upstream = CountingProvider::new(false);
        let cached = CachedProvider::new(upstream.clone(), &CacheConfig::default());

        cached.fetch_stop_events(&stop("1"), 3).await.unwrap();
        cached.fetch_stop_events(&stop("1"), 5).await.unwrap();
        cached.fetch_stop_events(&stop("2"), 3).await.unwrap();

        assert_eq!(upstream.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn concurrent_misses_coalesce() {
        let upstream = CountingProvider::new(false);
        let cached = CachedProvider::new(upstream.clone(), &CacheConfig::default());
        let stop = stop("1");

        let (a, b) = tokio::join!(
            cached.fetch_stop_events(&stop, 3),
            cached.fetch_stop_events(&stop, 3)
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let upstream = CountingProvider::new(true);
        let cached = CachedProvider::new(upstream.clone(), &CacheConfig::default());

        assert!(matches!(
            cached.fetch_stop_events(&stop("1"), 3).await,
            Err(ProviderError::Http(_))
        ));
        assert!(cached.fetch_stop_events(&stop("1"), 3).await.is_err());
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_stop_forces_refetch() {
        let upstream = CountingProvider::new(false);
        let cached = CachedProvider::new(upstream.clone(), &CacheConfig::default());

        cached.fetch_stop_events(&stop("1"), 3).await.unwrap();
        cached.invalidate_stop(&stop("1"));
        cached.fetch_stop_events(&stop("1"), 3).await.unwrap();

        assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
    }
}
