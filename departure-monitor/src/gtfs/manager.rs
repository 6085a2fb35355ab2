//! Shared, reference-counted GTFS static data.
//!
//! Static feeds are large (GTFS-DE is hundreds of megabytes), so every
//! monitor of a provider shares one parsed copy. Monitors `acquire` the feed
//! when they start and `release` it when they stop; the last release frees
//! the memory. Concurrent loads of the same feed wait on one download.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::domain::ProviderId;
use crate::provider::HttpFetcher;

use super::cache::{GtfsCacheConfig, GtfsDiskCache};
use super::error::GtfsError;
use super::static_data::GtfsStatic;

/// Public static feed of a provider, or `None` for non-GTFS providers.
pub fn default_static_url(provider: ProviderId) -> Option<&'static str> {
    match provider {
        ProviderId::NtaIe => {
            Some("https://www.transportforireland.ie/transitData/Data/GTFS_Realtime.zip")
        }
        ProviderId::GtfsDe => Some("https://download.gtfs.de/germany/free/latest.zip"),
        _ => None,
    }
}

/// Download timeout for a provider's static feed, in seconds.
///
/// GTFS-DE is hundreds of megabytes and needs far longer than an API call.
pub fn default_static_timeout_secs(provider: ProviderId) -> Option<u64> {
    match provider {
        ProviderId::NtaIe => Some(300),
        ProviderId::GtfsDe => Some(600),
        _ => None,
    }
}

struct Feed {
    url: String,
    fetcher: HttpFetcher,
    disk: GtfsDiskCache,
    data: RwLock<Option<Arc<GtfsStatic>>>,
    loaded_at: RwLock<Option<DateTime<Utc>>>,
    /// Serializes downloads and parses of this feed.
    load_lock: Mutex<()>,
    refs: AtomicUsize,
}

/// Owner of the GTFS static data of every configured feed.
pub struct GtfsManager {
    feeds: HashMap<ProviderId, Feed>,
    shut_down: AtomicBool,
}

impl GtfsManager {
    /// Create a manager for the given `(provider, static feed URL, fetcher)`
    /// sources.
    pub fn new(
        sources: impl IntoIterator<Item = (ProviderId, String, HttpFetcher)>,
        cache: GtfsCacheConfig,
    ) -> Self {
        let feeds = sources
            .into_iter()
            .map(|(provider, url, fetcher)| {
                let feed = Feed {
                    url,
                    fetcher,
                    disk: GtfsDiskCache::new(&cache, provider.as_str()),
                    data: RwLock::new(None),
                    loaded_at: RwLock::new(None),
                    load_lock: Mutex::new(()),
                    refs: AtomicUsize::new(0),
                };
                (provider, feed)
            })
            .collect();

        Self {
            feeds,
            shut_down: AtomicBool::new(false),
        }
    }

    fn feed(&self, provider: ProviderId) -> Result<&Feed, GtfsError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(GtfsError::ShutDown);
        }
        self.feeds
            .get(&provider)
            .ok_or_else(|| GtfsError::NotConfigured(provider.to_string()))
    }

    /// Whether a static feed is configured for `provider`.
    pub fn is_configured(&self, provider: ProviderId) -> bool {
        self.feeds.contains_key(&provider)
    }

    /// Register a user of `provider`'s data. Returns the new user count.
    pub fn acquire(&self, provider: ProviderId) -> Result<usize, GtfsError> {
        let feed = self.feed(provider)?;
        let refs = feed.refs.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(provider = %provider, refs, "acquired GTFS static data");
        Ok(refs)
    }

    /// Drop a user of `provider`'s data. The last release frees the data.
    pub async fn release(&self, provider: ProviderId) {
        let Some(feed) = self.feeds.get(&provider) else {
            return;
        };

        let previous = feed
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);

        if previous <= 1 {
            let dropped = feed.data.write().await.take();
            if dropped.is_some() {
                tracing::info!(provider = %provider, "released GTFS static data");
            }
        }
    }

    /// Number of registered users of `provider`'s data.
    pub fn ref_count(&self, provider: ProviderId) -> usize {
        self.feeds
            .get(&provider)
            .map_or(0, |f| f.refs.load(Ordering::Acquire))
    }

    /// Currently loaded data, without triggering a load.
    #[cfg(test)]
    async fn get(&self, provider: ProviderId) -> Option<Arc<GtfsStatic>> {
        self.feeds.get(&provider)?.data.read().await.clone()
    }

    /// When the data of `provider` was last (re)loaded.
    pub async fn loaded_at(&self, provider: ProviderId) -> Option<DateTime<Utc>> {
        *self.feeds.get(&provider)?.loaded_at.read().await
    }

    /// Return the data of `provider`, loading it from disk or network if needed.
    pub async fn ensure_loaded(&self, provider: ProviderId) -> Result<Arc<GtfsStatic>, GtfsError> {
        let feed = self.feed(provider)?;

        if let Some(data) = feed.data.read().await.clone() {
            return Ok(data);
        }

        let _guard = feed.load_lock.lock().await;

        // Another caller may have finished loading while we waited
        if let Some(data) = feed.data.read().await.clone() {
            return Ok(data);
        }

        self.load(provider, feed, false).await
    }

    /// Re-download `provider`'s feed, ignoring the disk cache.
    pub async fn force_update(&self, provider: ProviderId) -> Result<Arc<GtfsStatic>, GtfsError> {
        let feed = self.feed(provider)?;
        let _guard = feed.load_lock.lock().await;
        self.load(provider, feed, true).await
    }

    /// Drop all data and refuse further loads.
    pub async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
        for (provider, feed) in &self.feeds {
            if feed.data.write().await.take().is_some() {
                tracing::info!(provider = %provider, "cleared GTFS static data");
            }
        }
    }

    async fn load(
        &self,
        provider: ProviderId,
        feed: &Feed,
        force: bool,
    ) -> Result<Arc<GtfsStatic>, GtfsError> {
        let cached = if force { None } else { feed.disk.load() };

        let data = match cached {
            Some(bytes) => match parse_blocking(bytes).await {
                Ok((data, _)) => {
                    tracing::info!(provider = %provider, "loaded GTFS static data from disk cache");
                    Some(data)
                }
                Err(e) => {
                    tracing::warn!(provider = %provider, error = %e, "cached GTFS archive is corrupt, deleting");
                    feed.disk.clear();
                    None
                }
            },
            None => None,
        };

        let data = match data {
            Some(data) => data,
            None => self.download(provider, feed).await?,
        };

        let data = Arc::new(data);
        *feed.data.write().await = Some(Arc::clone(&data));
        *feed.loaded_at.write().await = Some(Utc::now());
        Ok(data)
    }

    async fn download(&self, provider: ProviderId, feed: &Feed) -> Result<GtfsStatic, GtfsError> {
        tracing::info!(provider = %provider, url = %feed.url, "downloading GTFS static data");

        let url = &feed.url;
        let bytes = feed
            .fetcher
            .fetch(|http| http.get(url))
            .await
            .map_err(|e| GtfsError::Download(e.to_string()))?;

        let (data, bytes) = parse_blocking(bytes).await?;

        if let Err(e) = feed.disk.save(&bytes) {
            tracing::warn!(provider = %provider, error = %e, "failed to cache GTFS archive");
        }
        Ok(data)
    }
}

/// Parse off the async runtime; returns the bytes back for caching.
async fn parse_blocking(bytes: Vec<u8>) -> Result<(GtfsStatic, Vec<u8>), GtfsError> {
    tokio::task::spawn_blocking(move || GtfsStatic::from_zip_bytes(&bytes).map(|data| (data, bytes)))
        .await
        .map_err(|e| GtfsError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs::static_data::test_support::sample_feed;
    use crate::provider::{HttpConfig, RetryPolicy};
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(HttpConfig::new(5).with_retry(RetryPolicy::none())).unwrap()
    }

    fn manager(dir: &std::path::Path, url: &str) -> GtfsManager {
        GtfsManager::new(
            [(ProviderId::NtaIe, url.to_string(), fetcher())],
            GtfsCacheConfig::new(dir),
        )
    }

    /// Port 9 (discard) is never listening in test environments.
    const UNREACHABLE: &str = "http://127.0.0.1:9/gtfs.zip";

    #[tokio::test]
    async fn loads_from_disk_cache() {
        let dir = tempdir().unwrap();
        let cache = GtfsDiskCache::new(&GtfsCacheConfig::new(dir.path()), "nta_ie");
        cache.save(&sample_feed()).unwrap();

        let manager = manager(dir.path(), UNREACHABLE);
        let data = manager.ensure_loaded(ProviderId::NtaIe).await.unwrap();
        assert_eq!(data.stats().stops, 3);
        assert!(manager.loaded_at(ProviderId::NtaIe).await.is_some());
    }

    #[tokio::test]
    async fn concurrent_loads_share_data() {
        let dir = tempdir().unwrap();
        let cache = GtfsDiskCache::new(&GtfsCacheConfig::new(dir.path()), "nta_ie");
        cache.save(&sample_feed()).unwrap();

        let manager = manager(dir.path(), UNREACHABLE);
        let (a, b) = tokio::join!(
            manager.ensure_loaded(ProviderId::NtaIe),
            manager.ensure_loaded(ProviderId::NtaIe)
        );
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    }

    #[tokio::test]
    async fn downloads_and_caches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gtfs.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(sample_feed()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let manager = manager(dir.path(), &format!("{}/gtfs.zip", server.uri()));

        let data = manager.ensure_loaded(ProviderId::NtaIe).await.unwrap();
        assert_eq!(data.trip_headsign("t1"), Some("Phoenix Park"));
        assert!(dir.path().join("gtfs_static_nta_ie.zip").exists());

        // Second call is served from memory
        manager.ensure_loaded(ProviderId::NtaIe).await.unwrap();
    }

    #[tokio::test]
    async fn force_update_ignores_fresh_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gtfs.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(sample_feed()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let cache = GtfsDiskCache::new(&GtfsCacheConfig::new(dir.path()), "nta_ie");
        cache.save(&sample_feed()).unwrap();

        let manager = manager(dir.path(), &format!("{}/gtfs.zip", server.uri()));
        let cached = manager.ensure_loaded(ProviderId::NtaIe).await.unwrap();
        let updated = manager.force_update(ProviderId::NtaIe).await.unwrap();

        assert!(!Arc::ptr_eq(&cached, &updated));
        assert_eq!(updated.stats().stops, 3);
    }

    #[tokio::test]
    async fn corrupt_cache_is_deleted() {
        let dir = tempdir().unwrap();
        let cache = GtfsDiskCache::new(&GtfsCacheConfig::new(dir.path()), "nta_ie");
        cache.save(b"not a zip").unwrap();

        let manager = manager(dir.path(), UNREACHABLE);
        let result = manager.ensure_loaded(ProviderId::NtaIe).await;

        assert!(matches!(result, Err(GtfsError::Download(_))));
        assert!(!cache.zip_path().exists());
    }

    #[tokio::test]
    async fn last_release_frees_data() {
        let dir = tempdir().unwrap();
        let cache = GtfsDiskCache::new(&GtfsCacheConfig::new(dir.path()), "nta_ie");
        cache.save(&sample_feed()).unwrap();
        let manager = manager(dir.path(), UNREACHABLE);

        assert_eq!(manager.acquire(ProviderId::NtaIe).unwrap(), 1);
        assert_eq!(manager.acquire(ProviderId::NtaIe).unwrap(), 2);
        manager.ensure_loaded(ProviderId::NtaIe).await.unwrap();

        manager.release(ProviderId::NtaIe).await;
        assert_eq!(manager.ref_count(ProviderId::NtaIe), 1);
        assert!(manager.get(ProviderId::NtaIe).await.is_some());

        manager.release(ProviderId::NtaIe).await;
        assert_eq!(manager.ref_count(ProviderId::NtaIe), 0);
        assert!(manager.get(ProviderId::NtaIe).await.is_none());

        // Extra releases don't underflow
        manager.release(ProviderId::NtaIe).await;
        assert_eq!(manager.ref_count(ProviderId::NtaIe), 0);
    }

    #[tokio::test]
    async fn shutdown_refuses_loads() {
        let dir = tempdir().unwrap();
        let manager = manager(dir.path(), UNREACHABLE);
        manager.shutdown().await;

        assert!(matches!(
            manager.ensure_loaded(ProviderId::NtaIe).await,
            Err(GtfsError::ShutDown)
        ));
        assert!(matches!(
            manager.acquire(ProviderId::NtaIe),
            Err(GtfsError::ShutDown)
        ));
    }

    #[tokio::test]
    async fn unconfigured_provider() {
        let dir = tempdir().unwrap();
        let manager = manager(dir.path(), UNREACHABLE);
        assert!(!manager.is_configured(ProviderId::GtfsDe));
        assert!(matches!(
            manager.ensure_loaded(ProviderId::GtfsDe).await,
            Err(GtfsError::NotConfigured(_))
        ));
    }

    #[test]
    fn default_urls_only_for_gtfs_providers() {
        for id in ProviderId::ALL {
            assert_eq!(default_static_url(id).is_some(), id.is_gtfs());
            assert_eq!(default_static_timeout_secs(id).is_some(), id.is_gtfs());
        }
        assert_eq!(default_static_timeout_secs(ProviderId::GtfsDe), Some(600));
    }
}
