//! Provider registry: one cached client per network, built from config.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::{CacheConfig, CachedProvider};
use crate::config::{AppConfig, ConfigError};
use crate::domain::ProviderId;
use crate::gtfs::{GtfsManager, default_static_url};
use crate::monitor::{Coordinator, Monitors};
use crate::provider::{
    EfaClient, EfaEndpoints, GtfsRtClient, GtfsRtConfig, HttpConfig, HttpFetcher, MockProvider,
    Provider, ProviderError, TRAFIKLAB_DEFAULT_URL, TrafiklabClient, default_realtime_url,
};

/// Request timeout for EFA and Trafiklab.
const API_TIMEOUT_SECS: u64 = 10;

/// Request timeout for GTFS-Realtime feeds.
const GTFS_RT_TIMEOUT_SECS: u64 = 30;

/// Every provider, wrapped in a response cache.
pub struct ProviderRegistry {
    providers: HashMap<ProviderId, Arc<CachedProvider>>,
    gtfs: Option<Arc<GtfsManager>>,
}

impl ProviderRegistry {
    /// Build every provider. No network requests are made.
    ///
    /// With `mock_dir` set, every network is served from mock files instead.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let cache = config.cache.events();

        if let Some(dir) = &config.mock_dir {
            tracing::warn!(dir = %dir.display(), "serving mock departures for every provider");
            let mut providers = HashMap::new();
            for provider in ProviderId::ALL {
                let mock = MockProvider::new(provider, dir).map_err(setup_error(provider))?;
                providers.insert(provider, cached(mock, &cache));
            }
            return Ok(Self {
                providers,
                gtfs: None,
            });
        }

        let fetcher = |provider: ProviderId, timeout_secs: u64| {
            HttpFetcher::new(HttpConfig::new(timeout_secs).with_retry(config.retry.clone()))
                .map_err(setup_error(provider))
        };

        let mut gtfs_sources = Vec::new();
        for provider in [ProviderId::NtaIe, ProviderId::GtfsDe] {
            let url = config
                .providers
                .gtfs(provider)
                .and_then(|s| s.static_url.clone())
                .or_else(|| default_static_url(provider).map(str::to_string));
            let timeout = config.providers.gtfs_static_timeout_secs(provider);
            if let (Some(url), Some(timeout)) = (url, timeout) {
                gtfs_sources.push((provider, url, fetcher(provider, timeout)?));
            }
        }
        let gtfs = Arc::new(GtfsManager::new(gtfs_sources, config.cache.gtfs()));

        let mut providers = HashMap::new();
        for provider in ProviderId::ALL {
            let client: Arc<dyn Provider> = match provider {
                ProviderId::Vrr | ProviderId::Kvv | ProviderId::Hvv => {
                    let section = config.providers.efa(provider);
                    let defaults = EfaEndpoints::default_for(provider)
                        .ok_or_else(|| ConfigError::Provider {
                            provider,
                            message: "no EFA endpoints".into(),
                        })?;
                    let endpoints = EfaEndpoints::new(
                        section
                            .and_then(|s| s.dm_url.clone())
                            .unwrap_or(defaults.dm_url),
                        section
                            .and_then(|s| s.stopfinder_url.clone())
                            .unwrap_or(defaults.stopfinder_url),
                    );
                    Arc::new(EfaClient::new(
                        provider,
                        endpoints,
                        fetcher(provider, API_TIMEOUT_SECS)?,
                    ))
                }
                ProviderId::TrafiklabSe => {
                    let section = &config.providers.trafiklab_se;
                    Arc::new(TrafiklabClient::new(
                        section
                            .base_url
                            .clone()
                            .unwrap_or_else(|| TRAFIKLAB_DEFAULT_URL.to_string()),
                        section.api_key.clone(),
                        fetcher(provider, API_TIMEOUT_SECS)?,
                    ))
                }
                ProviderId::NtaIe | ProviderId::GtfsDe => {
                    let section = config.providers.gtfs(provider);
                    let url = section
                        .and_then(|s| s.realtime_url.clone())
                        .or_else(|| default_realtime_url(provider).map(str::to_string))
                        .ok_or_else(|| ConfigError::Provider {
                            provider,
                            message: "no realtime feed URL".into(),
                        })?;
                    let rt = GtfsRtConfig::new(provider, url).with_api_keys(
                        section.and_then(|s| s.api_key.clone()),
                        section.and_then(|s| s.api_key_secondary.clone()),
                    );
                    Arc::new(GtfsRtClient::new(
                        rt,
                        fetcher(provider, GTFS_RT_TIMEOUT_SECS)?,
                        Arc::clone(&gtfs),
                    ))
                }
            };
            providers.insert(provider, Arc::new(CachedProvider::new(client, &cache)));
        }

        Ok(Self {
            providers,
            gtfs: Some(gtfs),
        })
    }

    /// The cached provider for a network.
    pub fn get(&self, provider: ProviderId) -> Option<&Arc<CachedProvider>> {
        self.providers.get(&provider)
    }

    pub fn gtfs(&self) -> Option<&Arc<GtfsManager>> {
        self.gtfs.as_ref()
    }

    /// Build a coordinator for every configured monitor.
    pub fn build_monitors(&self, config: &AppConfig) -> Result<Monitors, ConfigError> {
        let mut coordinators = Vec::with_capacity(config.monitors.len());
        for monitor in &config.monitors {
            let provider = self
                .get(monitor.provider)
                .ok_or_else(|| ConfigError::Provider {
                    provider: monitor.provider,
                    message: "provider not available".into(),
                })?;
            let provider: Arc<dyn Provider> = Arc::clone(provider) as Arc<dyn Provider>;
            let mut coordinator =
                Coordinator::new(monitor.clone(), provider, config.rate_limit)?;
            if let Some(gtfs) = &self.gtfs {
                coordinator = coordinator.with_gtfs(Arc::clone(gtfs));
            }
            coordinators.push(coordinator);
        }
        Ok(Monitors::new(coordinators)?)
    }

    /// Release shared resources.
    pub async fn shutdown(&self) {
        if let Some(gtfs) = &self.gtfs {
            gtfs.shutdown().await;
        }
    }
}

fn cached(provider: impl Provider + 'static, config: &CacheConfig) -> Arc<CachedProvider> {
    Arc::new(CachedProvider::new(Arc::new(provider), config))
}

fn setup_error(provider: ProviderId) -> impl Fn(ProviderError) -> ConfigError {
    move |e| ConfigError::Provider {
        provider,
        message: e.to_string(),
    }
}
