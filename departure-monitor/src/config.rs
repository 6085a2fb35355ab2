//! Application configuration.
//!
//! Read from a TOML file, then overridden by environment variables for
//! secrets:
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:3000"
//!
//! [rate_limit]
//! per_minute = 30
//!
//! [providers.nta_ie]
//! api_key = "..."
//!
//! [[monitors]]
//! id = "home"
//! provider = "vrr"
//! stop = { station_id = "20018235" }
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::domain::ProviderId;
use crate::gtfs::{GtfsCacheConfig, default_static_timeout_secs};
use crate::monitor::{MonitorConfig, MonitorError};
use crate::provider::RetryPolicy;
use crate::rate_limit::RateLimitConfig;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "DEPARTURE_MONITOR_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "departure-monitor.toml";

/// Serve every provider from mock files in this directory.
pub const MOCK_DIR_ENV: &str = "DEPARTURE_MONITOR_MOCK_DIR";
pub const TRAFIKLAB_API_KEY_ENV: &str = "TRAFIKLAB_API_KEY";
pub const NTA_API_KEY_ENV: &str = "NTA_API_KEY";
pub const NTA_API_KEY_SECONDARY_ENV: &str = "NTA_API_KEY_SECONDARY";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[error("invalid configuration in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error("monitor {monitor:?} uses {provider}, which requires an API key")]
    MissingApiKey {
        monitor: String,
        provider: ProviderId,
    },

    #[error("failed to set up {provider}: {message}")]
    Provider {
        provider: ProviderId,
        message: String,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cache: CacheSection,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryPolicy,
    pub providers: ProvidersConfig,
    pub monitors: Vec<MonitorConfig>,
    /// When set, every provider serves mock data from this directory.
    pub mock_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

/// `[cache]`: response cache and GTFS static cache.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Stop event cache TTL.
    pub ttl_secs: u64,
    pub max_capacity: u64,
    /// Directory for downloaded GTFS archives.
    pub gtfs_dir: PathBuf,
    pub gtfs_ttl_hours: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        let events = CacheConfig::default();
        Self {
            ttl_secs: events.ttl.as_secs(),
            max_capacity: events.max_capacity,
            gtfs_dir: GtfsCacheConfig::default().dir,
            gtfs_ttl_hours: 24,
        }
    }
}

impl CacheSection {
    pub fn events(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(self.ttl_secs),
            max_capacity: self.max_capacity,
        }
    }

    pub fn gtfs(&self) -> GtfsCacheConfig {
        GtfsCacheConfig::new(self.gtfs_dir.clone())
            .with_ttl(Duration::from_secs(self.gtfs_ttl_hours * 60 * 60))
    }
}

/// `[providers.*]`: endpoint overrides and credentials.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub vrr: EfaSection,
    pub kvv: EfaSection,
    pub hvv: EfaSection,
    pub trafiklab_se: TrafiklabSection,
    pub nta_ie: GtfsSection,
    pub gtfs_de: GtfsSection,
}

impl ProvidersConfig {
    pub fn efa(&self, provider: ProviderId) -> Option<&EfaSection> {
        match provider {
            ProviderId::Vrr => Some(&self.vrr),
            ProviderId::Kvv => Some(&self.kvv),
            ProviderId::Hvv => Some(&self.hvv),
            _ => None,
        }
    }

    pub fn gtfs(&self, provider: ProviderId) -> Option<&GtfsSection> {
        match provider {
            ProviderId::NtaIe => Some(&self.nta_ie),
            ProviderId::GtfsDe => Some(&self.gtfs_de),
            _ => None,
        }
    }

    /// Download timeout for `provider`'s static GTFS archive.
    pub fn gtfs_static_timeout_secs(&self, provider: ProviderId) -> Option<u64> {
        self.gtfs(provider)
            .and_then(|s| s.static_timeout_secs)
            .or_else(|| default_static_timeout_secs(provider))
    }

    /// Whether `provider` has the API key it needs, if it needs one.
    pub fn has_api_key(&self, provider: ProviderId) -> bool {
        match provider {
            ProviderId::TrafiklabSe => self.trafiklab_se.api_key.is_some(),
            ProviderId::NtaIe => self.nta_ie.api_key.is_some(),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EfaSection {
    pub dm_url: Option<String>,
    pub stopfinder_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrafiklabSection {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GtfsSection {
    pub static_url: Option<String>,
    /// Static archive download timeout, defaults to 300 s (NTA) or 600 s (GTFS-DE)
    pub static_timeout_secs: Option<u64>,
    pub realtime_url: Option<String>,
    pub api_key: Option<String>,
    pub api_key_secondary: Option<String>,
}

impl AppConfig {
    /// Load from the file named by `DEPARTURE_MONITOR_CONFIG`, then apply
    /// environment overrides and validate.
    ///
    /// A missing file at the default path yields the default configuration;
    /// a missing file that was named explicitly is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var(CONFIG_PATH_ENV).ok();
        let path = PathBuf::from(explicit.as_deref().unwrap_or(DEFAULT_CONFIG_PATH));

        let mut config = if explicit.is_none() && !path.exists() {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        } else {
            Self::from_path(&path)?
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file without environment overrides.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&text).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Parse TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })
    }

    /// Override secrets and the mock directory from the environment.
    ///
    /// Blank values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(TRAFIKLAB_API_KEY_ENV) {
            self.providers.trafiklab_se.api_key = Some(key);
        }
        if let Some(key) = get(NTA_API_KEY_ENV) {
            self.providers.nta_ie.api_key = Some(key);
        }
        if let Some(key) = get(NTA_API_KEY_SECONDARY_ENV) {
            self.providers.nta_ie.api_key_secondary = Some(key);
        }
        if let Some(dir) = get(MOCK_DIR_ENV) {
            self.mock_dir = Some(PathBuf::from(dir));
        }
    }

    /// Validate every monitor and check that required API keys are present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for monitor in &self.monitors {
            monitor.validate()?;
            if !seen.insert(monitor.id.as_str()) {
                return Err(MonitorError::InvalidConfig {
                    monitor: monitor.id.clone(),
                    reason: "duplicate monitor id".into(),
                }
                .into());
            }
            if self.mock_dir.is_none() && !self.providers.has_api_key(monitor.provider) {
                return Err(ConfigError::MissingApiKey {
                    monitor: monitor.id.clone(),
                    provider: monitor.provider,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const SAMPLE: &str = r#"
        [server]
        bind = "0.0.0.0:8080"

        [cache]
        ttl_secs = 15
        gtfs_dir = "/var/cache/departures"

        [rate_limit]
        per_minute = 30

        [retry]
        max_attempts = 5

        [providers.hvv]
        dm_url = "https://example.test/XML_DM_REQUEST"

        [providers.nta_ie]
        api_key = "from-file"

        [[monitors]]
        id = "home"
        provider = "vrr"
        stop = { place = "Düsseldorf", name = "Elbruchstrasse" }

        [[monitors]]
        id = "dublin"
        provider = "nta_ie"
        stop = { station_id = "8220DB000002" }
        departures = 5
    "#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parses_sample() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.server.bind.port(), 8080);
        assert_eq!(config.cache.events().ttl, Duration::from_secs(15));
        assert_eq!(config.cache.max_capacity, 1000);
        assert_eq!(
            config.cache.gtfs().dir,
            PathBuf::from("/var/cache/departures")
        );
        assert_eq!(config.rate_limit.per_minute, 30);
        assert_eq!(config.rate_limit.per_day, 60000);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(
            config.providers.hvv.dm_url.as_deref(),
            Some("https://example.test/XML_DM_REQUEST")
        );
        assert_eq!(config.monitors.len(), 2);
        assert_eq!(config.monitors[1].departures, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn static_download_timeout() {
        let config = AppConfig::from_toml(
            r#"
            [providers.gtfs_de]
            static_timeout_secs = 1800
            "#,
        )
        .unwrap();
        let providers = &config.providers;
        assert_eq!(providers.gtfs_static_timeout_secs(ProviderId::GtfsDe), Some(1800));
        assert_eq!(providers.gtfs_static_timeout_secs(ProviderId::NtaIe), Some(300));
        assert_eq!(providers.gtfs_static_timeout_secs(ProviderId::Vrr), None);
    }

    #[test]
    fn empty_config_is_default() {
        let config = AppConfig::from_toml("").unwrap();
        assert!(config.monitors.is_empty());
        assert_eq!(config.server.bind, ServerConfig::default().bind);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_file() {
        let mut config = AppConfig::from_toml(SAMPLE).unwrap();
        config.apply_env(env(&[
            (NTA_API_KEY_ENV, "from-env"),
            (NTA_API_KEY_SECONDARY_ENV, "   "),
            (TRAFIKLAB_API_KEY_ENV, "se-key"),
        ]));
        assert_eq!(config.providers.nta_ie.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.providers.nta_ie.api_key_secondary, None);
        assert_eq!(
            config.providers.trafiklab_se.api_key.as_deref(),
            Some("se-key")
        );
    }

    #[test]
    fn missing_api_key_names_the_monitor() {
        let config = AppConfig::from_toml(
            r#"
            [[monitors]]
            id = "t-centralen"
            provider = "trafiklab_se"
            stop = { station_id = "740020749" }
            "#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey { .. }));
        assert!(err.to_string().contains("t-centralen"), "{err}");
    }

    #[test]
    fn mock_mode_needs_no_keys() {
        let mut config = AppConfig::from_toml(
            r#"
            [[monitors]]
            id = "t-centralen"
            provider = "trafiklab_se"
            stop = { station_id = "740020749" }
            "#,
        )
        .unwrap();
        config.apply_env(env(&[(MOCK_DIR_ENV, "data/mock_boards")]));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn duplicate_monitor_ids() {
        let config = AppConfig::from_toml(
            r#"
            [[monitors]]
            id = "a"
            provider = "vrr"
            stop = { station_id = "1" }

            [[monitors]]
            id = "a"
            provider = "kvv"
            stop = { station_id = "2" }
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Monitor(MonitorError::InvalidConfig { .. }))
        ));
    }

    #[test]
    fn invalid_monitor_is_reported() {
        let config = AppConfig::from_toml(
            r#"
            [[monitors]]
            id = "fast"
            provider = "vrr"
            stop = { station_id = "1" }
            scan_interval_secs = 1
            "#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("fast"), "{err}");
    }

    #[test]
    fn syntax_errors_are_parse_errors() {
        assert!(matches!(
            AppConfig::from_toml("[server"),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            AppConfig::from_toml("[[monitors]]\nid = \"x\"\nprovider = \"mvv\""),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        assert_eq!(AppConfig::from_path(&path).unwrap().monitors.len(), 2);

        let missing = AppConfig::from_path(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}
