//! Disk cache for downloaded GTFS static archives.
//!
//! Each feed is stored as `gtfs_static_{feed}.zip` next to a
//! `gtfs_static_{feed}_timestamp.txt` holding the download time in unix
//! seconds.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::error::GtfsError;

/// Default cache TTL: 24 hours.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for the GTFS disk cache.
#[derive(Debug, Clone)]
pub struct GtfsCacheConfig {
    /// Directory holding the cached archives.
    pub dir: PathBuf,
    /// How long a downloaded archive remains valid.
    pub ttl: Duration,
}

impl GtfsCacheConfig {
    /// Create a new cache config with the given directory and default TTL (24 hours).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ttl: DEFAULT_TTL,
        }
    }

    /// Set a custom TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

impl Default for GtfsCacheConfig {
    fn default() -> Self {
        Self::new("gtfs_cache")
    }
}

/// Disk cache for one feed's archive.
#[derive(Debug, Clone)]
pub struct GtfsDiskCache {
    zip_path: PathBuf,
    timestamp_path: PathBuf,
    ttl: Duration,
}

impl GtfsDiskCache {
    /// Cache for `feed` (e.g. `nta_ie`) under the configured directory.
    pub fn new(config: &GtfsCacheConfig, feed: &str) -> Self {
        Self {
            zip_path: config.dir.join(format!("gtfs_static_{feed}.zip")),
            timestamp_path: config.dir.join(format!("gtfs_static_{feed}_timestamp.txt")),
            ttl: config.ttl,
        }
    }

    /// Age of the cached archive, if both files exist and the timestamp is readable.
    pub fn age(&self) -> Option<Duration> {
        if !self.zip_path.is_file() {
            return None;
        }
        let contents = std::fs::read_to_string(&self.timestamp_path).ok()?;
        let cached_at: u64 = contents.trim().parse().ok()?;
        let now = unix_now().ok()?;
        Some(Duration::from_secs(now.saturating_sub(cached_at)))
    }

    /// Whether a cached archive exists and is younger than the TTL.
    pub fn is_fresh(&self) -> bool {
        self.age().is_some_and(|age| age < self.ttl)
    }

    /// Load the cached archive.
    ///
    /// Returns `None` if the cache doesn't exist, is unreadable, or has expired.
    pub fn load(&self) -> Option<Vec<u8>> {
        if !self.is_fresh() {
            return None;
        }
        std::fs::read(&self.zip_path).ok()
    }

    /// Save an archive and stamp it with the current time.
    ///
    /// Creates the cache directory if it doesn't exist.
    pub fn save(&self, bytes: &[u8]) -> Result<(), GtfsError> {
        let now = unix_now()?;

        if let Some(parent) = self.zip_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| GtfsError::cache(format!("failed to create cache directory: {e}")))?;
        }

        std::fs::write(&self.zip_path, bytes)
            .map_err(|e| GtfsError::cache(format!("failed to write archive: {e}")))?;
        std::fs::write(&self.timestamp_path, now.to_string())
            .map_err(|e| GtfsError::cache(format!("failed to write timestamp: {e}")))?;

        Ok(())
    }

    /// Delete both cache files. Missing files are not an error.
    pub fn clear(&self) {
        for path in [&self.zip_path, &self.timestamp_path] {
            if let Err(e) = std::fs::remove_file(path)
                && e.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove cache file");
            }
        }
    }

    /// Path of the cached archive.
    pub fn zip_path(&self) -> &Path {
        &self.zip_path
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

fn unix_now() -> Result<u64, GtfsError> {
    Ok(SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_err(|_| GtfsError::cache("system time before unix epoch"))?
        .as_secs())
}
