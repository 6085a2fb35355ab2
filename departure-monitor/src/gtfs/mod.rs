//! GTFS static data: download, disk cache and lookups.
//!
//! GTFS-Realtime feeds only carry ids. Line names, destinations, platforms
//! and agencies come from the provider's static GTFS archive, refreshed at
//! most once a day.

mod cache;
mod error;
mod manager;
mod static_data;

pub use cache::{DEFAULT_TTL, GtfsCacheConfig, GtfsDiskCache};
pub use error::GtfsError;
pub use manager::{GtfsManager, default_static_timeout_secs, default_static_url};
pub use static_data::{GtfsRoute, GtfsStats, GtfsStatic, GtfsStop};

#[cfg(test)]
pub(crate) use static_data::test_support;
