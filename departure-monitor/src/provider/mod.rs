//! Departure data providers.
//!
//! Each provider fetches the departures of one stop from a regional API and
//! normalizes them into EFA-style [`StopEvent`]s:
//!
//! - VRR, KVV, HVV speak EFA (`XML_DM_REQUEST`, RapidJSON) natively
//! - Trafiklab (Sweden) is a REST JSON API that needs an API key
//! - NTA (Ireland) and GTFS-DE serve GTFS-Realtime protobuf feeds, joined
//!   against GTFS static data for line names and destinations
//!
//! Turning events into [`Departure`](crate::domain::Departure)s is provider
//! specific only through [`EventRules`].

mod convert;
mod efa;
mod error;
mod gtfs_rt;
mod http;
mod mock;
mod rules;
mod trafiklab;
mod types;

use async_trait::async_trait;

use crate::domain::{ProviderId, StopRef, TransportType};

pub use convert::{ConversionError, convert_stop_events, parse_departure};
pub use efa::{EfaClient, EfaEndpoints};
pub use error::ProviderError;
pub use gtfs_rt::{GtfsRtClient, GtfsRtConfig, default_realtime_url};
pub use http::{HttpConfig, HttpFetcher, RetryPolicy};
pub use mock::MockProvider;
pub use rules::EventRules;
pub use trafiklab::{DEFAULT_BASE_URL as TRAFIKLAB_DEFAULT_URL, TrafiklabClient};
pub use types::{
    Destination, EventLocation, LocationProperties, Platform, Product, StopEvent,
    StopSuggestion, Transportation,
};

/// A source of departures for stops of one network.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Which network this provider serves.
    fn id(&self) -> ProviderId;

    /// Fetch up to roughly `limit` upcoming stop events at `stop`.
    ///
    /// Providers may return more events than `limit`; callers filter and
    /// truncate after conversion.
    async fn fetch_stop_events(
        &self,
        stop: &StopRef,
        limit: u32,
    ) -> Result<Vec<StopEvent>, ProviderError>;

    /// Search stops by name.
    async fn search_stops(&self, term: &str) -> Result<Vec<StopSuggestion>, ProviderError>;

    fn transport_type(&self, event: &StopEvent) -> TransportType {
        self.id().transport_type(event)
    }

    fn platform(&self, event: &StopEvent) -> String {
        self.id().platform(event)
    }

    fn is_realtime(&self, event: &StopEvent) -> bool {
        self.id().is_realtime(event)
    }
}

/// Adapts a [`Provider`] to [`EventRules`].
impl EventRules for dyn Provider {
    fn transport_type(&self, event: &StopEvent) -> TransportType {
        Provider::transport_type(self, event)
    }

    fn platform(&self, event: &StopEvent) -> String {
        Provider::platform(self, event)
    }

    fn is_realtime(&self, event: &StopEvent) -> bool {
        Provider::is_realtime(self, event)
    }
}
