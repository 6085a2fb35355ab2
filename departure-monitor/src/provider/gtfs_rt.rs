//! GTFS-Realtime client (NTA Ireland, GTFS-DE).
//!
//! The TripUpdates feed covers the whole network, so every fetch downloads
//! the full feed and picks out the stop-time updates for the requested stop.
//! Line names, destinations and platforms come from GTFS static data.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use gtfs_rt::trip_update::stop_time_update::ScheduleRelationship;
use gtfs_rt::{FeedMessage, TripUpdate};
use prost::Message;

use crate::domain::{ProviderId, StopRef};
use crate::gtfs::{GtfsManager, GtfsStatic};

use super::Provider;
use super::error::ProviderError;
use super::http::HttpFetcher;
use super::types::{
    Destination, Platform, Product, StopEvent, StopSuggestion, Transportation,
};

/// Maximum suggestions returned by the static stop index.
const SEARCH_LIMIT: usize = 20;

/// GTFS route type assumed when static data has none (bus).
const DEFAULT_ROUTE_TYPE: i64 = 3;

/// Default realtime feed of a provider, or `None` for non-GTFS providers.
pub fn default_realtime_url(provider: ProviderId) -> Option<&'static str> {
    match provider {
        ProviderId::NtaIe => Some("https://api.nationaltransport.ie/gtfsr/v2/TripUpdates"),
        ProviderId::GtfsDe => Some("https://realtime.gtfs.de/realtime-free.pb"),
        _ => None,
    }
}

/// Configuration for a [`GtfsRtClient`].
#[derive(Debug, Clone)]
pub struct GtfsRtConfig {
    pub provider: ProviderId,
    pub realtime_url: String,
    /// Sent as `x-api-key`
    pub api_key: Option<String>,
    /// Tried once when the primary key is rejected
    pub api_key_secondary: Option<String>,
}

impl GtfsRtConfig {
    pub fn new(provider: ProviderId, realtime_url: impl Into<String>) -> Self {
        Self {
            provider,
            realtime_url: realtime_url.into(),
            api_key: None,
            api_key_secondary: None,
        }
    }

    pub fn with_api_keys(mut self, primary: Option<String>, secondary: Option<String>) -> Self {
        self.api_key = primary.filter(|k| !k.trim().is_empty());
        self.api_key_secondary = secondary.filter(|k| !k.trim().is_empty());
        self
    }
}

/// Client for a GTFS-Realtime TripUpdates feed.
pub struct GtfsRtClient {
    config: GtfsRtConfig,
    fetcher: HttpFetcher,
    gtfs: Arc<GtfsManager>,
}

impl GtfsRtClient {
    pub fn new(config: GtfsRtConfig, fetcher: HttpFetcher, gtfs: Arc<GtfsManager>) -> Self {
        Self {
            config,
            fetcher,
            gtfs,
        }
    }

    async fn fetch_feed_with_key(&self, key: Option<&str>) -> Result<Vec<u8>, ProviderError> {
        let url = &self.config.realtime_url;
        self.fetcher
            .fetch(|http| {
                let request = http.get(url);
                match key {
                    Some(key) => request.header("x-api-key", key),
                    None => request,
                }
            })
            .await
    }

    /// Download the feed, falling back to the secondary key if the primary is rejected.
    async fn fetch_feed(&self) -> Result<FeedMessage, ProviderError> {
        let primary = self.config.api_key.as_deref();
        if self.config.provider.requires_api_key() && primary.is_none() {
            return Err(ProviderError::MissingApiKey {
                provider: self.config.provider,
            });
        }

        let body = match self.fetch_feed_with_key(primary).await {
            Err(ProviderError::Unauthorized) if self.config.api_key_secondary.is_some() => {
                tracing::warn!(
                    provider = %self.config.provider,
                    "primary API key rejected, trying secondary key"
                );
                self.fetch_feed_with_key(self.config.api_key_secondary.as_deref())
                    .await?
            }
            other => other?,
        };

        FeedMessage::decode(body.as_slice()).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

/// Build stop events for `stop_id` from a decoded feed.
///
/// At most `max_events` events are collected. Skipped stops and stop-time
/// updates without a time are ignored.
pub(crate) fn build_stop_events(
    feed: &FeedMessage,
    gtfs: &GtfsStatic,
    stop_id: &str,
    tz: Tz,
    max_events: usize,
) -> Vec<StopEvent> {
    let mut events = Vec::new();

    for trip_update in feed.entity.iter().filter_map(|e| e.trip_update.as_ref()) {
        if events.len() >= max_events {
            break;
        }
        if let Some(event) = stop_event_for(trip_update, gtfs, stop_id, tz) {
            events.push(event);
        }
    }

    tracing::debug!(
        stop_id,
        entities = feed.entity.len(),
        events = events.len(),
        "scanned GTFS-RT feed"
    );
    events
}

fn stop_event_for(
    trip_update: &TripUpdate,
    gtfs: &GtfsStatic,
    stop_id: &str,
    tz: Tz,
) -> Option<StopEvent> {
    let update = trip_update
        .stop_time_update
        .iter()
        .find(|u| u.stop_id.as_deref() == Some(stop_id))?;

    if update.schedule_relationship == Some(ScheduleRelationship::Skipped as i32) {
        return None;
    }

    let time_event = update.departure.as_ref().or(update.arrival.as_ref())?;
    let delay_secs = i64::from(time_event.delay.unwrap_or(0));
    let planned = DateTime::from_timestamp(time_event.time?, 0)?.with_timezone(&tz);
    let estimated = planned + Duration::seconds(delay_secs);

    let route_id = trip_update.trip.route_id.as_deref().unwrap_or_default();
    let trip_id = trip_update.trip.trip_id.as_deref().unwrap_or_default();

    let short_name = gtfs.route_short_name(route_id).unwrap_or_default();
    let route_type = gtfs.route_type(route_id).unwrap_or(DEFAULT_ROUTE_TYPE);
    let agency = gtfs.agency_name(route_id).map(str::to_string);

    let destination = gtfs
        .trip_headsign(trip_id)
        .or_else(|| {
            gtfs.route(route_id)
                .map(|r| r.long_name.as_str())
                .filter(|s| !s.is_empty())
        })
        .or(Some(short_name).filter(|s| !s.is_empty()))
        .unwrap_or("Unknown");

    Some(StopEvent {
        departure_time_planned: Some(planned.to_rfc3339()),
        departure_time_estimated: Some(estimated.to_rfc3339()),
        transportation: Some(Transportation {
            number: Some(short_name.to_string()),
            description: agency.clone(),
            destination: Some(Destination {
                name: Some(destination.to_string()),
            }),
            product: Some(Product {
                class: Some(route_type),
                name: None,
            }),
        }),
        platform: Some(Platform::named(
            gtfs.stop_platform_code(stop_id).unwrap_or_default(),
        )),
        realtime_status: if delay_secs != 0 {
            vec!["MONITORED".to_string()]
        } else {
            Vec::new()
        },
        agency,
        ..StopEvent::default()
    })
}

/// Split `"Name, Place"` on the last comma.
fn split_stop_name(full: &str) -> (&str, &str) {
    match full.rsplit_once(',') {
        Some((name, place)) => (name.trim(), place.trim()),
        None => (full, ""),
    }
}

#[async_trait]
impl Provider for GtfsRtClient {
    fn id(&self) -> ProviderId {
        self.config.provider
    }

    async fn fetch_stop_events(
        &self,
        stop: &StopRef,
        limit: u32,
    ) -> Result<Vec<StopEvent>, ProviderError> {
        let provider = self.config.provider;
        let stop_id = stop
            .station_id()
            .ok_or(ProviderError::MissingStopId { provider })?;

        let gtfs = self.gtfs.ensure_loaded(provider).await?;
        let feed = self.fetch_feed().await?;

        let max_events = (limit as usize).saturating_mul(3);
        Ok(build_stop_events(
            &feed,
            &gtfs,
            stop_id,
            provider.timezone(),
            max_events,
        ))
    }

    async fn search_stops(&self, term: &str) -> Result<Vec<StopSuggestion>, ProviderError> {
        let gtfs = self.gtfs.ensure_loaded(self.config.provider).await?;

        Ok(gtfs
            .search_stops(term, SEARCH_LIMIT)
            .into_iter()
            .map(|stop| {
                let (name, place) = split_stop_name(&stop.stop_name);
                let coordinates = stop.lat.zip(stop.lon).map(|(lat, lon)| [lat, lon]);
                StopSuggestion::new(stop.stop_id.clone(), name, place)
                    .with_coordinates(coordinates)
            })
            .collect())
    }
}
