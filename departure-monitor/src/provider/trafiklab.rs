//! Trafiklab realtime API client (Sweden).

use async_trait::async_trait;
use reqwest::Url;

use crate::domain::{ProviderId, StopRef};

use super::Provider;
use super::error::ProviderError;
use super::http::HttpFetcher;
use super::types::{
    Destination, Platform, Product, StopEvent, StopSuggestion, TrafiklabDeparture,
    TrafiklabDepartures, TrafiklabStopGroup, TrafiklabStopSearch, Transportation,
    place_after_last_comma,
};

pub const DEFAULT_BASE_URL: &str = "https://realtime-api.trafiklab.se/v1";

/// Client for the Trafiklab realtime API.
///
/// Times in Trafiklab responses carry no offset; they are Swedish local time
/// and get interpreted in `Europe/Stockholm` during conversion.
#[derive(Debug, Clone)]
pub struct TrafiklabClient {
    base_url: String,
    api_key: Option<String>,
    fetcher: HttpFetcher,
}

impl TrafiklabClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, fetcher: HttpFetcher) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            fetcher,
        }
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .ok_or(ProviderError::MissingApiKey {
                provider: ProviderId::TrafiklabSe,
            })
    }

    /// `{base}/{segments...}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProviderError::NotConfigured(format!("Trafiklab base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::NotConfigured("Trafiklab base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Convert one Trafiklab departure into the shared stop event shape.
fn departure_to_event(dep: TrafiklabDeparture) -> StopEvent {
    let route = dep.route.unwrap_or_default();
    let platform = dep
        .scheduled_platform
        .or(dep.realtime_platform)
        .and_then(|p| p.designation)
        .unwrap_or_default();

    let destination = route
        .destination
        .and_then(|d| d.name)
        .unwrap_or_else(|| "Unknown".to_string());

    let description = route
        .name
        .filter(|s| !s.is_empty())
        .or(route.direction)
        .unwrap_or_default();

    StopEvent {
        departure_time_estimated: dep.realtime.or_else(|| dep.scheduled.clone()),
        departure_time_planned: dep.scheduled,
        transportation: Some(Transportation {
            number: Some(route.designation.unwrap_or_default()),
            description: Some(description),
            destination: Some(Destination {
                name: Some(destination),
            }),
            product: Some(Product {
                class: Some(0),
                name: None,
            }),
        }),
        platform: Some(Platform::named(platform)),
        realtime_status: if dep.is_realtime {
            vec!["MONITORED".to_string()]
        } else {
            Vec::new()
        },
        transport_mode: Some(route.transport_mode.unwrap_or_else(|| "BUS".to_string())),
        ..StopEvent::default()
    }
}

pub(crate) fn parse_departures_body(body: &[u8]) -> Result<Vec<StopEvent>, ProviderError> {
    let response: TrafiklabDepartures =
        serde_json::from_slice(body).map_err(|e| ProviderError::json(&e, body))?;

    let Some(departures) = response.departures else {
        tracing::debug!("Trafiklab response has no departures field");
        return Ok(Vec::new());
    };

    Ok(departures
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<TrafiklabDeparture>(raw) {
            Ok(dep) => Some(departure_to_event(dep)),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed Trafiklab departure");
                None
            }
        })
        .collect())
}

pub(crate) fn parse_stop_search_body(body: &[u8]) -> Result<Vec<StopSuggestion>, ProviderError> {
    let response: TrafiklabStopSearch =
        serde_json::from_slice(body).map_err(|e| ProviderError::json(&e, body))?;

    Ok(response
        .stop_groups
        .into_iter()
        .filter_map(|raw| serde_json::from_value::<TrafiklabStopGroup>(raw).ok())
        .map(|group| {
            let place = place_after_last_comma(&group.name)
                .unwrap_or_default()
                .to_string();
            StopSuggestion::new(group.id.unwrap_or_default(), group.name, place)
                .with_area_type(group.area_type)
                .with_transport_modes(group.transport_modes)
        })
        .collect())
}

#[async_trait]
impl Provider for TrafiklabClient {
    fn id(&self) -> ProviderId {
        ProviderId::TrafiklabSe
    }

    async fn fetch_stop_events(
        &self,
        stop: &StopRef,
        _limit: u32,
    ) -> Result<Vec<StopEvent>, ProviderError> {
        let key = self.api_key()?;
        let station_id = stop.station_id().ok_or(ProviderError::MissingStopId {
            provider: ProviderId::TrafiklabSe,
        })?;

        let url = self.endpoint(&["departures", station_id])?;
        let body = self
            .fetcher
            .fetch(|http| http.get(url.clone()).query(&[("key", key)]))
            .await?;

        let events = parse_departures_body(&body)?;
        tracing::debug!(stop = %stop, events = events.len(), "fetched Trafiklab departures");
        Ok(events)
    }

    async fn search_stops(&self, term: &str) -> Result<Vec<StopSuggestion>, ProviderError> {
        let key = self.api_key()?;
        let url = self.endpoint(&["stops", "name", term])?;
        let body = self
            .fetcher
            .fetch(|http| http.get(url.clone()).query(&[("key", key)]))
            .await?;
        parse_stop_search_body(&body)
    }
}
