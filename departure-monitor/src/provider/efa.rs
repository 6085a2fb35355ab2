//! EFA departure monitor client (VRR, KVV, HVV).

use async_trait::async_trait;

use crate::domain::{ProviderId, StopRef};

use super::Provider;
use super::error::ProviderError;
use super::http::HttpFetcher;
use super::types::{
    DmResponse, StopEvent, StopFinderLocation, StopFinderResponse, StopSuggestion,
    place_after_last_comma,
};

/// Endpoint URLs of one EFA installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EfaEndpoints {
    /// `XML_DM_REQUEST` (departure monitor)
    pub dm_url: String,
    /// `XML_STOPFINDER_REQUEST`
    pub stopfinder_url: String,
}

impl EfaEndpoints {
    pub fn new(dm_url: impl Into<String>, stopfinder_url: impl Into<String>) -> Self {
        Self {
            dm_url: dm_url.into(),
            stopfinder_url: stopfinder_url.into(),
        }
    }

    /// Public endpoints of a network, or `None` for non-EFA providers.
    pub fn default_for(provider: ProviderId) -> Option<Self> {
        match provider {
            ProviderId::Vrr => Some(Self::new(
                "https://openservice-test.vrr.de/static03/XML_DM_REQUEST",
                "https://openservice-test.vrr.de/static03/XML_STOPFINDER_REQUEST",
            )),
            ProviderId::Kvv => Some(Self::new(
                "https://projekte.kvv-efa.de/sl3-alone/XSLT_DM_REQUEST",
                "https://projekte.kvv-efa.de/sl3-alone/XML_STOPFINDER_REQUEST",
            )),
            ProviderId::Hvv => Some(Self::new(
                "https://hvv.efa.de/efa/XML_DM_REQUEST",
                "https://hvv.efa.de/efa/XML_STOPFINDER_REQUEST",
            )),
            _ => None,
        }
    }
}

/// Client for an EFA installation returning RapidJSON.
#[derive(Debug, Clone)]
pub struct EfaClient {
    provider: ProviderId,
    endpoints: EfaEndpoints,
    fetcher: HttpFetcher,
}

impl EfaClient {
    pub fn new(provider: ProviderId, endpoints: EfaEndpoints, fetcher: HttpFetcher) -> Self {
        Self {
            provider,
            endpoints,
            fetcher,
        }
    }
}

/// Query parameters of a departure monitor request.
fn dm_query(stop: &StopRef, limit: u32) -> Vec<(&'static str, String)> {
    let mut query = vec![("outputFormat", "RapidJSON".to_string())];
    match stop {
        StopRef::Id { station_id } => {
            query.push(("stateless", "1".to_string()));
            query.push(("type_dm", "any".to_string()));
            query.push(("name_dm", station_id.clone()));
        }
        StopRef::Named { place, name } => {
            query.push(("place_dm", place.clone()));
            query.push(("type_dm", "stop".to_string()));
            query.push(("name_dm", name.clone()));
        }
    }
    query.push(("mode", "direct".to_string()));
    query.push(("useRealtime", "1".to_string()));
    query.push(("limit", limit.to_string()));
    query
}

/// Parse a DM response body into stop events.
///
/// An object without `stopEvents` is an empty board; anything that is not
/// a JSON object is an error. Individual malformed events are skipped.
pub(crate) fn parse_dm_body(body: &[u8]) -> Result<Vec<StopEvent>, ProviderError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| ProviderError::json(&e, body))?;

    if !value.is_object() {
        return Err(ProviderError::Json {
            message: "expected a JSON object".to_string(),
            body: Some(String::from_utf8_lossy(body).chars().take(500).collect()),
        });
    }

    let response: DmResponse =
        serde_json::from_value(value).map_err(|e| ProviderError::json(&e, body))?;

    Ok(response
        .stop_events
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<StopEvent>(raw) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed stop event");
                None
            }
        })
        .collect())
}

/// Parse a stop finder response body into suggestions.
pub(crate) fn parse_stopfinder_body(body: &[u8]) -> Result<Vec<StopSuggestion>, ProviderError> {
    let response: StopFinderResponse =
        serde_json::from_slice(body).map_err(|e| ProviderError::json(&e, body))?;

    Ok(response
        .locations
        .into_iter()
        .filter_map(|raw| serde_json::from_value::<StopFinderLocation>(raw).ok())
        .map(location_to_suggestion)
        .collect())
}

fn location_to_suggestion(location: StopFinderLocation) -> StopSuggestion {
    let place = location
        .parent
        .as_ref()
        .and_then(|p| p.name.as_deref())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            location
                .disassembled_name
                .as_deref()
                .and_then(place_after_last_comma)
        })
        .unwrap_or_default()
        .to_string();

    let coordinates = location.coord.as_deref().and_then(|c| match c {
        [lat, lon] => Some([*lat, *lon]),
        _ => None,
    });

    StopSuggestion::new(location.id, location.name, place)
        .with_area_type(location.area_type)
        .with_coordinates(coordinates)
}

#[async_trait]
impl Provider for EfaClient {
    fn id(&self) -> ProviderId {
        self.provider
    }

    async fn fetch_stop_events(
        &self,
        stop: &StopRef,
        limit: u32,
    ) -> Result<Vec<StopEvent>, ProviderError> {
        let query = dm_query(stop, limit);
        let url = &self.endpoints.dm_url;

        let body = self.fetcher.fetch(|http| http.get(url).query(&query)).await?;
        let events = parse_dm_body(&body)?;

        tracing::debug!(
            provider = %self.provider,
            stop = %stop,
            events = events.len(),
            "fetched EFA departures"
        );
        Ok(events)
    }

    async fn search_stops(&self, term: &str) -> Result<Vec<StopSuggestion>, ProviderError> {
        let query = [
            ("outputFormat", "RapidJSON"),
            ("locationServerActive", "1"),
            ("type_sf", "stop"),
            ("name_sf", term),
            ("SpEncId", "0"),
        ];
        let url = &self.endpoints.stopfinder_url;

        let body = self.fetcher.fetch(|http| http.get(url).query(&query)).await?;
        parse_stopfinder_body(&body)
    }
}
