//! Data transfer objects for web requests and responses.

use serde::{Deserialize, Serialize};

use crate::domain::ProviderId;
use crate::monitor::{DelayReport, DepartureBoard, MonitorConfig, MonitorStatus};
use crate::provider::StopSuggestion;

/// Query for stop search.
#[derive(Debug, Deserialize)]
pub struct StopSearchRequest {
    /// Provider id, e.g. `vrr`
    pub provider: String,

    /// Search term
    pub q: String,

    /// Maximum results (default 10)
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct StopSearchResponse {
    pub provider: ProviderId,
    pub stops: Vec<StopSuggestion>,
}

/// One monitor in the monitor list.
#[derive(Debug, Serialize)]
pub struct MonitorSummary {
    pub id: String,
    pub name: String,
    pub provider: ProviderId,
    /// The configured stop, `id` or `place - name`
    pub stop: String,
    /// Next departure `HH:MM`, `No departures`, or `None` before the first
    /// successful fetch
    pub state: Option<String>,
    pub next_departure_minutes: Option<i64>,
    pub status: MonitorStatus,
}

impl MonitorSummary {
    pub fn new(
        config: &MonitorConfig,
        board: Option<&DepartureBoard>,
        status: MonitorStatus,
    ) -> Self {
        Self {
            id: config.id.clone(),
            name: config.station_name(),
            provider: config.provider,
            stop: config.stop.to_string(),
            state: board.map(|b| b.state.clone()),
            next_departure_minutes: board.and_then(|b| b.next_departure_minutes),
            status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MonitorListResponse {
    pub monitors: Vec<MonitorSummary>,
}

/// A monitor's departure board with its status.
#[derive(Debug, Serialize)]
pub struct BoardResponse {
    pub id: String,
    pub board: DepartureBoard,
    pub status: MonitorStatus,
}

/// A monitor's delay report.
#[derive(Debug, Serialize)]
pub struct DelaysResponse {
    pub id: String,
    #[serde(flatten)]
    pub report: DelayReport,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
