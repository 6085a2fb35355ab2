//! Departure board: the filtered, sorted view of a monitor's stop events.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Departure, TransportType};
use crate::provider::{EventRules, StopEvent, convert_stop_events};

use super::config::MonitorConfig;

/// Board state when nothing departs.
pub const NO_DEPARTURES: &str = "No departures";

/// One row on the board.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartureView {
    pub line: String,
    pub destination: String,
    /// Estimated departure, `HH:MM`
    pub departure_time: String,
    /// Timetabled departure, `HH:MM`
    pub planned_time: String,
    /// Live departure `HH:MM`, only when backed by realtime data
    pub real_time: Option<String>,
    /// Minutes, negative when early
    pub delay: i64,
    pub platform: String,
    pub transportation_type: TransportType,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agency: Option<String>,
    pub is_realtime: bool,
    pub minutes_until_departure: i64,
}

impl DepartureView {
    pub fn from_departure(departure: &Departure, now: DateTime<Utc>) -> Self {
        let now = now.with_timezone(&departure.departure_time.timezone());
        Self {
            line: departure.line.clone(),
            destination: departure.destination.clone(),
            departure_time: departure.departure_hhmm(),
            planned_time: departure.planned_hhmm(),
            real_time: departure.real_time(),
            delay: departure.delay_minutes,
            platform: departure.platform.clone(),
            transportation_type: departure.transport_type,
            description: departure.description.clone().unwrap_or_default(),
            agency: departure.agency.clone(),
            is_realtime: departure.is_realtime,
            minutes_until_departure: departure.minutes_until(now),
        }
    }
}

/// The board of one monitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartureBoard {
    /// Next departure `HH:MM`, or [`NO_DEPARTURES`].
    pub state: String,
    pub departures: Vec<DepartureView>,
    pub next_3_departures: Vec<DepartureView>,
    pub station_name: String,
    pub station_id: Option<String>,
    /// RFC 3339, UTC
    pub last_updated: String,
    pub next_departure_minutes: Option<i64>,
    pub total_departures: usize,
    pub delayed_count: usize,
    pub on_time_count: usize,
    /// Mean delay of delayed departures, one decimal.
    pub average_delay: f64,
    pub earliest_departure: Option<String>,
    pub latest_departure: Option<String>,
}

impl DepartureBoard {
    /// Build the board from raw stop events.
    ///
    /// Events are converted with the provider's rules, filtered to the
    /// configured transport types, sorted by (estimated) departure time and
    /// truncated to the configured limit. `updated_at` is reported as the
    /// board's last update; minutes until departure count from `now`.
    pub fn build<R: EventRules + ?Sized>(
        events: &[StopEvent],
        rules: &R,
        config: &MonitorConfig,
        updated_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut departures: Vec<Departure> =
            convert_stop_events(events, rules, config.provider.timezone())
                .into_iter()
                .filter(|d| config.transport_types.contains(&d.transport_type))
                .collect();
        departures.sort_by_key(|d| d.departure_time);
        departures.truncate(config.departures as usize);

        let delayed: Vec<i64> = departures
            .iter()
            .filter(|d| d.is_delayed())
            .map(|d| d.delay_minutes)
            .collect();

        let views: Vec<DepartureView> = departures
            .iter()
            .map(|d| DepartureView::from_departure(d, now))
            .collect();

        Self {
            state: departures
                .first()
                .map_or_else(|| NO_DEPARTURES.to_string(), Departure::departure_hhmm),
            next_3_departures: views.iter().take(3).cloned().collect(),
            next_departure_minutes: views.first().map(|v| v.minutes_until_departure),
            station_name: config.station_name(),
            station_id: config.stop.station_id().map(str::to_string),
            last_updated: updated_at.to_rfc3339(),
            total_departures: views.len(),
            delayed_count: delayed.len(),
            on_time_count: views.len() - delayed.len(),
            average_delay: average_one_decimal(&delayed),
            // Sorted, so the ends are the extremes
            earliest_departure: departures.first().map(Departure::departure_hhmm),
            latest_departure: departures.last().map(Departure::departure_hhmm),
            departures: views,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.departures.is_empty()
    }
}

/// Mean rounded to one decimal, 0 for an empty slice.
pub(crate) fn average_one_decimal(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<i64>() as f64 / values.len() as f64;
    (mean * 10.0).round() / 10.0
}
