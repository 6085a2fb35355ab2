//! Delay alarm over a monitor's raw stop events.

use chrono_tz::Tz;
use serde::Serialize;

use crate::domain::{parse_provider_time, whole_minutes};
use crate::provider::StopEvent;

use super::board::average_one_decimal;

/// Number of individual delays listed in a report.
const MAX_LISTED_DELAYS: usize = 10;

/// Delay statistics and alarm state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelayReport {
    /// Whether the largest delay exceeds the threshold.
    pub is_on: bool,
    pub delayed_departures: usize,
    pub on_time_departures: usize,
    pub average_delay: f64,
    pub max_delay: i64,
    pub total_departures: usize,
    /// First delays in event order, minutes.
    pub delays_list: Vec<i64>,
    pub delay_threshold: i64,
}

impl DelayReport {
    /// Build the report from every event with a planned time.
    ///
    /// The report looks at all events, not just the filtered board. An event
    /// is delayed when its estimate is at least one whole minute after the
    /// plan; early or identical estimates count as on time. Events whose
    /// differing times fail to parse are left out entirely.
    pub fn build(events: &[StopEvent], threshold_mins: i64, tz: Tz) -> Self {
        let mut delays = Vec::new();
        let mut on_time = 0usize;

        for event in events {
            let Some(planned) = event
                .departure_time_planned
                .as_deref()
                .filter(|s| !s.is_empty())
            else {
                continue;
            };

            let estimated = event
                .departure_time_estimated
                .as_deref()
                .filter(|s| !s.is_empty() && *s != planned);
            let Some(estimated) = estimated else {
                on_time += 1;
                continue;
            };

            match (
                parse_provider_time(planned, tz),
                parse_provider_time(estimated, tz),
            ) {
                (Ok(p), Ok(e)) => match whole_minutes(e - p) {
                    delay if delay > 0 => delays.push(delay),
                    _ => on_time += 1,
                },
                _ => {
                    tracing::debug!(planned, estimated, "unparseable times in delay report");
                }
            }
        }

        let max_delay = delays.iter().copied().max().unwrap_or(0);
        Self {
            is_on: max_delay > threshold_mins,
            delayed_departures: delays.len(),
            on_time_departures: on_time,
            average_delay: average_one_decimal(&delays),
            max_delay,
            total_departures: delays.len() + on_time,
            delay_threshold: threshold_mins,
            delays_list: delays.into_iter().take(MAX_LISTED_DELAYS).collect(),
        }
    }
}
