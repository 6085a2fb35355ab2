//! Conversion from stop events to [`Departure`]s.
//!
//! One bad event never spoils a board: events that fail to convert are
//! logged and skipped.

use chrono::DateTime;
use chrono_tz::Tz;

use crate::domain::{Departure, TimeError, parse_provider_time, whole_minutes};

use super::rules::EventRules;
use super::types::StopEvent;

/// Error converting a single stop event.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConversionError {
    /// Missing required field
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Failed to parse a timestamp
    #[error("invalid time {value:?}: {source}")]
    InvalidTime { value: String, source: TimeError },
}

/// Convert one stop event using a provider's rules.
///
/// The planned time is required. A missing or unparseable estimated time
/// defaults to the planned one; both end up in `tz`. Delay is `estimated - planned` in whole minutes.
pub fn parse_departure<R: EventRules + ?Sized>(
    event: &StopEvent,
    rules: &R,
    tz: Tz,
) -> Result<Departure, ConversionError> {
    let planned_raw = event
        .departure_time_planned
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or(ConversionError::MissingField("departureTimePlanned"))?;

    let planned_time = parse_time(planned_raw, tz)?;

    let departure_time = match event
        .departure_time_estimated
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        Some(raw) => parse_time(raw, tz).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "ignoring estimated time");
            planned_time
        }),
        None => planned_time,
    };

    let transportation = event.transportation.clone().unwrap_or_default();

    let destination = transportation
        .destination
        .and_then(|d| d.name)
        .unwrap_or_else(|| "Unknown".to_string());

    Ok(Departure {
        line: transportation.number.unwrap_or_default(),
        destination,
        departure_time,
        planned_time,
        delay_minutes: whole_minutes(departure_time - planned_time),
        platform: rules.platform(event),
        transport_type: rules.transport_type(event),
        is_realtime: rules.is_realtime(event),
        description: transportation.description.filter(|s| !s.is_empty()),
        agency: event.agency.clone().filter(|s| !s.is_empty()),
    })
}

/// Convert a batch of stop events, skipping the ones that fail.
pub fn convert_stop_events<R: EventRules + ?Sized>(
    events: &[StopEvent],
    rules: &R,
    tz: Tz,
) -> Vec<Departure> {
    events
        .iter()
        .filter_map(|event| match parse_departure(event, rules, tz) {
            Ok(departure) => Some(departure),
            Err(e) => {
                tracing::debug!(error = %e, "skipping stop event");
                None
            }
        })
        .collect()
}

fn parse_time(raw: &str, tz: Tz) -> Result<DateTime<Tz>, ConversionError> {
    parse_provider_time(raw, tz).map_err(|source| ConversionError::InvalidTime {
        value: raw.to_string(),
        source,
    })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::ProviderId;
    use proptest::prelude::*;

    proptest! {
        /// delay_minutes == whole minutes between estimated and planned
        #[test]
        fn delay_matches_time_difference(
            base in 1_600_000_000i64..1_900_000_000,
            offset in -3600i64..7200,
        ) {
            let planned = DateTime::from_timestamp(base, 0).unwrap();
            let estimated = DateTime::from_timestamp(base + offset, 0).unwrap();
            let event = StopEvent {
                departure_time_planned: Some(planned.to_rfc3339()),
                departure_time_estimated: Some(estimated.to_rfc3339()),
                ..StopEvent::default()
            };
            let dep = parse_departure(&event, &ProviderId::Vrr, chrono_tz::Europe::Berlin).unwrap();
            prop_assert_eq!(dep.delay_minutes, offset / 60);
        }
    }
}
