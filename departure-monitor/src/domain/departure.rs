//! The unified departure record.

use chrono::DateTime;
use chrono_tz::Tz;

use super::time::{format_hhmm, whole_minutes};
use super::TransportType;

/// A single upcoming departure, normalized across providers.
///
/// Times are zoned in the provider's network time zone. `delay_minutes` is
/// always `estimated - planned` in whole minutes (negative when early).
#[derive(Debug, Clone, PartialEq)]
pub struct Departure {
    /// Line designation, e.g. "U79" or "721".
    pub line: String,
    /// Destination shown on the vehicle.
    pub destination: String,
    /// Estimated (or planned, when no estimate exists) departure time.
    pub departure_time: DateTime<Tz>,
    /// Timetabled departure time.
    pub planned_time: DateTime<Tz>,
    pub delay_minutes: i64,
    /// Platform, track or bay. Empty when unknown.
    pub platform: String,
    pub transport_type: TransportType,
    /// Whether the estimate comes from live vehicle data.
    pub is_realtime: bool,
    pub description: Option<String>,
    /// Operating agency (GTFS providers only).
    pub agency: Option<String>,
}

impl Departure {
    /// Whole minutes from `now` until departure, never negative.
    pub fn minutes_until(&self, now: DateTime<Tz>) -> i64 {
        whole_minutes(self.departure_time - now).max(0)
    }

    /// Departure time as `HH:MM`.
    pub fn departure_hhmm(&self) -> String {
        format_hhmm(&self.departure_time)
    }

    /// Planned time as `HH:MM`.
    pub fn planned_hhmm(&self) -> String {
        format_hhmm(&self.planned_time)
    }

    /// The live departure time, only when backed by realtime data.
    pub fn real_time(&self) -> Option<String> {
        self.is_realtime.then(|| self.departure_hhmm())
    }

    pub fn is_delayed(&self) -> bool {
        self.delay_minutes > 0
    }
}
