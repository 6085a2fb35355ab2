//! Departure time handling.
//!
//! Providers report times as ISO 8601 strings, but not consistently: EFA
//! sends UTC (`...Z`) or offsets (`+01:00`), GTFS conversions may produce
//! `+0100`, and Trafiklab sends naive local times. Everything is parsed into
//! a zoned time in the provider's network time zone.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

/// Error returned when parsing an invalid timestamp.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// Naive layouts accepted when a timestamp carries no offset.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a provider timestamp into the given time zone.
///
/// Offsets are honoured when present. Naive timestamps are taken to be local
/// time in `tz`; during the autumn fold the earlier instant wins, and times
/// skipped by the spring transition are rejected.
///
/// # Examples
///
/// ```
/// use departure_monitor::domain::parse_provider_time;
///
/// let berlin = chrono_tz::Europe::Berlin;
///
/// let t = parse_provider_time("2025-01-15T09:00:00Z", berlin).unwrap();
/// assert_eq!(t.format("%H:%M").to_string(), "10:00");
///
/// let t = parse_provider_time("2025-01-15T10:00:00+0100", berlin).unwrap();
/// assert_eq!(t.format("%H:%M").to_string(), "10:00");
///
/// let stockholm = chrono_tz::Europe::Stockholm;
/// let t = parse_provider_time("2025-07-01T08:15:00", stockholm).unwrap();
/// assert_eq!(t.format("%H:%M %z").to_string(), "08:15 +0200");
///
/// assert!(parse_provider_time("10:00", berlin).is_err());
/// ```
pub fn parse_provider_time(s: &str, tz: Tz) -> Result<DateTime<Tz>, TimeError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(TimeError::new("empty timestamp"));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&tz));
    }

    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(dt.with_timezone(&tz));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return tz
                .from_local_datetime(&naive)
                .earliest()
                .ok_or_else(|| TimeError::new("local time does not exist in provider zone"));
        }
    }

    Err(TimeError::new("expected ISO 8601 timestamp"))
}

/// Format as the `HH:MM` shown on departure boards.
pub fn format_hhmm(t: &DateTime<Tz>) -> String {
    t.format("%H:%M").to_string()
}

/// Whole minutes in `d`, truncated toward zero.
pub fn whole_minutes(d: Duration) -> i64 {
    d.num_minutes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Timelike, Utc};

    const BERLIN: Tz = chrono_tz::Europe::Berlin;

    #[test]
    fn parse_utc() {
        let t = parse_provider_time("2025-01-15T10:00:00Z", BERLIN).unwrap();
        assert_eq!(t.hour(), 11);
        assert_eq!(format_hhmm(&t), "11:00");
    }

    #[test]
    fn parse_colon_offset() {
        let t = parse_provider_time("2025-01-15T10:05:00+01:00", BERLIN).unwrap();
        assert_eq!(format_hhmm(&t), "10:05");
    }

    #[test]
    fn parse_compact_offset() {
        let t = parse_provider_time("2025-06-15T10:05:00+0200", BERLIN).unwrap();
        assert_eq!(format_hhmm(&t), "10:05");
    }

    #[test]
    fn parse_fractional_seconds() {
        let t = parse_provider_time("2025-01-15T10:05:30.250Z", BERLIN).unwrap();
        assert_eq!(format_hhmm(&t), "11:05");
    }

    #[test]
    fn naive_uses_provider_zone_with_dst() {
        let stockholm = chrono_tz::Europe::Stockholm;
        let winter = parse_provider_time("2025-01-15T10:00:00", stockholm).unwrap();
        let summer = parse_provider_time("2025-07-15T10:00:00", stockholm).unwrap();
        assert_eq!(winter.with_timezone(&Utc).hour(), 9);
        assert_eq!(summer.with_timezone(&Utc).hour(), 8);
    }

    #[test]
    fn naive_with_space_separator() {
        let t = parse_provider_time("2025-01-15 10:00:00", BERLIN).unwrap();
        assert_eq!(format_hhmm(&t), "10:00");
    }

    #[test]
    fn naive_in_spring_gap_is_rejected() {
        // 02:30 does not exist in Berlin on 2025-03-30
        assert!(parse_provider_time("2025-03-30T02:30:00", BERLIN).is_err());
    }

    #[test]
    fn naive_in_autumn_fold_takes_earlier() {
        let t = parse_provider_time("2025-10-26T02:30:00", BERLIN).unwrap();
        // Earlier instant is still on summer time (+02:00)
        assert_eq!(t.with_timezone(&Utc).hour(), 0);
    }

    #[test]
    fn reject_garbage() {
        assert!(parse_provider_time("", BERLIN).is_err());
        assert!(parse_provider_time("   ", BERLIN).is_err());
        assert!(parse_provider_time("tomorrow", BERLIN).is_err());
        assert!(parse_provider_time("2025-13-01T10:00:00Z", BERLIN).is_err());
    }

    #[test]
    fn whole_minutes_truncates_toward_zero() {
        assert_eq!(whole_minutes(Duration::seconds(119)), 1);
        assert_eq!(whole_minutes(Duration::seconds(-119)), -1);
        assert_eq!(whole_minutes(Duration::seconds(59)), 0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any RFC 3339 UTC timestamp parses and keeps its instant
        #[test]
        fn utc_instant_preserved(secs in 0i64..4_000_000_000) {
            let utc = DateTime::from_timestamp(secs, 0).unwrap();
            let s = utc.to_rfc3339();
            let parsed = parse_provider_time(&s, chrono_tz::Europe::Berlin).unwrap();
            prop_assert_eq!(parsed.timestamp(), secs);
        }

        /// Formatting is always HH:MM
        #[test]
        fn hhmm_shape(secs in 0i64..4_000_000_000) {
            let utc = DateTime::from_timestamp(secs, 0).unwrap();
            let local = utc.with_timezone(&chrono_tz::Europe::Dublin);
            let s = format_hhmm(&local);
            prop_assert_eq!(s.len(), 5);
            prop_assert_eq!(&s[2..3], ":");
        }
    }
}
