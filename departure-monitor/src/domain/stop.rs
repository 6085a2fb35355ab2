//! Stop references.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a stop reference is empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid stop: {reason}")]
pub struct InvalidStop {
    reason: &'static str,
}

/// Identifies the stop a monitor watches.
///
/// Providers prefer a stop id. EFA networks can also resolve a stop from a
/// place (city) and stop name, which is what users type when they don't know
/// the id.
///
/// # Examples
///
/// ```
/// use departure_monitor::domain::StopRef;
///
/// let by_id = StopRef::id("20018235").unwrap();
/// assert_eq!(by_id.to_string(), "20018235");
///
/// let by_name = StopRef::named("Düsseldorf", "Elbruchstrasse").unwrap();
/// assert_eq!(by_name.to_string(), "Düsseldorf - Elbruchstrasse");
///
/// assert!(StopRef::id("  ").is_err());
/// assert!(StopRef::named("Düsseldorf", "").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopRef {
    Id { station_id: String },
    Named { place: String, name: String },
}

impl StopRef {
    /// A stop identified by its provider-specific id.
    pub fn id(station_id: &str) -> Result<Self, InvalidStop> {
        let station_id = station_id.trim();
        if station_id.is_empty() {
            return Err(InvalidStop {
                reason: "station id must not be empty",
            });
        }
        Ok(StopRef::Id {
            station_id: station_id.to_string(),
        })
    }

    /// A stop identified by place and stop name.
    pub fn named(place: &str, name: &str) -> Result<Self, InvalidStop> {
        let place = place.trim();
        let name = name.trim();
        if place.is_empty() {
            return Err(InvalidStop {
                reason: "place must not be empty",
            });
        }
        if name.is_empty() {
            return Err(InvalidStop {
                reason: "stop name must not be empty",
            });
        }
        Ok(StopRef::Named {
            place: place.to_string(),
            name: name.to_string(),
        })
    }

    /// The stop id, if this reference has one.
    pub fn station_id(&self) -> Option<&str> {
        match self {
            StopRef::Id { station_id } => Some(station_id),
            StopRef::Named { .. } => None,
        }
    }

    /// Re-validate after deserialization, which bypasses the constructors.
    pub fn validated(self) -> Result<Self, InvalidStop> {
        match &self {
            StopRef::Id { station_id } => Self::id(station_id),
            StopRef::Named { place, name } => Self::named(place, name),
        }
    }
}

impl fmt::Display for StopRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopRef::Id { station_id } => f.write_str(station_id),
            StopRef::Named { place, name } => write!(f, "{place} - {name}"),
        }
    }
}
