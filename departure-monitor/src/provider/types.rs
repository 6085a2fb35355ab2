//! Provider response DTOs.
//!
//! Every provider is normalized into the EFA `stopEvents` shape
//! ([`StopEvent`]). EFA networks return it natively; the Trafiklab and
//! GTFS-Realtime clients build it from their own formats. Fields use
//! `Option` liberally because the APIs omit rather than null them.

use serde::{Deserialize, Deserializer, Serialize};

/// One departure event at a stop, in EFA `stopEvents` form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopEvent {
    /// Timetabled departure (ISO 8601).
    pub departure_time_planned: Option<String>,

    /// Estimated departure (ISO 8601). Absent when no live data exists.
    pub departure_time_estimated: Option<String>,

    pub transportation: Option<Transportation>,

    /// Platform object (VRR, Trafiklab, GTFS).
    pub platform: Option<Platform>,

    /// Flat platform name (VRR and KVV fallback).
    pub platform_name: Option<String>,

    /// Stop location (KVV and HVV carry the platform here).
    pub location: Option<EventLocation>,

    /// Realtime markers, e.g. `MONITORED`.
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub realtime_status: Vec<String>,

    /// KVV realtime flag.
    pub is_realtime_controlled: Option<bool>,

    /// Operating agency (GTFS providers).
    pub agency: Option<String>,

    /// Trafiklab `transport_mode`, e.g. `BUS`.
    pub transport_mode: Option<String>,
}

impl StopEvent {
    /// Whether the event carries the `MONITORED` realtime marker.
    pub fn is_monitored(&self) -> bool {
        self.realtime_status.iter().any(|s| s == "MONITORED")
    }

    /// EFA product class of the serving line, if reported.
    pub fn product_class(&self) -> Option<i64> {
        self.transportation
            .as_ref()
            .and_then(|t| t.product.as_ref())
            .and_then(|p| p.class)
    }

    /// The `platform.name` field, if present and non-empty.
    pub fn platform_object_name(&self) -> Option<&str> {
        self.platform
            .as_ref()
            .and_then(|p| p.name.as_deref())
            .filter(|s| !s.is_empty())
    }
}

/// The line serving a stop event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transportation {
    /// Line number. Some networks send it as a JSON number.
    #[serde(default, deserialize_with = "string_or_number")]
    pub number: Option<String>,

    pub description: Option<String>,

    pub destination: Option<Destination>,

    pub product: Option<Product>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub name: Option<String>,
}

/// EFA product (vehicle kind).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Network-specific product class.
    pub class: Option<i64>,
    pub name: Option<String>,
}

/// Platform object.
///
/// Some responses send the platform as a bare string instead of an object;
/// both deserialize to this type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Platform {
    pub name: Option<String>,
}

impl Platform {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

impl<'de> Deserialize<'de> for Platform {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Object { name: Option<String> },
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Object { name } => Platform { name },
            Raw::Text(s) => Platform { name: Some(s) },
            Raw::Number(n) => Platform {
                name: Some(n.to_string()),
            },
        })
    }
}

/// Location block of a stop event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLocation {
    pub disassembled_name: Option<String>,
    pub platform_name: Option<String>,
    pub properties: Option<LocationProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationProperties {
    pub platform: Option<String>,
}

/// Response from an EFA `XML_DM_REQUEST` with `outputFormat=RapidJSON`.
///
/// Events are kept as raw JSON so one malformed event can be skipped
/// without losing the whole board.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DmResponse {
    #[serde(default)]
    pub stop_events: Vec<serde_json::Value>,
}

/// Response from an EFA `XML_STOPFINDER_REQUEST`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StopFinderResponse {
    #[serde(default)]
    pub locations: Vec<serde_json::Value>,
}

/// A location returned by the EFA stop finder.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopFinderLocation {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub disassembled_name: Option<String>,
    /// `stop`, `poi`, `street`, ...
    #[serde(rename = "type")]
    pub area_type: Option<String>,
    pub parent: Option<LocationParent>,
    /// `[lat, lon]` in the requested coordinate system.
    pub coord: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationParent {
    pub name: Option<String>,
}

/// Response from Trafiklab `/departures/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrafiklabDepartures {
    pub departures: Option<Vec<serde_json::Value>>,
}

/// One Trafiklab departure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrafiklabDeparture {
    pub scheduled: Option<String>,
    pub realtime: Option<String>,
    pub route: Option<TrafiklabRoute>,
    pub scheduled_platform: Option<TrafiklabPlatform>,
    pub realtime_platform: Option<TrafiklabPlatform>,
    #[serde(default)]
    pub is_realtime: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrafiklabRoute {
    #[serde(default, deserialize_with = "string_or_number")]
    pub designation: Option<String>,
    pub name: Option<String>,
    pub direction: Option<String>,
    pub transport_mode: Option<String>,
    pub destination: Option<Destination>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrafiklabPlatform {
    pub designation: Option<String>,
}

/// Response from Trafiklab `/stops/name/{term}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrafiklabStopSearch {
    #[serde(default)]
    pub stop_groups: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrafiklabStopGroup {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub area_type: Option<String>,
    #[serde(default)]
    pub transport_modes: Vec<String>,
}

/// A stop returned by a provider's stop search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopSuggestion {
    pub id: String,
    pub name: String,
    /// City or area. Empty when unknown.
    pub place: String,
    /// Provider's location kind (`stop`, `poi`, ...), if it reports one.
    pub area_type: Option<String>,
    /// Label shown to users, see [`StopSuggestion::display_name_for`].
    pub display_name: String,
    /// `[lat, lon]`
    pub coordinates: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transport_modes: Vec<String>,
}

impl StopSuggestion {
    pub fn new(id: impl Into<String>, name: impl Into<String>, place: impl Into<String>) -> Self {
        let name = name.into();
        let place = place.into();
        Self {
            id: id.into(),
            display_name: Self::display_name_for(&name, &place),
            name,
            place,
            area_type: None,
            coordinates: None,
            transport_modes: Vec::new(),
        }
    }

    pub fn with_area_type(mut self, area_type: Option<String>) -> Self {
        self.area_type = area_type.filter(|s| !s.is_empty());
        self
    }

    pub fn with_coordinates(mut self, coordinates: Option<[f64; 2]>) -> Self {
        self.coordinates = coordinates;
        self
    }

    pub fn with_transport_modes(mut self, modes: Vec<String>) -> Self {
        self.transport_modes = modes;
        self
    }

    /// `"{place} - {name}"`, unless the place is empty or already part of
    /// the name.
    ///
    /// # Examples
    ///
    /// ```
    /// use departure_monitor::provider::StopSuggestion;
    ///
    /// assert_eq!(
    ///     StopSuggestion::display_name_for("Marktplatz", "Karlsruhe"),
    ///     "Karlsruhe - Marktplatz"
    /// );
    /// assert_eq!(
    ///     StopSuggestion::display_name_for("Karlsruhe Hbf", "karlsruhe"),
    ///     "Karlsruhe Hbf"
    /// );
    /// assert_eq!(StopSuggestion::display_name_for("Slussen", ""), "Slussen");
    /// ```
    pub fn display_name_for(name: &str, place: &str) -> String {
        if !place.is_empty() && !name.to_lowercase().contains(&place.to_lowercase()) {
            format!("{place} - {name}")
        } else {
            name.to_string()
        }
    }
}

/// The part after the last comma, trimmed (`"Slussen, Stockholm"` → `"Stockholm"`).
pub(crate) fn place_after_last_comma(name: &str) -> Option<&str> {
    name.rsplit_once(',')
        .map(|(_, place)| place.trim())
        .filter(|p| !p.is_empty())
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(s)) => Some(s),
        Some(Raw::Int(n)) => Some(n.to_string()),
        Some(Raw::Float(f)) => Some(f.to_string()),
        None => None,
    })
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
