//! Transport type classification.
//!
//! Every provider reports the kind of vehicle differently: EFA uses numeric
//! product classes whose meaning differs per network, Trafiklab uses mode
//! strings, GTFS uses (extended) route types. They all end up here.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an unknown transport type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transport type: {0:?}")]
pub struct InvalidTransportType(String);

/// Unified kind of vehicle serving a departure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    Bus,
    Tram,
    Subway,
    Train,
    Ferry,
    Taxi,
    OnDemand,
    Unknown,
}

impl TransportType {
    /// Transport types shown when a monitor does not configure a filter.
    pub const DEFAULT_FILTER: [TransportType; 4] = [
        TransportType::Bus,
        TransportType::Tram,
        TransportType::Subway,
        TransportType::Train,
    ];

    /// Parse from the snake_case identifier.
    pub fn parse(s: &str) -> Result<Self, InvalidTransportType> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bus" => Ok(TransportType::Bus),
            "tram" => Ok(TransportType::Tram),
            "subway" => Ok(TransportType::Subway),
            "train" => Ok(TransportType::Train),
            "ferry" => Ok(TransportType::Ferry),
            "taxi" => Ok(TransportType::Taxi),
            "on_demand" => Ok(TransportType::OnDemand),
            "unknown" => Ok(TransportType::Unknown),
            _ => Err(InvalidTransportType(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportType::Bus => "bus",
            TransportType::Tram => "tram",
            TransportType::Subway => "subway",
            TransportType::Train => "train",
            TransportType::Ferry => "ferry",
            TransportType::Taxi => "taxi",
            TransportType::OnDemand => "on_demand",
            TransportType::Unknown => "unknown",
        }
    }

    /// Classify a VRR EFA product class.
    pub fn from_vrr_class(class: i64) -> Self {
        match class {
            0 | 1 | 13 | 15 | 16 => TransportType::Train,
            2 | 3 => TransportType::Subway,
            4 => TransportType::Tram,
            5..=8 | 11 => TransportType::Bus,
            9 => TransportType::Ferry,
            10 => TransportType::Taxi,
            _ => TransportType::Unknown,
        }
    }

    /// Classify a KVV EFA product class.
    pub fn from_kvv_class(class: i64) -> Self {
        match class {
            1 => TransportType::Train,
            4 => TransportType::Tram,
            5 => TransportType::Bus,
            _ => TransportType::Unknown,
        }
    }

    /// Classify an HVV product class.
    pub fn from_hvv_class(class: i64) -> Self {
        match class {
            0 | 1 => TransportType::Train,
            2 | 3 => TransportType::Subway,
            4 => TransportType::Tram,
            5..=7 => TransportType::Bus,
            9 => TransportType::Ferry,
            10 => TransportType::OnDemand,
            _ => TransportType::Unknown,
        }
    }

    /// Classify a Trafiklab `transport_mode`. Unrecognised modes are buses.
    pub fn from_trafiklab_mode(mode: &str) -> Self {
        match mode.to_ascii_uppercase().as_str() {
            "TRAM" => TransportType::Tram,
            "METRO" => TransportType::Subway,
            "TRAIN" => TransportType::Train,
            "FERRY" | "SHIP" => TransportType::Ferry,
            "TAXI" => TransportType::Taxi,
            _ => TransportType::Bus,
        }
    }

    /// Classify a GTFS `route_type`, including the extended route types.
    pub fn from_gtfs_route_type(route_type: i64) -> Self {
        match route_type {
            0 | 900..=999 => TransportType::Tram,
            1 | 400..=499 => TransportType::Subway,
            2 | 100..=199 => TransportType::Train,
            715 => TransportType::OnDemand,
            3 | 200..=299 | 700..=799 => TransportType::Bus,
            4 | 1000..=1099 | 1200 => TransportType::Ferry,
            1500..=1599 => TransportType::Taxi,
            _ => TransportType::Bus,
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vrr_classes() {
        assert_eq!(TransportType::from_vrr_class(0), TransportType::Train);
        assert_eq!(TransportType::from_vrr_class(2), TransportType::Subway);
        assert_eq!(TransportType::from_vrr_class(4), TransportType::Tram);
        assert_eq!(TransportType::from_vrr_class(5), TransportType::Bus);
        assert_eq!(TransportType::from_vrr_class(9), TransportType::Ferry);
        assert_eq!(TransportType::from_vrr_class(10), TransportType::Taxi);
        assert_eq!(TransportType::from_vrr_class(16), TransportType::Train);
        assert_eq!(TransportType::from_vrr_class(12), TransportType::Unknown);
        assert_eq!(TransportType::from_vrr_class(-1), TransportType::Unknown);
    }

    #[test]
    fn kvv_classes() {
        assert_eq!(TransportType::from_kvv_class(1), TransportType::Train);
        assert_eq!(TransportType::from_kvv_class(4), TransportType::Tram);
        assert_eq!(TransportType::from_kvv_class(5), TransportType::Bus);
        assert_eq!(TransportType::from_kvv_class(0), TransportType::Unknown);
    }

    #[test]
    fn hvv_classes() {
        assert_eq!(TransportType::from_hvv_class(1), TransportType::Train);
        assert_eq!(TransportType::from_hvv_class(2), TransportType::Subway);
        assert_eq!(TransportType::from_hvv_class(9), TransportType::Ferry);
        assert_eq!(TransportType::from_hvv_class(10), TransportType::OnDemand);
        assert_eq!(TransportType::from_hvv_class(8), TransportType::Unknown);
    }

    #[test]
    fn trafiklab_modes() {
        assert_eq!(TransportType::from_trafiklab_mode("BUS"), TransportType::Bus);
        assert_eq!(
            TransportType::from_trafiklab_mode("METRO"),
            TransportType::Subway
        );
        assert_eq!(
            TransportType::from_trafiklab_mode("train"),
            TransportType::Train
        );
        assert_eq!(
            TransportType::from_trafiklab_mode("SHIP"),
            TransportType::Ferry
        );
        assert_eq!(
            TransportType::from_trafiklab_mode("HOVERCRAFT"),
            TransportType::Bus
        );
    }

    #[test]
    fn gtfs_route_types() {
        assert_eq!(TransportType::from_gtfs_route_type(0), TransportType::Tram);
        assert_eq!(TransportType::from_gtfs_route_type(1), TransportType::Subway);
        assert_eq!(TransportType::from_gtfs_route_type(2), TransportType::Train);
        assert_eq!(TransportType::from_gtfs_route_type(3), TransportType::Bus);
        assert_eq!(TransportType::from_gtfs_route_type(4), TransportType::Ferry);
        assert_eq!(TransportType::from_gtfs_route_type(109), TransportType::Train);
        assert_eq!(TransportType::from_gtfs_route_type(400), TransportType::Subway);
        assert_eq!(TransportType::from_gtfs_route_type(700), TransportType::Bus);
        assert_eq!(
            TransportType::from_gtfs_route_type(715),
            TransportType::OnDemand
        );
        assert_eq!(TransportType::from_gtfs_route_type(900), TransportType::Tram);
        assert_eq!(TransportType::from_gtfs_route_type(1000), TransportType::Ferry);
        assert_eq!(TransportType::from_gtfs_route_type(1501), TransportType::Taxi);
        assert_eq!(TransportType::from_gtfs_route_type(42), TransportType::Bus);
    }

    #[test]
    fn serde_snake_case() {
        let json = serde_json::to_string(&TransportType::OnDemand).unwrap();
        assert_eq!(json, "\"on_demand\"");
        let parsed: TransportType = serde_json::from_str("\"subway\"").unwrap();
        assert_eq!(parsed, TransportType::Subway);
    }

    #[test]
    fn default_filter_excludes_ferry() {
        assert!(!TransportType::DEFAULT_FILTER.contains(&TransportType::Ferry));
        assert_eq!(TransportType::DEFAULT_FILTER.len(), 4);
    }
}
