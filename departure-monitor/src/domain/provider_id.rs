//! Provider identifiers.

use std::fmt;
use std::str::FromStr;

use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error returned when parsing an unknown provider identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider: {0:?}")]
pub struct InvalidProvider(String);

/// A supported departure data provider.
///
/// # Examples
///
/// ```
/// use departure_monitor::domain::ProviderId;
///
/// let vrr = ProviderId::parse("vrr").unwrap();
/// assert_eq!(vrr.as_str(), "vrr");
/// assert!(!vrr.requires_api_key());
///
/// // Case and surrounding whitespace are ignored
/// assert_eq!(ProviderId::parse(" KVV ").unwrap(), ProviderId::Kvv);
///
/// assert!(ProviderId::parse("mvv").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderId {
    /// Verkehrsverbund Rhein-Ruhr (EFA).
    Vrr,
    /// Karlsruher Verkehrsverbund (EFA).
    Kvv,
    /// Hamburger Verkehrsverbund (EFA-style stopEvents).
    Hvv,
    /// Trafiklab realtime API (Sweden).
    TrafiklabSe,
    /// National Transport Authority (Ireland), GTFS-Realtime.
    NtaIe,
    /// GTFS.de (Germany), GTFS-Realtime.
    GtfsDe,
}

impl ProviderId {
    /// Every supported provider, in display order.
    pub const ALL: [ProviderId; 6] = [
        ProviderId::Vrr,
        ProviderId::Kvv,
        ProviderId::Hvv,
        ProviderId::TrafiklabSe,
        ProviderId::NtaIe,
        ProviderId::GtfsDe,
    ];

    /// Parse a provider identifier.
    pub fn parse(s: &str) -> Result<Self, InvalidProvider> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| InvalidProvider(s.to_string()))
    }

    /// The stable identifier used in configuration and URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Vrr => "vrr",
            ProviderId::Kvv => "kvv",
            ProviderId::Hvv => "hvv",
            ProviderId::TrafiklabSe => "trafiklab_se",
            ProviderId::NtaIe => "nta_ie",
            ProviderId::GtfsDe => "gtfs_de",
        }
    }

    /// Human-readable provider name.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::Vrr => "VRR (NRW)",
            ProviderId::Kvv => "KVV (Karlsruhe)",
            ProviderId::Hvv => "HVV (Hamburg)",
            ProviderId::TrafiklabSe => "Trafiklab (Sweden)",
            ProviderId::NtaIe => "NTA (Ireland)",
            ProviderId::GtfsDe => "GTFS-DE (Germany)",
        }
    }

    /// Local time zone of the provider's network.
    pub fn timezone(&self) -> Tz {
        match self {
            ProviderId::Vrr | ProviderId::Kvv | ProviderId::Hvv | ProviderId::GtfsDe => {
                chrono_tz::Europe::Berlin
            }
            ProviderId::TrafiklabSe => chrono_tz::Europe::Stockholm,
            ProviderId::NtaIe => chrono_tz::Europe::Dublin,
        }
    }

    /// Whether requests to this provider need an API key.
    pub fn requires_api_key(&self) -> bool {
        matches!(self, ProviderId::TrafiklabSe | ProviderId::NtaIe)
    }

    /// Whether this provider speaks the EFA departure monitor protocol.
    pub fn is_efa(&self) -> bool {
        matches!(self, ProviderId::Vrr | ProviderId::Kvv | ProviderId::Hvv)
    }

    /// Whether this provider is backed by GTFS static + realtime feeds.
    pub fn is_gtfs(&self) -> bool {
        matches!(self, ProviderId::NtaIe | ProviderId::GtfsDe)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = InvalidProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ProviderId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProviderId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
