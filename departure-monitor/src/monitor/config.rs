//! Per-monitor configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{ProviderId, StopRef, TransportType};

use super::MonitorError;

/// Departures shown when a monitor does not configure a limit.
pub const DEFAULT_DEPARTURES: u32 = 10;

/// Upper bound for the departures limit.
pub const MAX_DEPARTURES: u32 = 100;

pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 60;

/// Scans more frequent than this are rejected.
pub const MIN_SCAN_INTERVAL_SECS: u64 = 10;

/// Delays above this many minutes switch the delay alarm on.
pub const DEFAULT_DELAY_THRESHOLD_MINS: i64 = 5;

fn default_departures() -> u32 {
    DEFAULT_DEPARTURES
}

fn default_transport_types() -> Vec<TransportType> {
    TransportType::DEFAULT_FILTER.to_vec()
}

fn default_scan_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL_SECS
}

fn default_delay_threshold() -> i64 {
    DEFAULT_DELAY_THRESHOLD_MINS
}

/// One watched stop.
///
/// In TOML:
///
/// ```toml
/// [[monitors]]
/// id = "elbruch"
/// provider = "vrr"
/// stop = { place = "Düsseldorf", name = "Elbruchstrasse" }
/// transport_types = ["tram", "bus"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Unique identifier, used in URLs.
    pub id: String,

    /// Display name; defaults to the stop.
    #[serde(default)]
    pub name: Option<String>,

    pub provider: ProviderId,

    pub stop: StopRef,

    /// Maximum departures on the board.
    #[serde(default = "default_departures")]
    pub departures: u32,

    /// Only departures of these types are shown.
    #[serde(default = "default_transport_types")]
    pub transport_types: Vec<TransportType>,

    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// Minutes of delay above which the delay alarm is on.
    #[serde(default = "default_delay_threshold")]
    pub delay_threshold_mins: i64,
}

impl MonitorConfig {
    /// Create a config with default options.
    pub fn new(id: impl Into<String>, provider: ProviderId, stop: StopRef) -> Self {
        Self {
            id: id.into(),
            name: None,
            provider,
            stop,
            departures: DEFAULT_DEPARTURES,
            transport_types: default_transport_types(),
            scan_interval_secs: DEFAULT_SCAN_INTERVAL_SECS,
            delay_threshold_mins: DEFAULT_DELAY_THRESHOLD_MINS,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_departures(mut self, departures: u32) -> Self {
        self.departures = departures;
        self
    }

    pub fn with_transport_types(mut self, types: impl IntoIterator<Item = TransportType>) -> Self {
        self.transport_types = types.into_iter().collect();
        self
    }

    pub fn with_scan_interval_secs(mut self, secs: u64) -> Self {
        self.scan_interval_secs = secs;
        self
    }

    pub fn with_delay_threshold_mins(mut self, mins: i64) -> Self {
        self.delay_threshold_mins = mins;
        self
    }

    /// Name shown on boards: the configured name, else the stop.
    pub fn station_name(&self) -> String {
        self.name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.stop.to_string())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    /// Check ranges and provider requirements.
    pub fn validate(&self) -> Result<(), MonitorError> {
        let invalid = |reason: String| MonitorError::InvalidConfig {
            monitor: self.id.clone(),
            reason,
        };

        if self.id.trim().is_empty() {
            return Err(invalid("id must not be empty".into()));
        }
        if !self
            .id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(invalid(
                "id may only contain ASCII letters, digits, '-' and '_'".into(),
            ));
        }
        self.stop
            .clone()
            .validated()
            .map_err(|e| invalid(e.to_string()))?;
        if !self.provider.is_efa() && self.stop.station_id().is_none() {
            return Err(invalid(format!(
                "{} stops must be given by station id",
                self.provider
            )));
        }
        if !(1..=MAX_DEPARTURES).contains(&self.departures) {
            return Err(invalid(format!(
                "departures must be between 1 and {MAX_DEPARTURES}, got {}",
                self.departures
            )));
        }
        if self.scan_interval_secs < MIN_SCAN_INTERVAL_SECS {
            return Err(invalid(format!(
                "scan_interval_secs must be at least {MIN_SCAN_INTERVAL_SECS}, got {}",
                self.scan_interval_secs
            )));
        }
        if self.transport_types.is_empty() {
            return Err(invalid("transport_types must not be empty".into()));
        }
        if self.delay_threshold_mins < 0 {
            return Err(invalid("delay_threshold_mins must not be negative".into()));
        }
        Ok(())
    }

    /// Apply runtime option changes, returning the updated config.
    pub fn with_options(&self, options: &MonitorOptions) -> Self {
        let mut config = self.clone();
        if let Some(departures) = options.departures {
            config.departures = departures;
        }
        if let Some(secs) = options.scan_interval_secs {
            config.scan_interval_secs = secs;
        }
        if let Some(types) = &options.transport_types {
            config.transport_types = types.clone();
        }
        config
    }
}

/// Options that can change while a monitor runs.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MonitorOptions {
    pub departures: Option<u32>,
    pub scan_interval_secs: Option<u64>,
    pub transport_types: Option<Vec<TransportType>>,
}
