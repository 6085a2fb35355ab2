//! Monitors: configured stops that are polled on an interval.
//!
//! Each monitor has a [`Coordinator`] that fetches stop events through its
//! provider, respecting the provider's rate limits, and derives a
//! [`DepartureBoard`] and a [`DelayReport`] from the latest data.

mod board;
mod config;
mod coordinator;
mod delay;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::provider::ProviderError;
use crate::rate_limit::LimitReached;

pub use board::{DepartureBoard, DepartureView, NO_DEPARTURES};
pub use config::{
    DEFAULT_DELAY_THRESHOLD_MINS, DEFAULT_DEPARTURES, DEFAULT_SCAN_INTERVAL_SECS, MAX_DEPARTURES,
    MIN_SCAN_INTERVAL_SECS, MonitorConfig, MonitorOptions,
};
pub use coordinator::{Coordinator, MonitorStatus, Snapshot};
pub use delay::DelayReport;

/// Errors from monitor setup and refreshes.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Configuration out of range or inconsistent
    #[error("invalid monitor {monitor:?}: {reason}")]
    InvalidConfig { monitor: String, reason: String },

    /// Rate limit reached before any data was fetched
    #[error("rate limit reached ({0}) and no departures cached yet")]
    RateLimited(LimitReached),

    /// Provider request failed
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// The configured monitors, in configuration order.
#[derive(Clone, Default)]
pub struct Monitors {
    ordered: Vec<Arc<Coordinator>>,
    by_id: HashMap<String, Arc<Coordinator>>,
}

impl Monitors {
    /// Collect coordinators, rejecting duplicate ids.
    pub fn new(coordinators: impl IntoIterator<Item = Coordinator>) -> Result<Self, MonitorError> {
        let mut monitors = Self::default();
        for coordinator in coordinators {
            let coordinator = Arc::new(coordinator);
            let id = coordinator.id().to_string();
            if monitors.by_id.contains_key(&id) {
                return Err(MonitorError::InvalidConfig {
                    monitor: id,
                    reason: "duplicate monitor id".into(),
                });
            }
            monitors.by_id.insert(id, Arc::clone(&coordinator));
            monitors.ordered.push(coordinator);
        }
        Ok(monitors)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Coordinator>> {
        self.by_id.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Coordinator>> {
        self.ordered.iter()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Start every monitor's polling loop.
    pub fn spawn_all(&self, shutdown: &watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        self.ordered
            .iter()
            .map(|c| tokio::spawn(Arc::clone(c).run(shutdown.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProviderId, StopRef};
    use crate::provider::MockProvider;
    use crate::rate_limit::RateLimitConfig;

    fn coordinator(id: &str) -> Coordinator {
        let provider = MockProvider::new(ProviderId::Vrr, "data/mock_boards").unwrap();
        let config = MonitorConfig::new(id, ProviderId::Vrr, StopRef::id("20018235").unwrap());
        Coordinator::new(config, Arc::new(provider), RateLimitConfig::default()).unwrap()
    }

    #[test]
    fn keeps_configuration_order() {
        let monitors = Monitors::new([coordinator("b"), coordinator("a")]).unwrap();
        let ids: Vec<&str> = monitors.iter().map(|c| c.id()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert!(monitors.get("a").is_some());
        assert!(monitors.get("c").is_none());
        assert_eq!(monitors.len(), 2);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = Monitors::new([coordinator("a"), coordinator("a")]).err().unwrap();
        assert!(err.to_string().contains("duplicate"), "{err}");
    }

    #[tokio::test]
    async fn mock_board_end_to_end() {
        let monitors = Monitors::new([coordinator("home")]).unwrap();
        let home = monitors.get("home").unwrap();
        home.refresh().await.unwrap();

        let board = home.board().await.unwrap();
        // The mock board is in the past, so every row has departed
        assert_eq!(board.departures.len(), 4);
        assert!(board.departures.iter().all(|d| d.minutes_until_departure == 0));
        assert_eq!(board.departures[0].line, "U79");

        let delays = home.delays().await.unwrap();
        assert_eq!(delays.max_delay, 8);
        assert!(delays.is_on);
    }
}
