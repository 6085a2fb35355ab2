//! Per-monitor polling coordinator.
//!
//! A coordinator owns the latest stop events of one monitor. `run` refreshes
//! them on the scan interval; web handlers read the cached data and may
//! force a refresh. Refreshes are serialized, so the rate limiter sees every
//! call in order.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, Notify, RwLock, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::domain::ProviderId;
use crate::gtfs::GtfsManager;
use crate::provider::{Provider, StopEvent};
use crate::rate_limit::{RateLimitConfig, RateLimiter, Window, secs_to_next_minute};

use super::MonitorError;
use super::board::DepartureBoard;
use super::config::{MonitorConfig, MonitorOptions};
use super::delay::DelayReport;

/// Stop events from one successful fetch.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub events: Arc<Vec<StopEvent>>,
    pub fetched_at: DateTime<Utc>,
}

/// Health of a monitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorStatus {
    pub provider: ProviderId,
    pub last_update_success: bool,
    /// RFC 3339 time of the last successful fetch
    pub last_update: Option<String>,
    pub last_error: Option<String>,
    pub scan_interval_secs: u64,
    pub api_calls_this_minute: u32,
    pub api_calls_today: u32,
    /// Local day the call count belongs to
    pub last_day_reset: Option<String>,
    pub daily_limit: u32,
    /// RFC 3339 time the shared GTFS static data was loaded (GTFS providers)
    pub gtfs_loaded_at: Option<String>,
}

struct State {
    config: MonitorConfig,
    snapshot: Option<Snapshot>,
    last_update_success: bool,
    last_error: Option<String>,
    limiter: RateLimiter,
}

/// Polls one monitor's stop.
pub struct Coordinator {
    id: String,
    provider: Arc<dyn Provider>,
    gtfs: Option<Arc<GtfsManager>>,
    state: RwLock<State>,
    /// Serializes refreshes.
    refresh_lock: Mutex<()>,
    options_changed: Notify,
}

impl Coordinator {
    /// Create a coordinator for a validated monitor config.
    pub fn new(
        config: MonitorConfig,
        provider: Arc<dyn Provider>,
        limits: RateLimitConfig,
    ) -> Result<Self, MonitorError> {
        config.validate()?;
        if provider.id() != config.provider {
            return Err(MonitorError::InvalidConfig {
                monitor: config.id.clone(),
                reason: format!(
                    "provider {} does not serve {}",
                    provider.id(),
                    config.provider
                ),
            });
        }

        Ok(Self {
            id: config.id.clone(),
            provider,
            gtfs: None,
            state: RwLock::new(State {
                config,
                snapshot: None,
                last_update_success: false,
                last_error: None,
                limiter: RateLimiter::new(limits),
            }),
            refresh_lock: Mutex::new(()),
            options_changed: Notify::new(),
        })
    }

    /// Share GTFS static data with other monitors while running.
    pub fn with_gtfs(mut self, gtfs: Arc<GtfsManager>) -> Self {
        self.gtfs = Some(gtfs);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn provider_id(&self) -> ProviderId {
        self.provider.id()
    }

    pub async fn config(&self) -> MonitorConfig {
        self.state.read().await.config.clone()
    }

    /// Fetch fresh stop events.
    ///
    /// When the rate limit is reached the previous data is returned if there
    /// is any. On failure the previous data is kept and the error returned.
    pub async fn refresh(&self) -> Result<Snapshot, MonitorError> {
        let _guard = self.refresh_lock.lock().await;
        let tz = self.provider.id().timezone();

        let (stop, limit) = {
            let mut state = self.state.write().await;
            let now = Utc::now().with_timezone(&tz);
            let next_minute = secs_to_next_minute(&now);
            if let Err(reached) = state.limiter.check(now) {
                let retry_in_secs = (reached.window == Window::Minute).then_some(next_minute);
                return match state.snapshot.clone() {
                    Some(snapshot) => {
                        tracing::warn!(
                            monitor = %self.id,
                            %reached,
                            ?retry_in_secs,
                            "rate limit reached, keeping previous departures"
                        );
                        Ok(snapshot)
                    }
                    None => {
                        tracing::warn!(monitor = %self.id, %reached, "rate limit reached, no data yet");
                        state.last_update_success = false;
                        state.last_error = Some(reached.to_string());
                        Err(MonitorError::RateLimited(reached))
                    }
                };
            }
            (state.config.stop.clone(), state.config.departures)
        };

        let result = self.provider.fetch_stop_events(&stop, limit).await;

        let mut state = self.state.write().await;
        match result {
            Ok(events) => {
                let fetched_at = Utc::now();
                state.limiter.record(fetched_at.with_timezone(&tz));
                tracing::info!(
                    monitor = %self.id,
                    provider = %self.provider.id(),
                    events = events.len(),
                    calls_today = state.limiter.calls_today(),
                    "refreshed departures"
                );
                let snapshot = Snapshot {
                    events: Arc::new(events),
                    fetched_at,
                };
                state.snapshot = Some(snapshot.clone());
                state.last_update_success = true;
                state.last_error = None;
                Ok(snapshot)
            }
            Err(e) => {
                tracing::error!(
                    monitor = %self.id,
                    provider = %self.provider.id(),
                    error = %e,
                    "failed to refresh departures"
                );
                state.last_update_success = false;
                state.last_error = Some(e.to_string());
                Err(MonitorError::Provider(e))
            }
        }
    }

    /// Data from the last successful fetch.
    pub async fn snapshot(&self) -> Option<Snapshot> {
        self.state.read().await.snapshot.clone()
    }

    /// The departure board, or `None` before the first successful fetch.
    pub async fn board(&self) -> Option<DepartureBoard> {
        let state = self.state.read().await;
        let snapshot = state.snapshot.as_ref()?;
        Some(DepartureBoard::build(
            &snapshot.events,
            self.provider.as_ref(),
            &state.config,
            snapshot.fetched_at,
            Utc::now(),
        ))
    }

    /// The delay report, or `None` before the first successful fetch.
    pub async fn delays(&self) -> Option<DelayReport> {
        let state = self.state.read().await;
        let snapshot = state.snapshot.as_ref()?;
        Some(DelayReport::build(
            &snapshot.events,
            state.config.delay_threshold_mins,
            self.provider.id().timezone(),
        ))
    }

    pub async fn status(&self) -> MonitorStatus {
        let provider = self.provider.id();
        let gtfs_loaded_at = match &self.gtfs {
            Some(gtfs) if provider.is_gtfs() => gtfs.loaded_at(provider).await,
            _ => None,
        };

        let mut state = self.state.write().await;
        let now = Utc::now().with_timezone(&provider.timezone());
        state.limiter.advance(&now);

        MonitorStatus {
            provider,
            last_update_success: state.last_update_success,
            last_update: state.snapshot.as_ref().map(|s| s.fetched_at.to_rfc3339()),
            last_error: state.last_error.clone(),
            scan_interval_secs: state.config.scan_interval_secs,
            api_calls_this_minute: state.limiter.calls_this_minute(&now),
            api_calls_today: state.limiter.calls_today(),
            last_day_reset: state.limiter.current_day().map(|d| d.to_string()),
            daily_limit: state.limiter.config().per_day,
            gtfs_loaded_at: gtfs_loaded_at.map(|t| t.to_rfc3339()),
        }
    }

    /// Change options at runtime and refresh with them.
    pub async fn update_options(&self, options: &MonitorOptions) -> Result<Snapshot, MonitorError> {
        {
            let mut state = self.state.write().await;
            let updated = state.config.with_options(options);
            updated.validate()?;
            tracing::info!(
                monitor = %self.id,
                departures = updated.departures,
                scan_interval_secs = updated.scan_interval_secs,
                "monitor options updated"
            );
            state.config = updated;
        }
        self.options_changed.notify_one();
        self.refresh().await
    }

    /// Refresh on the scan interval until `shutdown` turns true.
    ///
    /// The first refresh happens immediately. Scans that fall behind are
    /// delayed rather than bunched up.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let provider = self.provider.id();
        let gtfs = self
            .gtfs
            .clone()
            .filter(|g| provider.is_gtfs() && g.is_configured(provider));
        if let Some(gtfs) = &gtfs
            && let Err(e) = gtfs.acquire(provider)
        {
            tracing::warn!(monitor = %self.id, error = %e, "could not register GTFS user");
        }

        let period = self.config().await.scan_interval();
        let mut interval = scan_interval(period, Instant::now());
        tracing::info!(monitor = %self.id, %provider, interval_secs = period.as_secs(), "monitor started");

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    // Failures are logged and kept in the status.
                    let _ = self.refresh().await;
                }
                () = self.options_changed.notified() => {
                    // update_options has just refreshed
                    let period = self.config().await.scan_interval();
                    interval = scan_interval(period, Instant::now() + period);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        if let Some(gtfs) = gtfs {
            gtfs.release(provider).await;
        }
        tracing::info!(monitor = %self.id, "monitor stopped");
    }
}

fn scan_interval(period: Duration, start: Instant) -> Interval {
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
