//! Per-provider API call budget.
//!
//! Providers publish fair-use limits. Each monitor counts its successful
//! calls in fixed windows (clock minute, clock hour and local calendar day)
//! and refuses to call out once any window is full.

use chrono::{DateTime, NaiveDate, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

/// Call limits per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub per_minute: u32,
    pub per_hour: u32,
    pub per_day: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: 60,
            per_hour: 1000,
            per_day: 60000,
        }
    }
}

/// The window whose budget is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    Minute,
    Hour,
    Day,
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Window::Minute => "minute",
            Window::Hour => "hour",
            Window::Day => "day",
        })
    }
}

/// Error returned when a call would exceed a limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{limit} calls per {window} reached")]
pub struct LimitReached {
    pub window: Window,
    pub limit: u32,
}

/// A counter for one fixed window, identified by a window number.
#[derive(Debug, Clone, Copy, Default)]
struct Counter {
    window: i64,
    count: u32,
}

impl Counter {
    fn roll(&mut self, window: i64) {
        if self.window != window {
            self.window = window;
            self.count = 0;
        }
    }
}

/// Fixed-window rate limiter for one monitor.
///
/// Times are passed in explicitly so the day boundary follows the provider's
/// local calendar.
///
/// # Examples
///
/// ```
/// use chrono::TimeZone;
/// use departure_monitor::rate_limit::{RateLimitConfig, RateLimiter};
///
/// let config = RateLimitConfig { per_minute: 2, ..Default::default() };
/// let mut limiter = RateLimiter::new(config);
/// let now = chrono_tz::Europe::Berlin.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap();
///
/// limiter.record(now);
/// limiter.record(now);
/// assert!(limiter.check(now).is_err());
///
/// // A new minute frees the budget
/// assert!(limiter.check(now + chrono::Duration::minutes(1)).is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    minute: Counter,
    hour: Counter,
    day: Option<NaiveDate>,
    calls_today: u32,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            minute: Counter::default(),
            hour: Counter::default(),
            day: None,
            calls_today: 0,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Roll the windows forward to `now`, resetting counters of windows that ended.
    pub fn advance<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) {
        let secs = now.timestamp();
        self.minute.roll(secs.div_euclid(60));
        self.hour.roll(secs.div_euclid(3600));

        let today = now.date_naive();
        if self.day != Some(today) {
            if self.day.is_some() {
                tracing::info!(
                    calls = self.calls_today,
                    date = %today,
                    "new day, resetting daily API call count"
                );
            }
            self.day = Some(today);
            self.calls_today = 0;
        }
    }

    /// Whether another call is allowed at `now`.
    pub fn check<Tz: TimeZone>(&mut self, now: DateTime<Tz>) -> Result<(), LimitReached> {
        self.advance(&now);

        let windows = [
            (Window::Minute, self.minute.count, self.config.per_minute),
            (Window::Hour, self.hour.count, self.config.per_hour),
            (Window::Day, self.calls_today, self.config.per_day),
        ];
        match windows.into_iter().find(|&(_, count, limit)| count >= limit) {
            Some((window, _, limit)) => Err(LimitReached { window, limit }),
            None => Ok(()),
        }
    }

    /// Count a successful call made at `now`.
    pub fn record<Tz: TimeZone>(&mut self, now: DateTime<Tz>) {
        self.advance(&now);
        self.minute.count = self.minute.count.saturating_add(1);
        self.hour.count = self.hour.count.saturating_add(1);
        self.calls_today = self.calls_today.saturating_add(1);
    }

    /// Calls counted on the current local day.
    pub fn calls_today(&self) -> u32 {
        self.calls_today
    }

    /// The local day the daily counter belongs to.
    pub fn current_day(&self) -> Option<NaiveDate> {
        self.day
    }

    /// Calls counted in the current clock minute, as of `now`.
    pub fn calls_this_minute<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> u32 {
        if self.minute.window == now.timestamp().div_euclid(60) {
            self.minute.count
        } else {
            0
        }
    }
}

/// Seconds until the next clock minute, for log messages.
pub fn secs_to_next_minute<Tz: TimeZone>(now: &DateTime<Tz>) -> u32 {
    60 - now.second()
}
