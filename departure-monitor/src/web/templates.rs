//! Askama templates for the web frontend.

use askama_axum::Template;

use crate::monitor::{DelayReport, DepartureBoard, DepartureView, MonitorStatus};

use super::dto::MonitorSummary;

// ============================================================================
// Page Templates (extend base.html)
// ============================================================================

/// Home page listing every monitor.
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub monitors: Vec<MonitorRow>,
}

/// One monitor's departure board.
#[derive(Template)]
#[template(path = "board.html")]
pub struct BoardTemplate {
    pub id: String,
    pub title: String,
    pub provider: String,
    pub last_updated: String,
    pub departures: Vec<DepartureRow>,
    pub delays: Option<DelayReport>,
    pub last_error: Option<String>,
}

/// Error page.
#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub title: String,
    pub message: String,
}

// ============================================================================
// View Models (for templates)
// ============================================================================

/// Monitor row on the index page.
#[derive(Debug, Clone)]
pub struct MonitorRow {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub state: String,
    pub healthy: bool,
}

impl MonitorRow {
    pub fn from_summary(summary: &MonitorSummary) -> Self {
        Self {
            id: summary.id.clone(),
            name: summary.name.clone(),
            provider: summary.provider.display_name().to_string(),
            state: summary.state.clone().unwrap_or_else(|| "–".to_string()),
            healthy: summary.status.last_update_success,
        }
    }
}

/// Departure row on a board page.
#[derive(Debug, Clone)]
pub struct DepartureRow {
    pub line: String,
    pub destination: String,
    pub time: String,
    pub planned_time: String,
    pub platform: String,
    pub delay: i64,
    pub minutes: i64,
    pub is_realtime: bool,
}

impl DepartureRow {
    pub fn from_view(view: &DepartureView) -> Self {
        Self {
            line: view.line.clone(),
            destination: view.destination.clone(),
            time: view.departure_time.clone(),
            planned_time: view.planned_time.clone(),
            platform: view.platform.clone(),
            delay: view.delay,
            minutes: view.minutes_until_departure,
            is_realtime: view.is_realtime,
        }
    }

    /// `now` or `N min`.
    pub fn countdown(&self) -> String {
        if self.minutes == 0 {
            "now".to_string()
        } else {
            format!("{} min", self.minutes)
        }
    }

    /// Signed delay, empty when on time.
    pub fn delay_label(&self) -> String {
        match self.delay {
            0 => String::new(),
            d if d > 0 => format!("+{d}"),
            d => d.to_string(),
        }
    }

    pub fn is_delayed(&self) -> bool {
        self.delay > 0
    }
}

impl BoardTemplate {
    pub fn new(
        id: &str,
        board: &DepartureBoard,
        delays: Option<DelayReport>,
        status: &MonitorStatus,
    ) -> Self {
        Self {
            id: id.to_string(),
            title: board.station_name.clone(),
            provider: status.provider.display_name().to_string(),
            last_updated: board.last_updated.clone(),
            departures: board.departures.iter().map(DepartureRow::from_view).collect(),
            delays,
            last_error: status.last_error.clone(),
        }
    }
}
