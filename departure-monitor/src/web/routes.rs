//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::future::join_all;

use crate::domain::ProviderId;
use crate::monitor::{Coordinator, MonitorError, MonitorOptions};
use crate::provider::ProviderError;
use crate::stops::{MAX_SUGGESTIONS, StopSearch};

use super::dto::*;
use super::state::AppState;
use super::templates::*;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/health", get(health))
        .route("/monitors/:id", get(monitor_page))
        .route("/api/monitors", get(list_monitors))
        .route("/api/monitors/:id", get(get_monitor))
        .route("/api/monitors/:id/delays", get(get_delays))
        .route("/api/monitors/:id/refresh", post(refresh_monitor))
        .route("/api/monitors/:id/options", post(update_options))
        .route("/api/stops/search", get(search_stops))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

async fn summary(coordinator: &Coordinator) -> MonitorSummary {
    let config = coordinator.config().await;
    let board = coordinator.board().await;
    let status = coordinator.status().await;
    MonitorSummary::new(&config, board.as_ref(), status)
}

/// Summaries of every monitor, in configuration order.
async fn summaries(state: &AppState) -> Vec<MonitorSummary> {
    join_all(state.monitors.iter().map(|c| summary(c))).await
}

/// Index page listing the monitors.
async fn index_page(State(state): State<AppState>) -> IndexTemplate {
    let monitors = summaries(&state)
        .await
        .iter()
        .map(MonitorRow::from_summary)
        .collect();
    IndexTemplate { monitors }
}

async fn list_monitors(State(state): State<AppState>) -> Json<MonitorListResponse> {
    Json(MonitorListResponse {
        monitors: summaries(&state).await,
    })
}

/// Check if request accepts HTML.
fn accepts_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

fn find_monitor(state: &AppState, id: &str) -> Result<Arc<Coordinator>, AppError> {
    state
        .monitors
        .get(id)
        .cloned()
        .ok_or_else(|| AppError::NotFound {
            message: format!("Unknown monitor: {}", id),
        })
}

/// The board of a monitor, or 503 while there is none.
async fn board_response(coordinator: &Coordinator) -> Result<BoardResponse, AppError> {
    let status = coordinator.status().await;
    let board = coordinator
        .board()
        .await
        .ok_or_else(|| AppError::ServiceUnavailable {
            message: match &status.last_error {
                Some(error) => format!("No departures available: {}", error),
                None => "No departures fetched yet".to_string(),
            },
        })?;

    Ok(BoardResponse {
        id: coordinator.id().to_string(),
        board,
        status,
    })
}

/// A monitor's board as HTML or JSON, depending on `Accept`.
async fn monitor_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let coordinator = find_monitor(&state, &id)?;

    if !accepts_html(&headers) {
        return Ok(Json(board_response(&coordinator).await?).into_response());
    }

    let status = coordinator.status().await;
    let page = match coordinator.board().await {
        Some(board) => {
            BoardTemplate::new(&id, &board, coordinator.delays().await, &status).into_response()
        }
        None => ErrorTemplate {
            title: coordinator.config().await.station_name(),
            message: status
                .last_error
                .unwrap_or_else(|| "No departures fetched yet.".to_string()),
        }
        .into_response(),
    };

    Ok(page)
}

async fn get_monitor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BoardResponse>, AppError> {
    let coordinator = find_monitor(&state, &id)?;
    Ok(Json(board_response(&coordinator).await?))
}

async fn get_delays(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DelaysResponse>, AppError> {
    let coordinator = find_monitor(&state, &id)?;
    let report = coordinator
        .delays()
        .await
        .ok_or_else(|| AppError::ServiceUnavailable {
            message: "No departures fetched yet".to_string(),
        })?;
    Ok(Json(DelaysResponse { id, report }))
}

/// Fetch fresh departures, bypassing the response cache.
async fn refresh_monitor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BoardResponse>, AppError> {
    let coordinator = find_monitor(&state, &id)?;
    if let Some(provider) = state.providers.get(coordinator.provider_id()) {
        provider.invalidate_stop(&coordinator.config().await.stop);
    }
    coordinator.refresh().await?;
    Ok(Json(board_response(&coordinator).await?))
}

/// Change a monitor's options and refresh it.
async fn update_options(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(options): Json<MonitorOptions>,
) -> Result<Json<BoardResponse>, AppError> {
    let coordinator = find_monitor(&state, &id)?;
    coordinator.update_options(&options).await?;
    Ok(Json(board_response(&coordinator).await?))
}

/// Search stops of one provider.
async fn search_stops(
    State(state): State<AppState>,
    Query(req): Query<StopSearchRequest>,
) -> Result<Json<StopSearchResponse>, AppError> {
    let provider = ProviderId::parse(&req.provider).map_err(|e| AppError::BadRequest {
        message: e.to_string(),
    })?;
    let client = state
        .providers
        .get(provider)
        .ok_or_else(|| AppError::NotFound {
            message: format!("Provider not available: {}", provider),
        })?;

    let limit = req.limit.unwrap_or(MAX_SUGGESTIONS).min(50);
    let stops = StopSearch::new(client.as_ref())
        .with_max_results(limit)
        .search(&req.q)
        .await?;

    Ok(Json(StopSearchResponse { provider, stops }))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    ServiceUnavailable { message: String },
}

impl From<ProviderError> for AppError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::NotFound => AppError::NotFound {
                message: e.to_string(),
            },
            ProviderError::MissingStopId { .. } => AppError::BadRequest {
                message: e.to_string(),
            },
            _ => AppError::ServiceUnavailable {
                message: e.to_string(),
            },
        }
    }
}

impl From<MonitorError> for AppError {
    fn from(e: MonitorError) -> Self {
        match e {
            MonitorError::InvalidConfig { .. } => AppError::BadRequest {
                message: e.to_string(),
            },
            MonitorError::RateLimited(_) => AppError::ServiceUnavailable {
                message: e.to_string(),
            },
            MonitorError::Provider(e) => e.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::ServiceUnavailable { message } => (StatusCode::SERVICE_UNAVAILABLE, message),
        };

        if status.is_server_error() {
            tracing::error!(%status, %message, "request failed");
        } else {
            tracing::debug!(%status, %message, "request rejected");
        }

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
