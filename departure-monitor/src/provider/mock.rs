//! Mock provider for development without network access.
//!
//! Loads stop events from JSON files and serves them as if they were live
//! API responses.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{ProviderId, StopRef};

use super::Provider;
use super::efa::parse_dm_body;
use super::error::ProviderError;
use super::types::{StopEvent, StopSuggestion, place_after_last_comma};

/// Provider that serves stop events from `{stop}.json` files.
///
/// A file is named after the stop it answers for: the stop id
/// (`20018235.json`) or `place - name` (`Hamburg - Jungfernstieg.json`).
/// Its contents are either an EFA departure monitor response or a bare
/// array of stop events.
#[derive(Clone, Debug)]
pub struct MockProvider {
    provider: ProviderId,
    /// Stop events keyed by file stem.
    boards: Arc<HashMap<String, Vec<StopEvent>>>,
}

impl MockProvider {
    /// Create a mock for `provider` by loading every JSON file in `data_dir`.
    pub fn new(provider: ProviderId, data_dir: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let boards = load_boards(data_dir.as_ref())?;
        Ok(Self {
            provider,
            boards: Arc::new(boards),
        })
    }

    /// Stops available in the mock data, sorted.
    pub fn available_stops(&self) -> Vec<String> {
        let mut stops: Vec<String> = self.boards.keys().cloned().collect();
        stops.sort();
        stops
    }
}

fn mock_error(message: String) -> ProviderError {
    ProviderError::MockData(message)
}

fn load_boards(data_dir: &Path) -> Result<HashMap<String, Vec<StopEvent>>, ProviderError> {
    let entries = std::fs::read_dir(data_dir).map_err(|e| {
        mock_error(format!(
            "failed to read mock data directory {}: {e}",
            data_dir.display()
        ))
    })?;

    let mut boards = HashMap::new();
    for entry in entries {
        let path = entry
            .map_err(|e| mock_error(format!("failed to read directory entry: {e}")))?
            .path();
        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }

        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            tracing::warn!(path = %path.display(), "skipping mock file with non-UTF-8 name");
            continue;
        };

        let body = std::fs::read(&path)
            .map_err(|e| mock_error(format!("failed to read {}: {e}", path.display())))?;
        boards.insert(stem.to_string(), parse_board(&body)?);
    }

    if boards.is_empty() {
        return Err(mock_error(format!(
            "no mock board files found in {}",
            data_dir.display()
        )));
    }

    tracing::info!(dir = %data_dir.display(), stops = boards.len(), "loaded mock boards");
    Ok(boards)
}

/// Either a departure monitor response or a bare array of events.
fn parse_board(body: &[u8]) -> Result<Vec<StopEvent>, ProviderError> {
    if body.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'[') {
        let raw: Vec<serde_json::Value> =
            serde_json::from_slice(body).map_err(|e| ProviderError::json(&e, body))?;
        return Ok(raw
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect());
    }
    parse_dm_body(body)
}

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> ProviderId {
        self.provider
    }

    async fn fetch_stop_events(
        &self,
        stop: &StopRef,
        limit: u32,
    ) -> Result<Vec<StopEvent>, ProviderError> {
        let key = stop.to_string();
        let events = self.boards.get(&key).ok_or(ProviderError::NotFound)?;
        Ok(events.iter().take(limit as usize * 3).cloned().collect())
    }

    async fn search_stops(&self, term: &str) -> Result<Vec<StopSuggestion>, ProviderError> {
        let term = term.to_lowercase();
        Ok(self
            .available_stops()
            .into_iter()
            .filter(|stop| stop.to_lowercase().contains(&term))
            .map(|stop| match stop.split_once(" - ") {
                Some((place, name)) => StopSuggestion::new(stop.clone(), name, place),
                None => {
                    let place = place_after_last_comma(&stop).unwrap_or_default().to_string();
                    StopSuggestion::new(stop.clone(), stop.as_str(), place)
                }
            })
            .collect())
    }
}
