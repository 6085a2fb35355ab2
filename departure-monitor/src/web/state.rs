//! Application state for the web layer.

use std::sync::Arc;

use crate::monitor::Monitors;
use crate::registry::ProviderRegistry;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Configured monitors
    pub monitors: Arc<Monitors>,

    /// Cached providers, for stop search and cache invalidation
    pub providers: Arc<ProviderRegistry>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(monitors: Monitors, providers: Arc<ProviderRegistry>) -> Self {
        Self {
            monitors: Arc::new(monitors),
            providers,
        }
    }
}
