//! Stop search for autocomplete.

use crate::provider::{Provider, ProviderError, StopSuggestion};

/// Terms shorter than this are not sent to the provider.
pub const MIN_TERM_CHARS: usize = 3;

/// Suggestions returned per search.
pub const MAX_SUGGESTIONS: usize = 10;

/// Stop search over one provider.
pub struct StopSearch<'a> {
    provider: &'a dyn Provider,
    max_results: usize,
}

impl<'a> StopSearch<'a> {
    pub fn new(provider: &'a dyn Provider) -> Self {
        Self {
            provider,
            max_results: MAX_SUGGESTIONS,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Search stops whose name matches `term`.
    ///
    /// Short terms return nothing without a request. Locations that are not
    /// stops (addresses, POIs) are dropped when the provider reports a kind.
    pub async fn search(&self, term: &str) -> Result<Vec<StopSuggestion>, ProviderError> {
        let term = term.trim();
        if term.chars().count() < MIN_TERM_CHARS {
            return Ok(Vec::new());
        }

        let suggestions = self.provider.search_stops(term).await?;
        let found = suggestions.len();
        let stops: Vec<StopSuggestion> = suggestions
            .into_iter()
            .filter(|s| s.area_type.as_deref().is_none_or(|t| t == "stop"))
            .take(self.max_results)
            .collect();

        tracing::debug!(
            provider = %self.provider.id(),
            term,
            found,
            returned = stops.len(),
            "stop search"
        );
        Ok(stops)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::domain::{ProviderId, StopRef};
    use crate::provider::StopEvent;

    struct Fixed {
        calls: AtomicUsize,
        results: Vec<StopSuggestion>,
    }

    #[async_trait]
    impl Provider for Fixed {
        fn id(&self) -> ProviderId {
            ProviderId::Vrr
        }

        async fn fetch_stop_events(
            &self,
            _stop: &StopRef,
            _limit: u32,
        ) -> Result<Vec<StopEvent>, ProviderError> {
            Ok(Vec::new())
        }

        async fn search_stops(&self, _term: &str) -> Result<Vec<StopSuggestion>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.results.clone())
        }
    }

    fn suggestion(id: &str, area_type: Option<&str>) -> StopSuggestion {
        StopSuggestion::new(id, format!("Stop {id}"), "Düsseldorf")
            .with_area_type(area_type.map(str::to_string))
    }

    #[tokio::test]
    async fn short_terms_skip_the_provider() {
        let provider = Fixed {
            calls: AtomicUsize::new(0),
            results: vec![suggestion("1", None)],
        };
        let search = StopSearch::new(&provider);

        assert!(search.search("ab").await.unwrap().is_empty());
        assert!(search.search("  ab  ").await.unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

        // Counted in characters, not bytes
        assert_eq!(search.search("Düs").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn keeps_stops_and_untyped_locations() {
        let provider = Fixed {
            calls: AtomicUsize::new(0),
            results: vec![
                suggestion("1", Some("stop")),
                suggestion("2", Some("poi")),
                suggestion("3", None),
                suggestion("4", Some("address")),
            ],
        };
        let ids: Vec<String> = StopSearch::new(&provider)
            .search("Stop")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, ["1", "3"]);
    }

    #[tokio::test]
    async fn truncates_results() {
        let provider = Fixed {
            calls: AtomicUsize::new(0),
            results: (0..25).map(|i| suggestion(&i.to_string(), Some("stop"))).collect(),
        };
        let results = StopSearch::new(&provider).search("Stop").await.unwrap();
        assert_eq!(results.len(), MAX_SUGGESTIONS);

        let results = StopSearch::new(&provider)
            .with_max_results(3)
            .search("Stop")
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn display_names() {
        let provider = Fixed {
            calls: AtomicUsize::new(0),
            results: vec![
                StopSuggestion::new("1", "Hauptbahnhof", "Düsseldorf"),
                StopSuggestion::new("2", "Düsseldorf Hbf", "Düsseldorf"),
            ],
        };
        let results = StopSearch::new(&provider).search("bahnhof").await.unwrap();
        assert_eq!(results[0].display_name, "Düsseldorf - Hauptbahnhof");
        assert_eq!(results[1].display_name, "Düsseldorf Hbf");
    }
}
