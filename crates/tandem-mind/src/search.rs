//! Internet-search collaborator contract.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tandem_core::error::{Result, TandemError};
use tandem_core::types::SearchHit;

/// Service for looking up external facts.
///
/// Implementations return an ordered result list (possibly empty) or fail
/// with a `Search` error; the orchestrator degrades by skipping the
/// lookup.
pub trait SearchService: Send + Sync {
    /// Run one search.
    ///
    /// # Arguments
    /// * `query` - The lookup query.
    /// * `max_results` - Result cap.
    /// * `include_domains` / `exclude_domains` - Domain filters; empty
    ///   slices mean no restriction.
    fn search(
        &self,
        query: &str,
        max_results: usize,
        include_domains: &[String],
        exclude_domains: &[String],
    ) -> impl Future<Output = Result<Vec<SearchHit>>> + Send;
}

/// One entry of the session-scoped search history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchRecord {
    pub query: String,
    pub result_count: usize,
    pub succeeded: bool,
    pub timestamp: DateTime<Utc>,
}

/// Mock search service with canned hits.
#[derive(Debug, Clone, Default)]
pub struct MockSearch {
    hits: Vec<SearchHit>,
    fail: bool,
}

impl MockSearch {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits, fail: false }
    }

    pub fn failing() -> Self {
        Self {
            hits: vec![],
            fail: true,
        }
    }

    /// An empty but successful search (no relevant results).
    pub fn empty() -> Self {
        Self::default()
    }
}

impl SearchService for MockSearch {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        _include_domains: &[String],
        _exclude_domains: &[String],
    ) -> Result<Vec<SearchHit>> {
        if self.fail {
            return Err(TandemError::Search("provider unavailable".to_string()));
        }
        if query.trim().is_empty() {
            return Err(TandemError::Search("query must not be empty".to_string()));
        }
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(title: &str) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            snippet: format!("snippet for {}", title),
            url: format!("https://example.com/{}", title),
        }
    }

    #[tokio::test]
    async fn test_mock_search_returns_hits_in_order() {
        let search = MockSearch::new(vec![hit("a"), hit("b")]);
        let hits = search.search("query", 5, &[], &[]).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "a");
        assert_eq!(hits[1].title, "b");
    }

    #[tokio::test]
    async fn test_mock_search_caps_results() {
        let search = MockSearch::new(vec![hit("a"), hit("b"), hit("c")]);
        let hits = search.search("query", 2, &[], &[]).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_mock_search_empty_is_ok() {
        let search = MockSearch::empty();
        let hits = search.search("query", 5, &[], &[]).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_mock_search_failure() {
        let search = MockSearch::failing();
        let result = search.search("query", 5, &[], &[]).await;
        assert!(matches!(result, Err(TandemError::Search(_))));
    }

    #[tokio::test]
    async fn test_mock_search_empty_query_rejected() {
        let search = MockSearch::empty();
        let result = search.search("  ", 5, &[], &[]).await;
        assert!(result.is_err());
    }
}
