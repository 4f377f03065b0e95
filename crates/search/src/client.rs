use std::future::Future;

use anyhow::Result;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::schema::{SearchPlan, SearchResult};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("search query must not be empty")]
    EmptyQuery,
}

/// Anything that can answer a keyword query with ranked results.
pub trait SearchProvider {
    fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<SearchResult>>> + Send;
}

/// Wraps a provider so that provider failures become an empty result set.
pub struct SearchClient<P> {
    provider: P,
    max_results: usize,
}

impl<P: SearchProvider + Sync> SearchClient<P> {
    pub fn new(provider: P, max_results: usize) -> Self {
        Self {
            provider,
            max_results: max_results.max(1),
        }
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Top-N results for `query`. Errors and empty answers both yield an empty list.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        match self.provider.search(query, self.max_results).await {
            Ok(mut results) => {
                results.truncate(self.max_results);
                debug!(query, count = results.len(), "Search returned results");
                Ok(results)
            }
            Err(e) => {
                warn!(query, error = %e, "Search provider failed, continuing without results");
                Ok(Vec::new())
            }
        }
    }

    /// Runs the primary query and, only if it found nothing, the fallback once.
    pub async fn search_with_fallback(
        &self,
        plan: &SearchPlan,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let results = self.search(&plan.primary).await?;
        if !results.is_empty() {
            return Ok(results);
        }

        info!(
            primary = %plan.primary,
            fallback = %plan.fallback,
            "Primary search empty, trying fallback query"
        );
        self.search(&plan.fallback).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replays canned answers keyed by query and records every query it sees.
    struct ScriptedProvider {
        answers: Vec<(&'static str, Result<Vec<SearchResult>, &'static str>)>,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(answers: Vec<(&'static str, Result<Vec<SearchResult>, &'static str>)>) -> Self {
            Self {
                answers,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl SearchProvider for ScriptedProvider {
        async fn search(&self, query: &str, _limit: usize) -> Result<Vec<SearchResult>> {
            self.seen.lock().unwrap().push(query.to_string());
            match self.answers.iter().find(|(q, _)| *q == query) {
                Some((_, Ok(results))) => Ok(results.clone()),
                Some((_, Err(msg))) => Err(anyhow::anyhow!(*msg)),
                None => Ok(Vec::new()),
            }
        }
    }

    fn hits(n: usize) -> Vec<SearchResult> {
        (0..n)
            .map(|i| SearchResult::new(format!("t{i}"), format!("https://e.com/{i}"), format!("s{i}")))
            .collect()
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let client = SearchClient::new(ScriptedProvider::new(vec![]), 5);
        assert_eq!(client.search("   ").await, Err(SearchError::EmptyQuery));
    }

    #[tokio::test]
    async fn test_provider_error_becomes_empty() {
        let provider = ScriptedProvider::new(vec![("acme", Err("rate limited"))]);
        let client = SearchClient::new(provider, 5);
        assert!(client.search("acme").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_results_are_bounded() {
        let provider = ScriptedProvider::new(vec![("acme", Ok(hits(9)))]);
        let client = SearchClient::new(provider, 3);
        let results = client.search("acme").await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].title, "t0");
    }

    #[tokio::test]
    async fn test_fallback_only_when_primary_empty() {
        let provider = ScriptedProvider::new(vec![("primary", Ok(hits(2))), ("fallback", Ok(hits(1)))]);
        let client = SearchClient::new(provider, 5);
        let plan = SearchPlan {
            primary: "primary".into(),
            fallback: "fallback".into(),
        };
        let results = client.search_with_fallback(&plan).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(client.provider.seen(), vec!["primary"]);
    }

    #[tokio::test]
    async fn test_fallback_after_primary_failure() {
        let provider = ScriptedProvider::new(vec![("primary", Err("boom")), ("fallback", Ok(hits(1)))]);
        let client = SearchClient::new(provider, 5);
        let plan = SearchPlan {
            primary: "primary".into(),
            fallback: "fallback".into(),
        };
        let results = client.search_with_fallback(&plan).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(client.provider.seen(), vec!["primary", "fallback"]);
    }
}
