//! Adapter over search-grounded model answers (OpenAI web search, xAI Live
//! Search).
use crate::normalize::grounded_results;
use crate::{MISSING_API_KEY, SearchOutcome, SearchProvider};
use async_trait::async_trait;
use sift_common::ProviderKind;
use sift_llm::GroundedSearch;
use std::sync::Arc;
use std::time::Instant;

pub struct GroundedSearchProvider {
    name: String,
    kind: ProviderKind,
    backend: Option<Arc<dyn GroundedSearch>>,
}

impl GroundedSearchProvider {
    /// `backend = None` yields an adapter that reports a missing key on every
    /// call.
    pub fn new(
        name: impl Into<String>,
        kind: ProviderKind,
        backend: Option<Arc<dyn GroundedSearch>>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            backend,
        }
    }
}

#[async_trait]
impl SearchProvider for GroundedSearchProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn search(&self, query: &str) -> SearchOutcome {
        let Some(backend) = &self.backend else {
            tracing::warn!(
                target: "search.grounded",
                provider = %self.name,
                "grounded.search.missing_key"
            );
            return SearchOutcome::failed(&self.name, self.kind, MISSING_API_KEY);
        };

        let started = Instant::now();
        match backend.grounded_search(query).await {
            Ok(answer) => {
                let results = grounded_results(&answer);
                tracing::info!(
                    target: "search.grounded",
                    provider = %self.name,
                    model = backend.model_name(),
                    sources = answer.sources.len(),
                    count = results.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "grounded.search.done"
                );
                SearchOutcome::ok(&self.name, self.kind, results)
            }
            Err(e) => {
                tracing::warn!(
                    target: "search.grounded",
                    provider = %self.name,
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "grounded.search.error"
                );
                SearchOutcome::failed(&self.name, self.kind, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sift_common::{Result, SiftError};
    use sift_llm::GroundedAnswer;

    struct Canned(Option<GroundedAnswer>);

    #[async_trait]
    impl GroundedSearch for Canned {
        async fn grounded_search(&self, _query: &str) -> Result<GroundedAnswer> {
            self.0
                .clone()
                .ok_or_else(|| SiftError::Http("server returned error 500".into()))
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    #[tokio::test]
    async fn missing_backend_reports_missing_key() {
        let p = GroundedSearchProvider::new("openai", ProviderKind::ModelNative, None);
        let out = p.search("rust").await;
        assert!(out.results.is_empty());
        assert_eq!(out.error.as_deref(), Some(MISSING_API_KEY));
        assert_eq!(out.kind, ProviderKind::ModelNative);
    }

    #[tokio::test]
    async fn backend_errors_become_error_outcomes() {
        let p =
            GroundedSearchProvider::new("xai", ProviderKind::Live, Some(Arc::new(Canned(None))));
        let out = p.search("rust").await;
        assert!(out.is_error());
        assert!(out.error.unwrap().contains("500"));
    }

    #[tokio::test]
    async fn sources_are_normalized() {
        let answer = GroundedAnswer {
            text: "answer".into(),
            sources: vec![
                json!({"url": "https://a.dev", "title": "A"}),
                json!({"snippet": "no url"}),
            ],
        };
        let p = GroundedSearchProvider::new(
            "openai",
            ProviderKind::ModelNative,
            Some(Arc::new(Canned(Some(answer)))),
        );
        let out = p.search("rust").await;
        assert_eq!(out.error, None);
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.results[0].title.as_deref(), Some("A"));
    }
}
