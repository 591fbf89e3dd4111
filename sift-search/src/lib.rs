//! Search adapters that feed the research pipeline.
//!
//! - Exa web search with optional per-page summarization (`exa`)
//! - Search-grounded model answers from OpenAI or xAI (`grounded`)
//! - Loose-source and free-text normalization shared by both (`normalize`)
//!
//! Every adapter implements [`SearchProvider`] and reports failures inside the
//! returned [`SearchOutcome`] instead of as an `Err`, so one broken backend
//! never aborts a fan-out.

pub mod exa;
pub mod grounded;
pub mod normalize;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sift_common::ProviderKind;
use sift_common::model::SearchResult;

pub use exa::ExaSearch;
pub use grounded::GroundedSearchProvider;

/// Error reported by adapters whose credentials are not configured.
pub const MISSING_API_KEY: &str = "Missing API key";

/// Normalized output of one adapter call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub provider: String,
    pub kind: ProviderKind,
    pub results: Vec<SearchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchOutcome {
    pub fn ok(provider: impl Into<String>, kind: ProviderKind, results: Vec<SearchResult>) -> Self {
        Self {
            provider: provider.into(),
            kind,
            results,
            error: None,
        }
    }

    pub fn failed(
        provider: impl Into<String>,
        kind: ProviderKind,
        error: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            kind,
            results: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A web-search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Stable adapter name; breaks precedence ties in the merger.
    fn name(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    /// Run a search. Never fails; errors are carried in the outcome.
    async fn search(&self, query: &str) -> SearchOutcome;

    /// Single-result fetch for one URL, used to fill in thin records.
    async fn recover(&self, url: &str) -> SearchOutcome {
        self.search(url).await
    }
}
