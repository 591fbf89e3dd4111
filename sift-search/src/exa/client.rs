use super::types::{ExaContents, ExaResult, ExaSearchRequest, ExaSearchResponse, ExaTextOptions};
use crate::normalize::{FALLBACK_CHARS, PREVIEW_CHARS, preview};
use crate::{MISSING_API_KEY, SearchOutcome, SearchProvider};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::header::{HeaderName, HeaderValue};
use sift_common::ProviderKind;
use sift_common::model::SearchResult;
use sift_http::{Auth, HttpClient, HttpError, RequestOpts};
use sift_llm::traits::LlmClient;
use std::sync::Arc;
use std::time::Instant;

pub const EXA_API_BASE: &str = "https://api.exa.ai/";

const NO_RESULTS: &str = "No results found";
/// Shorter pages are passed through as-is instead of summarized.
const MIN_SUMMARY_CHARS: usize = 100;
const MAX_TEXT_CHARS: u32 = 8000;

/// Broad web search over Exa, returning full page text.
///
/// With a summarizer attached, each sufficiently long page is condensed for
/// the query; otherwise content is a bounded preview of the page text.
#[derive(Clone)]
pub struct ExaSearch {
    http: HttpClient,
    api_key: Option<String>,
    num_results: u32,
    summarizer: Option<Arc<dyn LlmClient>>,
}

impl ExaSearch {
    pub fn new(api_key: Option<String>, base_url: Option<&str>) -> Result<Self, HttpError> {
        let http = HttpClient::new(base_url.unwrap_or(EXA_API_BASE))?;
        Ok(Self {
            http,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            num_results: 3,
            summarizer: None,
        })
    }

    pub fn with_num_results(mut self, n: u32) -> Self {
        self.num_results = n.max(1);
        self
    }

    pub fn with_summarizer(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.summarizer = Some(llm);
        self
    }

    async fn fetch(
        &self,
        api_key: &str,
        query: &str,
        num_results: u32,
    ) -> Result<Vec<ExaResult>, HttpError> {
        let body = ExaSearchRequest {
            query,
            num_results,
            kind: "auto",
            contents: ExaContents {
                text: ExaTextOptions {
                    max_characters: MAX_TEXT_CHARS,
                },
            },
        };
        let opts = RequestOpts {
            auth: Some(Auth::Header {
                name: HeaderName::from_static("x-api-key"),
                value: HeaderValue::from_str(api_key.trim())
                    .map_err(|e| HttpError::Build(e.to_string()))?,
            }),
            retries: Some(1),
            ..Default::default()
        };
        let resp: ExaSearchResponse = self.http.post_json_opts("search", &body, opts).await?;
        tracing::debug!(
            target: "search.exa",
            request_id = resp.request_id.as_deref().unwrap_or("-"),
            count = resp.results.len(),
            "exa.search.response"
        );
        Ok(resp.results)
    }

    async fn run(&self, query: &str, num_results: u32, summarize: bool) -> SearchOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!(target: "search.exa", "exa.search.missing_key");
            return SearchOutcome::failed(self.name(), self.kind(), MISSING_API_KEY);
        };

        let started = Instant::now();
        tracing::info!(target: "search.exa", %query, num_results, summarize, "exa.search.start");

        let results = match self.fetch(api_key, query, num_results).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(
                    target: "search.exa",
                    %query,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "exa.search.error"
                );
                return SearchOutcome::failed(self.name(), self.kind(), e.to_string());
            }
        };
        if results.is_empty() {
            tracing::info!(target: "search.exa", %query, "exa.search.empty");
            return SearchOutcome::failed(self.name(), self.kind(), NO_RESULTS);
        }

        let summarizer = if summarize { self.summarizer.as_deref() } else { None };
        let normalized =
            join_all(results.iter().map(|r| self.normalize(query, r, summarizer))).await;

        tracing::info!(
            target: "search.exa",
            %query,
            count = normalized.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "exa.search.done"
        );
        SearchOutcome::ok(self.name(), self.kind(), normalized)
    }

    /// Pages without text keep empty content so later providers and hydration
    /// can fill them.
    async fn normalize(
        &self,
        query: &str,
        r: &ExaResult,
        summarizer: Option<&dyn LlmClient>,
    ) -> SearchResult {
        let mut out = SearchResult::with_url(r.url.clone());
        if let Some(title) = r.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            out = out.title(title);
        }

        let text = r.text.as_deref().filter(|t| !t.trim().is_empty());
        let content = match (text, summarizer) {
            (None, _) => String::new(),
            (Some(text), None) => preview(text, PREVIEW_CHARS),
            (Some(text), Some(_)) if text.chars().count() < MIN_SUMMARY_CHARS => text.to_string(),
            (Some(text), Some(llm)) => {
                match llm
                    .summarize_page(query, r.title.as_deref(), &r.url, text)
                    .await
                {
                    Ok(summary) => summary,
                    Err(e) => {
                        tracing::warn!(
                            target: "search.exa",
                            url = %r.url,
                            error = %e,
                            "exa.summarize.error"
                        );
                        format!("{}...", preview(text, FALLBACK_CHARS))
                    }
                }
            }
        };
        out.content(content)
    }
}

#[async_trait]
impl SearchProvider for ExaSearch {
    fn name(&self) -> &str {
        "exa"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Broad
    }

    async fn search(&self, query: &str) -> SearchOutcome {
        self.run(query, self.num_results, true).await
    }

    async fn recover(&self, url: &str) -> SearchOutcome {
        self.run(url, 1, false).await
    }
}
