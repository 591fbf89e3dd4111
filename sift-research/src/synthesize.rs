//! Cited report generation.
//!
//! Records are numbered `1..=N` for one call, the model is told to cite only
//! those indices, and the citations are then re-extracted from its output and
//! clamped to the valid range. The returned source list is exactly the set of
//! cited indices.
use regex::Regex;
use serde::{Deserialize, Serialize};
use sift_common::model::{EvaluatedResult, NumberedSource, SourceRef};
use sift_common::SiftError;
use sift_llm::traits::LlmClient;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

const REPORT_SYSTEM_PROMPT: &str = "You are an expert research summarizer.

Given a user query and a set of numbered web sources (title, url, content), produce a complete, accurate and concise report that:
- Focuses strictly on information relevant to the user query
- Removes duplicate and redundant points
- Synthesizes across sources to form a coherent narrative
- Uses inline citations like [1], [2] that correspond to the numbered sources
- Includes only well-supported facts; avoid speculation unless clearly labeled

Report structure (Markdown):
1) Executive Summary (2-4 bullets with the most important findings)
2) Key Findings (bullets with inline citations [n] after claims)
3) Analysis & Implications
4) Sources (numbered list \"[n] Title - URL\")

Do not invent data. If something is unknown, say so.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub report: String,
    pub citations: Vec<usize>,
    pub sources: Vec<SourceRef>,
}

impl Report {
    pub fn failed(err: &SiftError) -> Self {
        Self {
            report: format!("Failed to generate report: {err}"),
            citations: Vec::new(),
            sources: Vec::new(),
        }
    }
}

/// Number records `1..=N`, dropping those without a URL, capped at `max`.
pub fn number_sources(results: &[EvaluatedResult], max: usize) -> Vec<NumberedSource> {
    results
        .iter()
        .filter(|r| !r.url().trim().is_empty())
        .take(max)
        .enumerate()
        .map(|(i, r)| NumberedSource {
            index: i + 1,
            title: r.result.title.clone(),
            url: r.result.url.clone(),
            content: r.result.content.clone(),
            is_relevant: r.is_relevant,
        })
        .collect()
}

/// Distinct `[n]` markers with `1 <= n <= max_index`, ascending.
pub fn extract_citations(text: &str, max_index: usize) -> Vec<usize> {
    let Ok(re) = Regex::new(r"\[(\d+)\]") else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().parse::<usize>().ok())
        .filter(|n| (1..=max_index).contains(n))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub struct CitationSynthesizer {
    llm: Arc<dyn LlmClient>,
    max_sources: usize,
    timeout: Duration,
}

impl CitationSynthesizer {
    pub fn new(llm: Arc<dyn LlmClient>, max_sources: usize, timeout: Duration) -> Self {
        Self {
            llm,
            max_sources,
            timeout,
        }
    }

    fn prompt(query: &str, sources: &[NumberedSource]) -> Result<String, SiftError> {
        let json = serde_json::to_string(sources).map_err(|e| SiftError::Parse(e.to_string()))?;
        Ok(format!(
            "User query: {query}\n\n\
             You are given NUMBERED sources (JSON). Synthesize the report only from these sources, \
             preferring sources with isRelevant = true.\n\n\
             STRICT CITATION RULES:\n\
             - Use inline numeric citations [n] where n corresponds EXACTLY to the provided source index.\n\
             - Only cite indices from the list below.\n\
             - End with a Sources section listing [n] Title - URL for the sources you used.\n\n\
             Numbered Sources (JSON):\n{json}"
        ))
    }

    /// Never fails; a generation error yields a degraded report with no
    /// citations.
    pub async fn synthesize(&self, query: &str, results: &[EvaluatedResult]) -> Report {
        let sources = number_sources(results, self.max_sources);
        match self.generate(query, &sources).await {
            Ok(text) => {
                let citations = extract_citations(&text, sources.len());
                let used: Vec<SourceRef> = sources
                    .iter()
                    .filter(|s| citations.binary_search(&s.index).is_ok())
                    .map(SourceRef::from)
                    .collect();
                tracing::info!(
                    numbered = sources.len(),
                    cited = citations.len(),
                    report_len = text.len(),
                    "report.synthesize.done"
                );
                Report {
                    report: text,
                    citations,
                    sources: used,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "report.synthesize.error");
                Report::failed(&e)
            }
        }
    }

    async fn generate(&self, query: &str, sources: &[NumberedSource]) -> Result<String, SiftError> {
        let prompt = Self::prompt(query, sources)?;
        let response = tokio::time::timeout(
            self.timeout,
            self.llm
                .generate(&prompt, Some(REPORT_SYSTEM_PROMPT), Some(2000), Some(0.3)),
        )
        .await
        .map_err(|_| SiftError::Timeout)??;
        Ok(response.text)
    }
}
