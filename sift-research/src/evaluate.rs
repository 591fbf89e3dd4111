//! Relevance judgment for merged records.
//!
//! Configured fast-path rules are checked first; everything else goes to a
//! [`Judge`]. A judge error or timeout never propagates: the record is kept
//! and marked irrelevant with [`EVALUATION_ERROR_REASON`].
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use sift_common::model::{EvaluatedResult, MergedResult};
use sift_common::Result;
use sift_config::FastPathRule;
use sift_llm::generate_structured;
use sift_llm::traits::LlmClient;
use std::sync::Arc;
use std::time::Duration;

pub const EVALUATION_ERROR_REASON: &str = "Error in evaluation";
pub const PROFILE_REASON: &str = "Official profile matches the person in the query";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Judgment {
    pub is_relevant: bool,
    #[serde(default)]
    pub reason: String,
}

#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(&self, query: &str, record: &MergedResult) -> Result<Judgment>;
}

/// Judge backed by a language model that must answer with JSON.
pub struct LlmJudge {
    llm: Arc<dyn LlmClient>,
    excerpt_chars: usize,
}

impl LlmJudge {
    pub fn new(llm: Arc<dyn LlmClient>, excerpt_chars: usize) -> Self {
        Self { llm, excerpt_chars }
    }

    fn prompt(&self, query: &str, record: &MergedResult) -> String {
        let excerpt: String = record.content.chars().take(self.excerpt_chars).collect();
        format!(
            "Evaluate whether this search result is relevant and will help answer the query: \"{query}\".\n\n\
             Search result:\n\
             Title: {title}\n\
             URL: {url}\n\
             Content snippet: {excerpt}...\n\n\
             Respond with a JSON object containing:\n\
             - isRelevant: boolean indicating if the result is relevant\n\
             - reason: brief explanation of your decision",
            title = record.title.as_deref().unwrap_or(""),
            url = record.url,
        )
    }
}

#[async_trait]
impl Judge for LlmJudge {
    async fn judge(&self, query: &str, record: &MergedResult) -> Result<Judgment> {
        let system = "You judge whether web search results help answer a research query. \
                      Reply with JSON only.";
        let prompt = self.prompt(query, record);
        generate_structured(self.llm.as_ref(), &prompt, Some(system), Some(200)).await
    }
}

/// First configured rule that marks `record` relevant, if any.
pub fn fast_path(rules: &[FastPathRule], query: &str, record: &MergedResult) -> Option<Judgment> {
    let q = query.to_lowercase();
    let url = record.url.to_lowercase();

    rules.iter().find_map(|rule| match rule {
        FastPathRule::Profile { url_marker, names } => {
            let names: Vec<String> = names
                .iter()
                .map(|n| n.trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect();
            let matched = !names.is_empty()
                && url.contains(&url_marker.to_lowercase())
                && names.iter().all(|n| q.contains(n.as_str()) && url.contains(n.as_str()));
            matched.then(|| Judgment {
                is_relevant: true,
                reason: PROFILE_REASON.to_string(),
            })
        }
        FastPathRule::OfficialSource { term, domain } => {
            let t = term.trim().to_lowercase();
            if t.is_empty() || !q.contains(&t) {
                return None;
            }
            let domain = domain.trim().to_lowercase();
            let hit = (!domain.is_empty() && url.contains(&domain))
                || record.title.as_deref().is_some_and(|title| title.to_lowercase().contains(&t))
                || record.content.to_lowercase().contains(&t);
            hit.then(|| Judgment {
                is_relevant: true,
                reason: format!(
                    "Official/company source matches {} mentioned in the query",
                    term.trim()
                ),
            })
        }
    })
}

pub struct RelevanceEvaluator {
    judge: Arc<dyn Judge>,
    rules: Vec<FastPathRule>,
    concurrency: usize,
    timeout: Duration,
}

impl RelevanceEvaluator {
    pub fn new(
        judge: Arc<dyn Judge>,
        rules: Vec<FastPathRule>,
        concurrency: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            judge,
            rules,
            concurrency: concurrency.max(1),
            timeout,
        }
    }

    /// Judge every record with bounded parallelism; output order matches input.
    pub async fn evaluate(&self, query: &str, corpus: Vec<MergedResult>) -> Vec<EvaluatedResult> {
        let total = corpus.len();
        let evaluated: Vec<EvaluatedResult> = stream::iter(corpus)
            .map(|record| self.evaluate_one(query, record))
            .buffered(self.concurrency)
            .collect()
            .await;
        tracing::info!(
            total,
            relevant = evaluated.iter().filter(|e| e.is_relevant).count(),
            "pipeline.evaluate.done"
        );
        evaluated
    }

    async fn evaluate_one(&self, query: &str, record: MergedResult) -> EvaluatedResult {
        if let Some(j) = fast_path(&self.rules, query, &record) {
            tracing::debug!(url = %record.url, "pipeline.evaluate.fast_path");
            return EvaluatedResult::new(record, j.is_relevant, j.reason);
        }
        match tokio::time::timeout(self.timeout, self.judge.judge(query, &record)).await {
            Ok(Ok(j)) => EvaluatedResult::new(record, j.is_relevant, j.reason),
            Ok(Err(e)) => {
                tracing::warn!(url = %record.url, error = %e, "pipeline.evaluate.error");
                EvaluatedResult::new(record, false, EVALUATION_ERROR_REASON)
            }
            Err(_) => {
                tracing::warn!(url = %record.url, "pipeline.evaluate.timeout");
                EvaluatedResult::new(record, false, EVALUATION_ERROR_REASON)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_common::SiftError;

    fn profile_rule() -> FastPathRule {
        FastPathRule::Profile {
            url_marker: "linkedin.com/in".into(),
            names: vec!["david".into(), "chang".into()],
        }
    }

    fn official_rule() -> FastPathRule {
        FastPathRule::OfficialSource {
            term: "MindWorks".into(),
            domain: "mindworks.vc".into(),
        }
    }

    #[test]
    fn profile_rule_needs_names_in_query_and_url() {
        let rules = [profile_rule()];
        let hit = MergedResult::new("https://www.linkedin.com/in/david-chang-123", "");
        let j = fast_path(&rules, "Who is David Chang?", &hit).unwrap();
        assert_eq!(j.reason, PROFILE_REASON);

        let other_person = MergedResult::new("https://www.linkedin.com/in/jane-doe", "");
        assert!(fast_path(&rules, "Who is David Chang?", &other_person).is_none());
        assert!(fast_path(&rules, "Who is Jane Doe?", &hit).is_none());
        let not_profile = MergedResult::new("https://davidchang.com", "");
        assert!(fast_path(&rules, "david chang", &not_profile).is_none());
    }

    #[test]
    fn official_source_matches_domain_or_text() {
        let rules = [official_rule()];
        let by_domain = MergedResult::new("https://mindworks.vc/team", "");
        let j = fast_path(&rules, "mindworks portfolio", &by_domain).unwrap();
        assert_eq!(j.reason, "Official/company source matches MindWorks mentioned in the query");

        let by_content = MergedResult::new("https://news.dev/a", "MindWorks raised a fund");
        assert!(fast_path(&rules, "What does MindWorks invest in", &by_content).is_some());
        assert!(fast_path(&rules, "unrelated query", &by_domain).is_none());
    }

    struct Flaky;

    #[async_trait]
    impl Judge for Flaky {
        async fn judge(&self, _query: &str, record: &MergedResult) -> Result<Judgment> {
            if record.url.contains("bad") {
                return Err(SiftError::Parse("not json".into()));
            }
            if record.url.contains("slow") {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok(Judgment {
                is_relevant: true,
                reason: format!("judged {}", record.url),
            })
        }
    }

    #[tokio::test]
    async fn errors_and_timeouts_become_irrelevant_in_order() {
        let evaluator =
            RelevanceEvaluator::new(Arc::new(Flaky), vec![], 2, Duration::from_millis(100));
        let corpus = vec![
            MergedResult::new("https://slow.dev", "x"),
            MergedResult::new("https://good.dev", "x"),
            MergedResult::new("https://bad.dev", "x"),
        ];
        let out = evaluator.evaluate("q", corpus).await;
        let urls: Vec<_> = out.iter().map(|e| e.url()).collect();
        assert_eq!(urls, vec!["https://slow.dev", "https://good.dev", "https://bad.dev"]);
        assert!(!out[0].is_relevant);
        assert_eq!(out[0].reason, EVALUATION_ERROR_REASON);
        assert!(out[1].is_relevant);
        assert_eq!(out[2].reason, EVALUATION_ERROR_REASON);
    }

    #[tokio::test]
    async fn fast_path_skips_the_judge() {
        let evaluator = RelevanceEvaluator::new(
            Arc::new(Flaky),
            vec![official_rule()],
            4,
            Duration::from_secs(1),
        );
        let out = evaluator
            .evaluate("mindworks", vec![MergedResult::new("https://bad.mindworks.vc", "")])
            .await;
        assert!(out[0].is_relevant);
    }
}
