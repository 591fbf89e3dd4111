//! Research records as they move through the pipeline.
//!
//! `SearchResult` is what an adapter produces, `MergedResult` is the
//! URL-deduplicated record, `EvaluatedResult` carries the relevance verdict,
//! and `ResearchData` is the value persisted across suspend points. JSON field
//! names are camelCase (`searchResults`, `isRelevant`, ...) so snapshots stay
//! readable by other tooling.
use serde::{Deserialize, Serialize};

/// A record normalized from one search adapter.
///
/// ```
/// use sift_common::model::SearchResult;
///
/// let r = SearchResult::with_url("https://x.com").content("  ");
/// assert!(!r.has_content());
/// assert_eq!(r.usable_url(), Some("https://x.com"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl SearchResult {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// The trimmed URL, or `None` when the record cannot be keyed.
    pub fn usable_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    pub fn has_content(&self) -> bool {
        self.content
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty())
    }
}

/// One record per URL after merging every adapter's output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub url: String,
    #[serde(default)]
    pub content: String,
}

impl MergedResult {
    pub fn new(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: None,
            url: url.into(),
            content: content.into(),
        }
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    /// Character count of the trimmed content.
    pub fn content_chars(&self) -> usize {
        self.content.trim().chars().count()
    }
}

/// A merged record plus the relevance verdict for the research query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatedResult {
    #[serde(flatten)]
    pub result: MergedResult,
    pub is_relevant: bool,
    #[serde(default)]
    pub reason: String,
}

impl EvaluatedResult {
    pub fn new(result: MergedResult, is_relevant: bool, reason: impl Into<String>) -> Self {
        Self {
            result,
            is_relevant,
            reason: reason.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.result.url
    }
}

/// A fact extracted from a relevant record, with questions worth a second pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Learning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning: Option<String>,
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    #[serde(rename = "initial")]
    Initial,
    #[serde(rename = "follow-up")]
    FollowUp,
}

/// Everything one research iteration produced.
///
/// ```
/// use sift_common::model::{Phase, ResearchData};
///
/// let data = ResearchData::initial("rust async", Vec::new());
/// assert_eq!(data.queries, vec!["rust async".to_string()]);
/// assert_eq!(data.phase, Phase::Initial);
/// let json = serde_json::to_value(&data).unwrap();
/// assert!(json.get("completedQueries").is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchData {
    #[serde(default)]
    pub queries: Vec<String>,
    #[serde(default)]
    pub search_results: Vec<EvaluatedResult>,
    #[serde(default)]
    pub learnings: Vec<Learning>,
    #[serde(default)]
    pub completed_queries: Vec<String>,
    #[serde(default)]
    pub phase: Phase,
}

impl ResearchData {
    /// Single-query research with no learnings, as produced by one pipeline pass.
    pub fn initial(query: &str, search_results: Vec<EvaluatedResult>) -> Self {
        Self {
            queries: vec![query.to_string()],
            search_results,
            learnings: Vec::new(),
            completed_queries: vec![query.to_string()],
            phase: Phase::Initial,
        }
    }

    pub fn relevant_count(&self) -> usize {
        self.search_results.iter().filter(|r| r.is_relevant).count()
    }
}

/// Citation-indexed view of an evaluated record, scoped to one synthesis call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberedSource {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub url: String,
    pub content: String,
    pub is_relevant: bool,
}

/// A cited source as returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub url: String,
}

impl From<&NumberedSource> for SourceRef {
    fn from(s: &NumberedSource) -> Self {
        Self {
            index: s.index,
            title: s.title.clone(),
            url: s.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn evaluated_result_flattens_merged_fields() {
        let e = EvaluatedResult::new(
            MergedResult::new("https://a.dev", "body"),
            true,
            "on topic",
        );
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(
            v,
            json!({
                "url": "https://a.dev",
                "content": "body",
                "isRelevant": true,
                "reason": "on topic"
            })
        );
    }

    #[test]
    fn phase_uses_hyphenated_wire_name() {
        let v = serde_json::to_value(Phase::FollowUp).unwrap();
        assert_eq!(v, json!("follow-up"));
        let back: Phase = serde_json::from_value(json!("initial")).unwrap();
        assert_eq!(back, Phase::Initial);
    }

    #[test]
    fn blank_url_is_not_usable() {
        assert_eq!(SearchResult::with_url("   ").usable_url(), None);
        assert_eq!(SearchResult::default().usable_url(), None);
    }
}
