//! URL-keyed merge of adapter outcomes.
//!
//! Outcomes are visited in precedence order (by provider kind, then provider
//! name), never in completion order, so the merged corpus is the same however
//! the fan-out finished. A URL keeps the first record seen for it, except that
//! blank content is replaced by the first later non-blank content (taking that
//! record's title when it has one), and a missing title is taken from the first
//! later record that has one.
use sift_common::model::MergedResult;
use sift_common::ProviderKind;
use sift_search::SearchOutcome;
use std::collections::HashMap;

pub struct Merger {
    precedence: Vec<ProviderKind>,
    max_corpus: usize,
}

impl Merger {
    pub fn new(precedence: Vec<ProviderKind>, max_corpus: usize) -> Self {
        Self {
            precedence,
            max_corpus,
        }
    }

    /// Kinds missing from the configured order sort after all listed kinds.
    fn rank(&self, kind: ProviderKind) -> usize {
        self.precedence
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(self.precedence.len())
    }

    pub fn merge(&self, outcomes: &[SearchOutcome]) -> Vec<MergedResult> {
        let mut ordered: Vec<&SearchOutcome> = outcomes.iter().collect();
        ordered.sort_by(|a, b| {
            self.rank(a.kind)
                .cmp(&self.rank(b.kind))
                .then_with(|| a.provider.cmp(&b.provider))
        });

        let mut index: HashMap<String, usize> = HashMap::new();
        let mut merged: Vec<MergedResult> = Vec::new();
        let mut dropped = 0usize;

        for outcome in ordered {
            for result in &outcome.results {
                let Some(url) = result.usable_url() else {
                    dropped += 1;
                    continue;
                };
                let content = result.content.as_deref().unwrap_or_default();
                let title = result
                    .title
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty());

                match index.get(url) {
                    Some(&i) => {
                        let existing = &mut merged[i];
                        if !existing.has_content() && !content.trim().is_empty() {
                            existing.content = content.to_string();
                            if let Some(title) = title {
                                existing.title = Some(title.to_string());
                            }
                        } else if existing.title.is_none() {
                            existing.title = title.map(str::to_string);
                        }
                    }
                    None => {
                        index.insert(url.to_string(), merged.len());
                        merged.push(MergedResult {
                            title: title.map(str::to_string),
                            url: url.to_string(),
                            content: content.to_string(),
                        });
                    }
                }
            }
        }

        let distinct = merged.len();
        merged.truncate(self.max_corpus);
        tracing::info!(
            distinct,
            kept = merged.len(),
            dropped_without_url = dropped,
            "pipeline.merge.done"
        );
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_common::model::SearchResult;

    fn outcome(provider: &str, kind: ProviderKind, results: Vec<SearchResult>) -> SearchOutcome {
        SearchOutcome::ok(provider, kind, results)
    }

    fn merger() -> Merger {
        Merger::new(ProviderKind::default_precedence(), 20)
    }

    #[test]
    fn blank_content_is_filled_by_later_provider() {
        let outcomes = vec![
            outcome(
                "openai",
                ProviderKind::ModelNative,
                vec![SearchResult::with_url("https://x.com").title("X").content("")],
            ),
            outcome(
                "xai",
                ProviderKind::Live,
                vec![SearchResult::with_url("https://x.com").content("full text")],
            ),
        ];
        let merged = merger().merge(&outcomes);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].content, "full text");
        assert_eq!(merged[0].title.as_deref(), Some("X"));
    }

    #[test]
    fn later_titles_only_fill_a_missing_title() {
        let outcomes = vec![
            outcome(
                "exa",
                ProviderKind::Broad,
                vec![
                    SearchResult::with_url("https://a.dev").content("exa text"),
                    SearchResult::with_url("https://b.dev").title("Exa B").content("exa b"),
                ],
            ),
            outcome(
                "xai",
                ProviderKind::Live,
                vec![
                    SearchResult::with_url("https://a.dev").title("  ").content("x"),
                    SearchResult::with_url("https://b.dev").title("Xai B").content("x"),
                ],
            ),
            outcome(
                "openai",
                ProviderKind::ModelNative,
                vec![SearchResult::with_url("https://a.dev").title("OpenAI A").content("")],
            ),
        ];
        let merged = merger().merge(&outcomes);
        assert_eq!(merged[0].title.as_deref(), Some("OpenAI A"));
        assert_eq!(merged[0].content, "exa text");
        assert_eq!(merged[1].title.as_deref(), Some("Exa B"));
        assert_eq!(merged[1].content, "exa b");
    }

    #[test]
    fn first_nonblank_content_wins_in_precedence_order() {
        let broad = outcome(
            "exa",
            ProviderKind::Broad,
            vec![SearchResult::with_url("https://a.dev").content("from exa")],
        );
        let live = outcome(
            "xai",
            ProviderKind::Live,
            vec![SearchResult::with_url("https://a.dev").content("from xai, much longer text")],
        );
        let forward = merger().merge(&[broad.clone(), live.clone()]);
        let backward = merger().merge(&[live, broad]);
        assert_eq!(forward, backward);
        assert_eq!(forward[0].content, "from exa");
    }

    #[test]
    fn same_kind_ties_break_by_provider_name() {
        let a = outcome(
            "alpha",
            ProviderKind::Live,
            vec![SearchResult::with_url("https://t.dev").content("alpha")],
        );
        let b = outcome(
            "beta",
            ProviderKind::Live,
            vec![SearchResult::with_url("https://t.dev").content("beta")],
        );
        assert_eq!(merger().merge(&[b, a])[0].content, "alpha");
    }

    #[test]
    fn records_without_url_are_dropped_and_corpus_is_capped() {
        let mut results = vec![SearchResult::default().content("orphan")];
        results.extend(
            (0..30).map(|i| SearchResult::with_url(format!("https://s{i}.dev")).content("c")),
        );
        let merged = merger().merge(&[outcome("exa", ProviderKind::Broad, results)]);
        assert_eq!(merged.len(), 20);
        assert_eq!(merged[0].url, "https://s0.dev");
        assert!(merged.iter().all(|m| !m.url.is_empty()));
    }

    #[test]
    fn configured_precedence_reorders_kinds() {
        let m = Merger::new(vec![ProviderKind::ModelNative, ProviderKind::Broad], 20);
        let outcomes = vec![
            outcome(
                "exa",
                ProviderKind::Broad,
                vec![SearchResult::with_url("https://b.dev").content("exa")],
            ),
            outcome(
                "xai",
                ProviderKind::Live,
                vec![SearchResult::with_url("https://c.dev").content("xai")],
            ),
            outcome(
                "openai",
                ProviderKind::ModelNative,
                vec![SearchResult::with_url("https://a.dev").content("oai")],
            ),
        ];
        let urls: Vec<_> = m.merge(&outcomes).into_iter().map(|r| r.url).collect();
        assert_eq!(urls, vec!["https://a.dev", "https://b.dev", "https://c.dev"]);
    }
}
