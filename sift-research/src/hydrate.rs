//! Recovery fetches for records whose content is too thin to judge.
use futures::future::join_all;
use sift_common::model::{MergedResult, SearchResult};
use sift_search::SearchProvider;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub struct Hydrator {
    source: Option<Arc<dyn SearchProvider>>,
    cap: usize,
    min_chars: usize,
    timeout: Duration,
}

impl Hydrator {
    /// `source` is the broad adapter; without one hydration is a no-op.
    pub fn new(
        source: Option<Arc<dyn SearchProvider>>,
        cap: usize,
        min_chars: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            cap,
            min_chars,
            timeout,
        }
    }

    pub fn needs_hydration(&self, record: &MergedResult) -> bool {
        record.content_chars() < self.min_chars
    }

    /// Fill thin records in place, at most `cap` of them, concurrently.
    /// Failures and timeouts leave the record unchanged.
    pub async fn hydrate(&self, mut corpus: Vec<MergedResult>) -> Vec<MergedResult> {
        let Some(source) = &self.source else {
            return corpus;
        };
        let targets: Vec<(usize, String)> = corpus
            .iter()
            .enumerate()
            .filter(|(_, r)| self.needs_hydration(r))
            .map(|(i, r)| (i, r.url.clone()))
            .take(self.cap)
            .collect();
        if targets.is_empty() {
            return corpus;
        }
        tracing::debug!(count = targets.len(), "pipeline.hydrate.start");

        let fetches = targets.into_iter().map(|(i, url)| {
            let source = Arc::clone(source);
            async move {
                let fetched = tokio::time::timeout(self.timeout, source.recover(&url)).await;
                (i, url, fetched)
            }
        });

        let mut filled = 0usize;
        for (i, url, fetched) in join_all(fetches).await {
            match fetched {
                Ok(outcome) => match pick_content(&url, &outcome.results) {
                    Some(content) => {
                        corpus[i].content = content.to_string();
                        filled += 1;
                    }
                    None => tracing::debug!(
                        %url,
                        error = outcome.error.as_deref().unwrap_or("-"),
                        "pipeline.hydrate.no_match"
                    ),
                },
                Err(_) => tracing::warn!(%url, "pipeline.hydrate.timeout"),
            }
        }
        tracing::info!(filled, "pipeline.hydrate.done");
        corpus
    }
}

/// Content from the exact URL match, else from the first same-host result.
/// Blank content on the chosen match counts as no match.
pub fn pick_content<'a>(url: &str, candidates: &'a [SearchResult]) -> Option<&'a str> {
    let exact = candidates.iter().find(|c| c.usable_url() == Some(url));
    let pick = exact.or_else(|| {
        let host = host_key(url)?;
        candidates
            .iter()
            .find(|c| c.usable_url().and_then(host_key).as_ref() == Some(&host))
    })?;
    pick.content.as_deref().filter(|c| !c.trim().is_empty())
}

fn host_key(raw: &str) -> Option<(String, Option<u16>)> {
    let parsed = Url::parse(raw).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some((host, parsed.port_or_known_default()))
}
