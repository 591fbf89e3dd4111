//! Concurrent dispatch of one query to every search adapter.
use futures::future::join_all;
use sift_search::{SearchOutcome, SearchProvider};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::AbortHandle;

/// Aborts still-running adapter tasks if the fan-out future is dropped.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

pub struct FanOut {
    providers: Vec<Arc<dyn SearchProvider>>,
    timeout: Duration,
}

impl FanOut {
    pub fn new(providers: Vec<Arc<dyn SearchProvider>>, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    pub fn providers(&self) -> &[Arc<dyn SearchProvider>] {
        &self.providers
    }

    /// One outcome per adapter, in adapter order. A panic or timeout in an
    /// adapter task becomes that adapter's error outcome.
    pub async fn run(&self, query: &str) -> Vec<SearchOutcome> {
        let started = Instant::now();
        let handles: Vec<_> = self
            .providers
            .iter()
            .map(|provider| {
                let provider = Arc::clone(provider);
                let query = query.to_string();
                let limit = self.timeout;
                tokio::spawn(async move {
                    match tokio::time::timeout(limit, provider.search(&query)).await {
                        Ok(outcome) => outcome,
                        Err(_) => SearchOutcome::failed(
                            provider.name(),
                            provider.kind(),
                            format!("search timed out after {limit:?}"),
                        ),
                    }
                })
            })
            .collect();
        let _guard = AbortOnDrop(handles.iter().map(|h| h.abort_handle()).collect());

        let joined = join_all(handles).await;
        let outcomes: Vec<SearchOutcome> = joined
            .into_iter()
            .zip(&self.providers)
            .map(|(joined, provider)| match joined {
                Ok(outcome) => outcome,
                Err(e) => SearchOutcome::failed(
                    provider.name(),
                    provider.kind(),
                    format!("search task failed: {e}"),
                ),
            })
            .collect();

        for outcome in &outcomes {
            match &outcome.error {
                Some(error) => tracing::warn!(
                    provider = %outcome.provider,
                    kind = %outcome.kind,
                    %error,
                    "pipeline.fanout.provider_error"
                ),
                None => tracing::debug!(
                    provider = %outcome.provider,
                    kind = %outcome.kind,
                    count = outcome.results.len(),
                    "pipeline.fanout.provider_ok"
                ),
            }
        }
        tracing::info!(
            %query,
            providers = outcomes.len(),
            failed = outcomes.iter().filter(|o| o.is_error()).count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline.fanout.done"
        );
        outcomes
    }
}
