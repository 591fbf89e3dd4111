//! Fan-out, merge, hydrate and evaluate for a single query.
use crate::evaluate::{Judge, RelevanceEvaluator};
use crate::fanout::FanOut;
use crate::hydrate::Hydrator;
use crate::merge::Merger;
use sift_common::model::{EvaluatedResult, ResearchData};
use sift_common::ProviderKind;
use sift_config::PipelineSettings;
use sift_search::SearchProvider;
use std::sync::Arc;
use std::time::Instant;

pub struct AggregationPipeline {
    fanout: FanOut,
    merger: Merger,
    hydrator: Hydrator,
    evaluator: RelevanceEvaluator,
}

impl AggregationPipeline {
    pub fn new(
        fanout: FanOut,
        merger: Merger,
        hydrator: Hydrator,
        evaluator: RelevanceEvaluator,
    ) -> Self {
        Self {
            fanout,
            merger,
            hydrator,
            evaluator,
        }
    }

    /// Wire the stages from settings. The first broad adapter doubles as the
    /// hydration source.
    pub fn from_settings(
        providers: Vec<Arc<dyn SearchProvider>>,
        judge: Arc<dyn Judge>,
        settings: &PipelineSettings,
    ) -> Self {
        let broad = providers
            .iter()
            .find(|p| p.kind() == ProviderKind::Broad)
            .cloned();
        let t = &settings.timeouts;
        Self::new(
            FanOut::new(providers, t.search()),
            Merger::new(settings.precedence.clone(), settings.max_corpus),
            Hydrator::new(broad, settings.hydrate_cap, settings.min_content_chars, t.hydrate()),
            RelevanceEvaluator::new(
                judge,
                settings.fast_paths.clone(),
                settings.eval_concurrency,
                t.judge(),
            ),
        )
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.fanout.providers().iter().map(|p| p.name()).collect()
    }

    /// Evaluated, deduplicated records for `query`. Provider, hydration and
    /// judgment failures only thin out or downgrade the result.
    pub async fn evaluate_query(&self, query: &str) -> Vec<EvaluatedResult> {
        let started = Instant::now();
        let outcomes = self.fanout.run(query).await;
        let merged = self.merger.merge(&outcomes);
        let hydrated = self.hydrator.hydrate(merged).await;
        let evaluated = self.evaluator.evaluate(query, hydrated).await;
        tracing::info!(
            %query,
            records = evaluated.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline.query.done"
        );
        evaluated
    }

    /// One research pass as persisted research data.
    pub async fn collect(&self, query: &str) -> ResearchData {
        ResearchData::initial(query, self.evaluate_query(query).await)
    }
}
