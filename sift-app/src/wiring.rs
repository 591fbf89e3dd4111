use anyhow::{Context, Result};
use sift_common::{LlmConfig, ProviderKind};
use sift_config::{GroundedSettings, SiftConfig};
use sift_llm::openai::OpenAiClient;
use sift_llm::traits::LlmClient;
use sift_llm::xai::XaiClient;
use sift_llm::{DEFAULT_OPENAI_MODEL, DEFAULT_XAI_MODEL, GroundedSearch, ensure_llm_ready};
use sift_research::{
    AggregationPipeline, CitationSynthesizer, DeepResearch, LlmJudge, PlannedDeepResearch,
    ResearchServices,
};
use sift_search::{ExaSearch, GroundedSearchProvider, SearchProvider};
use std::sync::Arc;

/// Everything the loop controller needs, built from configuration.
pub async fn build_services(cfg: &SiftConfig) -> Result<Arc<ResearchServices>> {
    let llm = llm_client(&cfg.llm)
        .await
        .context("failed to initialise the generation model")?;
    let judge_llm = match &cfg.judge {
        Some(judge) => llm_client(judge)
            .await
            .context("failed to initialise the relevance judge")?,
        None => llm.clone(),
    };

    let providers = build_providers(cfg, llm.clone())?;
    let settings = &cfg.pipeline;
    let judge = Arc::new(LlmJudge::new(judge_llm, settings.excerpt_chars));
    let pipeline = Arc::new(AggregationPipeline::from_settings(providers, judge, settings));
    let generate = settings.timeouts.generate();
    let deep: Arc<dyn DeepResearch> = Arc::new(PlannedDeepResearch::new(
        llm.clone(),
        pipeline.clone(),
        settings.max_follow_ups,
        generate,
    ));

    tracing::info!(
        llm = llm.model_name(),
        providers = ?pipeline.provider_names(),
        "app.wiring.ready"
    );
    Ok(Arc::new(ResearchServices {
        pipeline,
        deep: Some(deep),
        synthesizer: Arc::new(CitationSynthesizer::new(llm, settings.max_sources, generate)),
    }))
}

async fn llm_client(cfg: &LlmConfig) -> sift_common::Result<Arc<dyn LlmClient>> {
    let client = ensure_llm_ready(cfg).await?;
    Ok(client as Arc<dyn LlmClient>)
}

/// Always three adapters, one per backend family. An unconfigured backend
/// still takes part and reports a missing key.
pub fn build_providers(
    cfg: &SiftConfig,
    summarizer: Arc<dyn LlmClient>,
) -> Result<Vec<Arc<dyn SearchProvider>>> {
    let exa = match &cfg.providers.exa {
        Some(s) => {
            let search = ExaSearch::new(s.api_key().map(str::to_string), s.base_url.as_deref())
                .context("invalid Exa base URL")?
                .with_num_results(s.num_results);
            if s.summarize {
                search.with_summarizer(summarizer)
            } else {
                search
            }
        }
        None => ExaSearch::new(None, None).context("failed to build Exa client")?,
    };

    let openai = grounded_backend(cfg.providers.openai.as_ref(), |key, s| {
        let model = s.model.clone().unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
        let client = OpenAiClient::new(key.to_string(), model, s.base_url.as_deref())?;
        Ok(Arc::new(client) as Arc<dyn GroundedSearch>)
    })
    .context("failed to build OpenAI search client")?;

    let xai = grounded_backend(cfg.providers.xai.as_ref(), |key, s| {
        let model = s.model.clone().unwrap_or_else(|| DEFAULT_XAI_MODEL.to_string());
        let client = XaiClient::new(key.to_string(), model, s.base_url.as_deref())?;
        Ok(Arc::new(client) as Arc<dyn GroundedSearch>)
    })
    .context("failed to build xAI search client")?;

    let providers: Vec<Arc<dyn SearchProvider>> = vec![
        Arc::new(exa),
        Arc::new(GroundedSearchProvider::new("openai", ProviderKind::ModelNative, openai)),
        Arc::new(GroundedSearchProvider::new("xai", ProviderKind::Live, xai)),
    ];
    Ok(providers)
}

fn grounded_backend<F>(
    settings: Option<&GroundedSettings>,
    build: F,
) -> sift_common::Result<Option<Arc<dyn GroundedSearch>>>
where
    F: FnOnce(&str, &GroundedSettings) -> sift_common::Result<Arc<dyn GroundedSearch>>,
{
    let Some(s) = settings else {
        return Ok(None);
    };
    match s.api_key() {
        Some(key) => build(key, s).map(Some),
        None => Ok(None),
    }
}
