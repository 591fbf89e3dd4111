#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use sift_common::model::{MergedResult, SearchResult};
use sift_common::observability::{LogConfig, LogFormat};
use sift_common::{ProviderKind, Result, SiftError};
use sift_llm::LlmResponse;
use sift_llm::traits::LlmClient;
use sift_research::{Judge, Judgment};
use sift_search::{SearchOutcome, SearchProvider};

static INIT_PATH: OnceLock<std::path::PathBuf> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let dir = tempfile::tempdir().map(|d| d.keep()).unwrap_or_default();
        let config = LogConfig {
            app_name: "sift-research-tests".to_string(),
            log_dir: Some(dir),
            emit_stderr: true,
            format: if std::env::var("SIFT_LOG_FORMAT")
                .map(|raw| raw.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false)
            {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
            default_filter: "debug".to_string(),
        };

        sift_common::observability::init_logging(config).unwrap_or_default()
    });
}

enum Behavior {
    Results(Vec<SearchResult>),
    Error(String),
    Panic,
}

/// Canned search adapter.
pub struct FakeProvider {
    name: String,
    kind: ProviderKind,
    behavior: Behavior,
    delay: Option<Duration>,
    recovered: Vec<SearchResult>,
    pub searches: AtomicUsize,
    pub recoveries: Mutex<Vec<String>>,
}

impl FakeProvider {
    fn build(name: &str, kind: ProviderKind, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            kind,
            behavior,
            delay: None,
            recovered: Vec::new(),
            searches: AtomicUsize::new(0),
            recoveries: Mutex::new(Vec::new()),
        }
    }

    pub fn returning(name: &str, kind: ProviderKind, results: Vec<SearchResult>) -> Self {
        Self::build(name, kind, Behavior::Results(results))
    }

    pub fn failing(name: &str, kind: ProviderKind, error: &str) -> Self {
        Self::build(name, kind, Behavior::Error(error.to_string()))
    }

    pub fn panicking(name: &str, kind: ProviderKind) -> Self {
        Self::build(name, kind, Behavior::Panic)
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Results handed back from `recover`.
    pub fn recovering(mut self, results: Vec<SearchResult>) -> Self {
        self.recovered = results;
        self
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn search(&self, _query: &str) -> SearchOutcome {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.behavior {
            Behavior::Results(results) => SearchOutcome::ok(&self.name, self.kind, results.clone()),
            Behavior::Error(e) => SearchOutcome::failed(&self.name, self.kind, e.clone()),
            Behavior::Panic => panic!("{} blew up", self.name),
        }
    }

    async fn recover(&self, url: &str) -> SearchOutcome {
        self.recoveries.lock().unwrap().push(url.to_string());
        SearchOutcome::ok(&self.name, self.kind, self.recovered.clone())
    }
}

type Script = dyn Fn(&str) -> Result<String> + Send + Sync;

/// Language model that answers through a closure and counts calls.
pub struct FakeLlm {
    script: Box<Script>,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn new(script: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    async fn generate(
        &self,
        prompt: &str,
        _system_prompt: Option<&str>,
        _max_tokens: Option<u32>,
        _temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let text = (self.script)(prompt)?;
        Ok(LlmResponse {
            text,
            ..Default::default()
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn model_name(&self) -> &str {
        "fake"
    }
}

/// Marks records relevant when their content mentions `needle`.
pub struct KeywordJudge {
    needle: String,
}

impl KeywordJudge {
    pub fn new(needle: &str) -> Self {
        Self {
            needle: needle.to_string(),
        }
    }
}

#[async_trait]
impl Judge for KeywordJudge {
    async fn judge(&self, _query: &str, record: &MergedResult) -> Result<Judgment> {
        if record.url.contains("judge-error") {
            return Err(SiftError::Agent("judge unavailable".into()));
        }
        let is_relevant = record.content.contains(&self.needle);
        Ok(Judgment {
            is_relevant,
            reason: if is_relevant { "mentions topic" } else { "off topic" }.to_string(),
        })
    }
}

pub fn result(url: &str, title: &str, content: &str) -> SearchResult {
    SearchResult::with_url(url).title(title).content(content)
}
