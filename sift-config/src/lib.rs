//! Loader for `sift.yaml` with environment overlays.
//!
//! Sources are merged in the order they are attached, with `SIFT_`-prefixed
//! environment variables applied last (`SIFT_PIPELINE__MAX_CORPUS=10` sets
//! `pipeline.max_corpus`). After merging, `${VAR}` placeholders in any string
//! are expanded from the process environment before the typed structs are
//! built. Every section is optional; an empty document yields the defaults.
//!
//! ```yaml
//! llm: { provider: openai, model: gpt-4.1-mini, api_key: "${OPENAI_API_KEY}" }
//! providers:
//!   exa: { api_key: "${EXA_API_KEY}", num_results: 3 }
//!   xai: { api_key: "${XAI_API_KEY}" }
//! pipeline:
//!   mode: iterative
//!   precedence: [broad, live, model_native]
//!   fast_paths:
//!     - { rule: official_source, term: mindworks, domain: mindworks.vc }
//! ```
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sift_common::observability::{LogConfig, LogFormat};
use sift_common::{LlmConfig, ProviderKind};
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "SIFT";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiftConfig {
    pub version: Option<String>,
    /// Generation backend for summaries, planning and reports.
    pub llm: LlmConfig,
    /// Relevance judge; falls back to `llm` when absent.
    pub judge: Option<LlmConfig>,
    pub providers: ProvidersConfig,
    pub pipeline: PipelineSettings,
    pub logging: LoggingSettings,
}

impl SiftConfig {
    pub fn judge_config(&self) -> &LlmConfig {
        self.judge.as_ref().unwrap_or(&self.llm)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub exa: Option<ExaSettings>,
    pub openai: Option<GroundedSettings>,
    pub xai: Option<GroundedSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExaSettings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_num_results")]
    pub num_results: u32,
    #[serde(default = "default_true")]
    pub summarize: bool,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ExaSettings {
    pub fn api_key(&self) -> Option<&str> {
        usable_secret(&self.api_key)
    }
}

/// Settings for a search-grounded model backend (OpenAI or xAI).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundedSettings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl GroundedSettings {
    pub fn api_key(&self) -> Option<&str> {
        usable_secret(&self.api_key)
    }
}

/// A secret counts as configured when it is non-blank and not an unexpanded
/// `${VAR}` placeholder.
pub fn usable_secret(raw: &str) -> Option<&str> {
    let s = raw.trim();
    (!s.is_empty() && !s.contains("${")).then_some(s)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    /// Suspend for approval after every research pass.
    #[default]
    Iterative,
    /// Research once and report without asking.
    Direct,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStrategy {
    /// Planned two-phase research, falling back to the fan-out pipeline.
    #[default]
    Deep,
    /// Always run the multi-provider pipeline for the query.
    FanOut,
}

/// Heuristic that marks a record relevant without consulting the judge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum FastPathRule {
    /// Every name token appears in the query and the URL, and the URL
    /// contains `url_marker` (e.g. `linkedin.com/in`).
    Profile { url_marker: String, names: Vec<String> },
    /// The query mentions `term` and the URL contains `domain`, or the
    /// title/content mentions `term`.
    OfficialSource { term: String, domain: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub search_secs: u64,
    pub hydrate_secs: u64,
    pub judge_secs: u64,
    pub generate_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            search_secs: 30,
            hydrate_secs: 20,
            judge_secs: 30,
            generate_secs: 120,
        }
    }
}

impl TimeoutSettings {
    pub fn search(&self) -> Duration {
        Duration::from_secs(self.search_secs)
    }
    pub fn hydrate(&self) -> Duration {
        Duration::from_secs(self.hydrate_secs)
    }
    pub fn judge(&self) -> Duration {
        Duration::from_secs(self.judge_secs)
    }
    pub fn generate(&self) -> Duration {
        Duration::from_secs(self.generate_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub mode: LoopMode,
    pub strategy: ResearchStrategy,
    /// Merge order by provider kind, richest first.
    pub precedence: Vec<ProviderKind>,
    pub max_corpus: usize,
    pub hydrate_cap: usize,
    pub min_content_chars: usize,
    pub max_sources: usize,
    pub excerpt_chars: usize,
    pub eval_concurrency: usize,
    pub max_follow_ups: usize,
    pub timeouts: TimeoutSettings,
    pub fast_paths: Vec<FastPathRule>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            mode: LoopMode::default(),
            strategy: ResearchStrategy::default(),
            precedence: ProviderKind::default_precedence(),
            max_corpus: 20,
            hydrate_cap: 8,
            min_content_chars: 20,
            max_sources: 20,
            excerpt_chars: 500,
            eval_concurrency: 4,
            max_follow_ups: 3,
            timeouts: TimeoutSettings::default(),
            fast_paths: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
    pub emit_stderr: bool,
    pub dir: Option<PathBuf>,
    /// Used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            emit_stderr: false,
            dir: None,
            filter: "info".to_string(),
        }
    }
}

impl LoggingSettings {
    pub fn to_log_config(&self, app_name: &str) -> LogConfig {
        LogConfig {
            app_name: app_name.to_string(),
            log_dir: self.dir.clone(),
            emit_stderr: self.emit_stderr,
            format: self.format,
            default_filter: self.filter.clone(),
        }
    }
}

fn default_num_results() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

/// `~/.config/sift/sift.yaml` (platform equivalent), if a config dir exists.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sift").join("sift.yaml"))
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let Ok(expanded) = shellexpand::env(&cur).map(|c| c.into_owned()) else {
                        break;
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

fn validate(cfg: &SiftConfig) -> Result<(), ConfigError> {
    let p = &cfg.pipeline;
    let positive = [
        ("pipeline.max_corpus", p.max_corpus),
        ("pipeline.max_sources", p.max_sources),
        ("pipeline.eval_concurrency", p.eval_concurrency),
        ("pipeline.excerpt_chars", p.excerpt_chars),
    ];
    for (key, value) in positive {
        if value == 0 {
            return Err(ConfigError::Message(format!("{key} must be greater than zero")));
        }
    }
    for (i, kind) in p.precedence.iter().enumerate() {
        if p.precedence[..i].contains(kind) {
            return Err(ConfigError::Message(format!(
                "pipeline.precedence lists `{kind}` more than once"
            )));
        }
    }
    Ok(())
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct SiftConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for SiftConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SiftConfigLoader {
    /// ```
    /// use sift_config::{LoopMode, SiftConfigLoader};
    ///
    /// let config = SiftConfigLoader::new()
    ///     .with_yaml_str("version: '1'\npipeline:\n  mode: direct")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.pipeline.mode, LoopMode::Direct);
    /// assert_eq!(config.pipeline.max_corpus, 20);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a required YAML/TOML/JSON file; the format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be missing, for the per-user default location.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use sift_config::{FastPathRule, SiftConfigLoader};
    ///
    /// let cfg = SiftConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// pipeline:
    ///   fast_paths:
    ///     - rule: profile
    ///       url_marker: linkedin.com/in
    ///       names: [david, chang]
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert!(matches!(
    ///     &cfg.pipeline.fast_paths[0],
    ///     FastPathRule::Profile { names, .. } if names.len() == 2
    /// ));
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Merge all sources, apply `SIFT_` environment overrides, expand
    /// `${VAR}` placeholders and build the typed config.
    pub fn load(self) -> Result<SiftConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: SiftConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        validate(&typed)?;
        Ok(typed)
    }
}
