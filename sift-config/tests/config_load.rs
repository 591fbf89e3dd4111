use serial_test::serial;
use sift_common::{LlmConfig, ProviderKind};
use sift_config::{FastPathRule, LoopMode, ResearchStrategy, SiftConfigLoader};
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

const FULL_YAML: &str = r#"
version: "1"
llm:
  provider: openai
  model: gpt-4.1-mini
  api_key: "${SIFT_TEST_OPENAI_KEY}"
judge:
  provider: ollama
  model: llama3.2:3b
providers:
  exa:
    api_key: "${SIFT_TEST_EXA_KEY}"
    num_results: 5
  xai:
    api_key: "${SIFT_TEST_XAI_KEY}"
pipeline:
  mode: direct
  strategy: fan_out
  precedence: [live, broad, model_native]
  hydrate_cap: 4
  timeouts:
    judge_secs: 10
  fast_paths:
    - rule: profile
      url_marker: linkedin.com/in
      names: [david, chang]
    - rule: official_source
      term: mindworks
      domain: mindworks.vc
logging:
  format: json
  filter: debug
"#;

#[test]
#[serial]
fn loads_full_file_with_expansion() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "sift.yaml", FULL_YAML);

    temp_env::with_vars(
        [
            ("SIFT_TEST_OPENAI_KEY", Some("sk-openai")),
            ("SIFT_TEST_EXA_KEY", Some("exa-key")),
            ("SIFT_TEST_XAI_KEY", None),
        ],
        || {
            let cfg = SiftConfigLoader::new().with_file(&p).load().expect("load config");

            assert_eq!(
                cfg.llm,
                LlmConfig::OpenAi {
                    api_key: "sk-openai".into(),
                    model: "gpt-4.1-mini".into(),
                    base_url: None,
                }
            );
            assert!(matches!(
                cfg.judge_config(),
                LlmConfig::Ollama { base_url, .. } if base_url == "http://localhost:11434"
            ));

            let exa = cfg.providers.exa.as_ref().unwrap();
            assert_eq!(exa.api_key(), Some("exa-key"));
            assert_eq!(exa.num_results, 5);
            assert!(exa.summarize);
            assert_eq!(cfg.providers.xai.as_ref().unwrap().api_key(), None);
            assert!(cfg.providers.openai.is_none());

            let p = &cfg.pipeline;
            assert_eq!(p.mode, LoopMode::Direct);
            assert_eq!(p.strategy, ResearchStrategy::FanOut);
            assert_eq!(
                p.precedence,
                vec![
                    ProviderKind::Live,
                    ProviderKind::Broad,
                    ProviderKind::ModelNative
                ]
            );
            assert_eq!(p.hydrate_cap, 4);
            assert_eq!(p.max_corpus, 20);
            assert_eq!(p.timeouts.judge_secs, 10);
            assert_eq!(p.timeouts.generate_secs, 120);
            assert_eq!(
                p.fast_paths[1],
                FastPathRule::OfficialSource {
                    term: "mindworks".into(),
                    domain: "mindworks.vc".into()
                }
            );
            assert_eq!(cfg.logging.filter, "debug");
        },
    );
}

#[test]
#[serial]
fn empty_config_uses_defaults() {
    let cfg = SiftConfigLoader::new().with_yaml_str("{}").load().unwrap();
    assert_eq!(cfg.llm, LlmConfig::None);
    assert_eq!(cfg.pipeline.mode, LoopMode::Iterative);
    assert_eq!(cfg.pipeline.strategy, ResearchStrategy::Deep);
    assert_eq!(cfg.pipeline.precedence, ProviderKind::default_precedence());
    assert_eq!(cfg.pipeline.eval_concurrency, 4);
    assert!(cfg.pipeline.fast_paths.is_empty());
}

#[test]
#[serial]
fn environment_overrides_file_values() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "sift.yaml", "pipeline:\n  max_corpus: 12\n  mode: iterative\n");

    temp_env::with_vars(
        [
            ("SIFT_PIPELINE__MAX_CORPUS", Some("7")),
            ("SIFT_PIPELINE__MODE", Some("direct")),
        ],
        || {
            let cfg = SiftConfigLoader::new().with_file(&p).load().unwrap();
            assert_eq!(cfg.pipeline.max_corpus, 7);
            assert_eq!(cfg.pipeline.mode, LoopMode::Direct);
        },
    );
}

#[test]
#[serial]
fn missing_optional_file_is_ignored_but_required_is_not() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.yaml");
    assert!(SiftConfigLoader::new().with_optional_file(&missing).load().is_ok());
    assert!(SiftConfigLoader::new().with_file(&missing).load().is_err());
}

#[test]
#[serial]
fn zero_concurrency_is_rejected() {
    let err = SiftConfigLoader::new()
        .with_yaml_str("pipeline:\n  eval_concurrency: 0\n")
        .load()
        .unwrap_err();
    assert!(err.to_string().contains("eval_concurrency"));
}
