//! Common types and utilities shared across Sift crates.
//!
//! This crate defines the research data model, provider-agnostic LLM
//! configuration, observability helpers, and the shared error type used
//! throughout the Sift workspace. It stays dependency-light so every crate can
//! depend on it.
//!
//! # Overview
//!
//! - [`model`]: search records, evaluated records, numbered sources, and
//!   [`model::ResearchData`]
//! - [`LlmConfig`]: provider-agnostic LLM configuration
//! - [`ProviderKind`]: the three search backends the pipeline fans out to
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`SiftError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! ```rust
//! use sift_common::{LlmConfig, ProviderKind};
//!
//! let cfg = LlmConfig::default();
//! assert!(matches!(cfg, LlmConfig::None));
//! assert_eq!(ProviderKind::default_precedence()[0], ProviderKind::Broad);
//! ```
use serde::{Deserialize, Serialize};

pub mod model;
pub mod observability;

/// Configuration for an LLM provider used for generation or judgment.
///
/// See the `sift-llm` crate for the concrete clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum LlmConfig {
    #[serde(rename = "openai")]
    OpenAi {
        api_key: String,
        model: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
    Xai {
        api_key: String,
        model: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
    Ollama {
        #[serde(default = "default_ollama_base_url")]
        base_url: String,
        model: String,
    },
    #[default]
    None,
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

/// The family of search backend an adapter wraps.
///
/// The merger orders adapter output by kind, so the kind doubles as the
/// precedence key in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Broad web search that returns full page text (Exa).
    Broad,
    /// Live/real-time web search (xAI).
    Live,
    /// Model-native web search (OpenAI Responses).
    ModelNative,
}

impl ProviderKind {
    /// Richest-first order used when a pipeline does not configure one.
    pub fn default_precedence() -> Vec<ProviderKind> {
        vec![
            ProviderKind::Broad,
            ProviderKind::Live,
            ProviderKind::ModelNative,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Broad => "broad",
            ProviderKind::Live => "live",
            ProviderKind::ModelNative => "model_native",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error types used across the Sift system.
#[derive(thiserror::Error, Debug)]
pub enum SiftError {
    /// A component failed to complete a requested operation.
    #[error("Agent error: {0}")]
    Agent(String),

    /// A search provider failed (network, auth, quota).
    #[error("Provider error: {0}")]
    Provider(String),

    /// A model returned output that did not match the expected structure.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level failure talking to a remote API.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Operation exceeded the configured timeout.
    #[error("Timeout occurred")]
    Timeout,

    /// The run was cancelled before it could finish.
    #[error("Cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenient alias for results that use [`SiftError`].
pub type Result<T> = std::result::Result<T, SiftError>;
