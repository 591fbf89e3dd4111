//! Provider-agnostic LLM integration for Sift.
//!
//! This crate exposes the common [`traits::LlmClient`] interface used for
//! generation and judgment, the [`traits::GroundedSearch`] interface for
//! models that search the web themselves, and concrete clients for OpenAI,
//! xAI and Ollama. [`ensure_llm_ready`] builds a client from a
//! [`sift_common::LlmConfig`].
//!
//! # Examples
//! ```no_run
//! use sift_common::{LlmConfig, Result};
//! use sift_llm::ensure_llm_ready;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let cfg = LlmConfig::OpenAi {
//!     api_key: "sk-...".into(),
//!     model: "gpt-4.1-mini".into(),
//!     base_url: None,
//! };
//! let client = ensure_llm_ready(&cfg).await?;
//! assert!(!client.model_name().is_empty());
//! # Ok(())
//! # }
//! ```
pub mod ollama;
pub mod openai;
pub mod structured;
pub mod traits;
pub mod xai;

use ollama::OllamaClient;
use openai::OpenAiClient;
use sift_common::{LlmConfig, SiftError};
use std::sync::Arc;
use traits::LlmClient;
use xai::XaiClient;

pub use structured::{extract_json_block, generate_structured, parse_structured};
pub use traits::{GroundedAnswer, GroundedSearch, LlmResponse};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_XAI_MODEL: &str = "grok-3-latest";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2:3b";

/// Build an LLM client for `config`, probing local servers where needed.
pub async fn ensure_llm_ready(
    config: &LlmConfig,
) -> sift_common::Result<Arc<dyn LlmClient + Send + Sync + 'static>> {
    match config {
        LlmConfig::OpenAi {
            api_key,
            model,
            base_url,
        } => {
            let client = OpenAiClient::new(api_key.clone(), model.clone(), base_url.as_deref())?;
            Ok(Arc::new(client))
        }
        LlmConfig::Xai {
            api_key,
            model,
            base_url,
        } => {
            let client = XaiClient::new(api_key.clone(), model.clone(), base_url.as_deref())?;
            Ok(Arc::new(client))
        }
        LlmConfig::Ollama { base_url, model } => {
            let client = OllamaClient::new(base_url.clone(), model.clone()).await?;
            Ok(Arc::new(client))
        }
        LlmConfig::None => Err(SiftError::Config("No LLM configured".to_string())),
    }
}
