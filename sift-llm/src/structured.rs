//! Helpers for prompts that must come back as JSON.
use regex::Regex;
use serde::de::DeserializeOwned;
use sift_common::{Result, SiftError};

use crate::traits::LlmClient;

/// Try a ```json ... ``` fenced block first, then the outermost `{...}` span.
pub fn extract_json_block(text: &str) -> Option<&str> {
    let re_fence = Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").ok()?;
    if let Some(caps) = re_fence.captures(text) {
        return caps.get(1).map(|m| m.as_str());
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Parse model output into `T`, tolerating code fences and surrounding prose.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T> {
    let block = extract_json_block(text).ok_or_else(|| {
        SiftError::Parse(format!("no JSON object in model output: {}", snip(text)))
    })?;
    serde_json::from_str(block)
        .map_err(|e| SiftError::Parse(format!("{e} in model output: {}", snip(block))))
}

/// Run a generation and parse the reply as `T`.
pub async fn generate_structured<T: DeserializeOwned>(
    llm: &dyn LlmClient,
    prompt: &str,
    system_prompt: Option<&str>,
    max_tokens: Option<u32>,
) -> Result<T> {
    let response = llm
        .generate(prompt, system_prompt, max_tokens, Some(0.1))
        .await?;
    tracing::debug!(
        model = llm.model_name(),
        len = response.text.len(),
        "llm.structured.response"
    );
    parse_structured(&response.text)
}

fn snip(text: &str) -> String {
    text.chars().take(200).collect()
}
