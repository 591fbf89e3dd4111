//! OpenAI Responses API client.
//!
//! Plain generation posts `{ model, input, instructions }`. Grounded search
//! adds the `web_search_preview` tool and reads `url_citation` annotations off
//! the returned text as sources.
use crate::traits::{http_to_sift, GroundedAnswer, GroundedSearch, LlmClient, LlmResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use sift_common::{Result, SiftError};
use sift_http::HttpClient;
use std::time::Duration;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1/";

pub struct OpenAiClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a str,
    instructions: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    model: String,
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: Option<u32>,
}

/// One element of `output`; tool-call items have no `content`.
#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    annotations: Vec<JsonValue>,
}

impl ResponsesResponse {
    fn text_parts(&self) -> impl Iterator<Item = &OutputContent> {
        self.output
            .iter()
            .filter(|item| item.kind == "message")
            .flat_map(|item| &item.content)
            .filter(|c| c.kind == "output_text")
    }

    fn joined_text(&self) -> String {
        self.text_parts()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn url_citations(&self) -> Vec<JsonValue> {
        self.text_parts()
            .flat_map(|c| &c.annotations)
            .filter(|a| a.get("type").and_then(JsonValue::as_str) == Some("url_citation"))
            .cloned()
            .collect()
    }
}

impl OpenAiClient {
    /// Create a client for the given key and model, optionally against an
    /// OpenAI-compatible gateway.
    pub fn new(api_key: String, model: String, base_url: Option<&str>) -> Result<Self> {
        let base = match base_url {
            Some(b) => format!("{}/", b.trim_end_matches('/')),
            None => OPENAI_API_BASE.to_string(),
        };
        let client = HttpClient::new(&base)
            .map_err(|e| SiftError::Agent(format!("HttpClient init failed: {e}")))?
            .with_timeout(Duration::from_secs(120));

        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    async fn respond(&self, req: &ResponsesRequest<'_>) -> Result<ResponsesResponse> {
        self.client
            .post_json("responses", Some(&self.api_key), req)
            .await
            .map_err(http_to_sift)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "openai.generate.start");

        let req = ResponsesRequest {
            model: &self.model,
            input: prompt,
            instructions: system_prompt.unwrap_or("You are an objective, unbiased researcher."),
            max_output_tokens: max_tokens,
            temperature,
            tools: Vec::new(),
        };
        let resp = self.respond(&req).await?;

        Ok(LlmResponse {
            text: resp.joined_text(),
            tokens_used: resp.usage.as_ref().and_then(|u| u.total_tokens),
            model: Some(resp.model),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        match self.generate("Respond with just 'OK'", None, Some(16), Some(0.1)).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(error = %e, "openai.health_check.failed");
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl GroundedSearch for OpenAiClient {
    async fn grounded_search(&self, query: &str) -> Result<GroundedAnswer> {
        let input = format!(
            "Search the web for up-to-date information relevant to: \"{query}\". Provide a concise answer with clear citations."
        );
        let req = ResponsesRequest {
            model: &self.model,
            input: &input,
            instructions: "You are a web research assistant. Cite every source you rely on.",
            max_output_tokens: None,
            temperature: None,
            tools: vec![json!({ "type": "web_search_preview" })],
        };
        let resp = self.respond(&req).await?;
        let sources = resp.url_citations();
        tracing::debug!(
            model = %self.model,
            sources = sources.len(),
            "openai.grounded_search.done"
        );

        Ok(GroundedAnswer {
            text: resp.joined_text(),
            sources,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
