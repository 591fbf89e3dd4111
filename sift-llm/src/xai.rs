//! xAI chat completions with Live Search.
use crate::traits::{http_to_sift, GroundedAnswer, GroundedSearch, LlmClient, LlmResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sift_common::{Result, SiftError};
use sift_http::HttpClient;
use std::time::Duration;

pub const XAI_API_BASE: &str = "https://api.x.ai/v1/";

pub struct XaiClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct SearchParameters {
    mode: &'static str,
    return_citations: bool,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    search_parameters: Option<SearchParameters>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    /// URL strings when `return_citations` was requested.
    #[serde(default)]
    citations: Vec<JsonValue>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: Option<u32>,
}

impl ChatResponse {
    fn first_text(&self) -> String {
        self.choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default()
    }
}

impl XaiClient {
    pub fn new(api_key: String, model: String, base_url: Option<&str>) -> Result<Self> {
        let base = match base_url {
            Some(b) => format!("{}/", b.trim_end_matches('/')),
            None => XAI_API_BASE.to_string(),
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

    async fn chat(&self, req: &ChatRequest<'_>) -> Result<ChatResponse> {
        self.client
            .post_json("chat/completions", Some(&self.api_key), req)
            .await
            .map_err(http_to_sift)
    }
}

#[async_trait]
impl LlmClient for XaiClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });
        let req = ChatRequest {
            model: &self.model,
            messages,
            max_tokens,
            temperature,
            search_parameters: None,
        };
        let resp = self.chat(&req).await?;
        Ok(LlmResponse {
            text: resp.first_text(),
            tokens_used: resp.usage.as_ref().and_then(|u| u.total_tokens),
            model: resp.model.or_else(|| Some(self.model.clone())),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self
            .generate("Respond with just 'OK'", None, Some(5), Some(0.1))
            .await
            .is_ok())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl GroundedSearch for XaiClient {
    async fn grounded_search(&self, query: &str) -> Result<GroundedAnswer> {
        let req = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: query,
            }],
            max_tokens: None,
            temperature: None,
            search_parameters: Some(SearchParameters {
                mode: "on",
                return_citations: true,
            }),
        };
        let resp = self.chat(&req).await?;
        tracing::debug!(
            model = %self.model,
            citations = resp.citations.len(),
            "xai.live_search.done"
        );
        Ok(GroundedAnswer {
            text: resp.first_text(),
            sources: resp.citations.clone(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
