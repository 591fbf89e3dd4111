use crate::traits::{http_to_sift, LlmClient, LlmResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use sift_common::{Result, SiftError};
use sift_http::{HttpClient, RequestOpts};
use std::time::Duration;

const OLLAMA_CONNECTION_ERROR: &str = "No running Ollama server detected. Start it with: `ollama serve` (after installing). Install instructions: https://github.com/ollama/ollama";

/// Ollama client for local model inference.
///
/// Expects a running Ollama server (see https://github.com/ollama/ollama).
pub struct OllamaClient {
    client: HttpClient,
    model: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: Map<String, JsonValue>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    eval_count: Option<u32>,
}

impl OllamaClient {
    /// Create a new client and verify server/model availability.
    pub async fn new(base_url: String, model: String) -> Result<Self> {
        let base = format!("{}/", base_url.trim_end_matches('/'));
        let client = HttpClient::new(&base)
            .map_err(|e| SiftError::Agent(format!("Failed to create HTTP client: {e}")))?
            .with_timeout(Duration::from_secs(120));

        let ollama = Self { client, model };
        let models = ollama.available_models().await?;
        if !models.iter().any(|m| m == &ollama.model) {
            tracing::info!(model = %ollama.model, "ollama.model.pull");
            ollama.pull_model().await?;
        }
        Ok(ollama)
    }

    async fn available_models(&self) -> Result<Vec<String>> {
        let opts = RequestOpts {
            timeout: Some(Duration::from_secs(10)),
            retries: Some(0),
            ..Default::default()
        };
        let tags: TagsResponse = self
            .client
            .get_json("api/tags", opts)
            .await
            .map_err(|_| SiftError::Agent(OLLAMA_CONNECTION_ERROR.to_string()))?;
        Ok(tags.models.into_iter().map(|t| t.name).collect())
    }

    async fn pull_model(&self) -> Result<()> {
        let opts = RequestOpts {
            timeout: Some(Duration::from_secs(600)),
            retries: Some(0),
            ..Default::default()
        };
        let _: JsonValue = self
            .client
            .post_json_opts(
                "api/pull",
                &json!({ "model": self.model, "stream": false }),
                opts,
            )
            .await
            .map_err(|e| SiftError::Agent(format!("Failed to pull model: {e}")))?;
        tracing::info!(model = %self.model, "ollama.model.pulled");
        Ok(())
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let mut options = Map::new();
        if let Some(temp) = temperature {
            options.insert("temperature".to_string(), json!(temp));
        }
        if let Some(max_tok) = max_tokens {
            options.insert("num_predict".to_string(), json!(max_tok));
        }

        // Ollama's generate endpoint has no separate system slot in this mode.
        let prompt = match system_prompt {
            Some(system) => format!("{system}\n\nUser: {prompt}\n\nAssistant:"),
            None => prompt.to_string(),
        };

        let req = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options,
        };
        let resp: GenerateResponse = self
            .client
            .post_json_opts("api/generate", &req, RequestOpts::default())
            .await
            .map_err(http_to_sift)?;

        Ok(LlmResponse {
            text: resp.response,
            model: Some(self.model.clone()),
            tokens_used: resp.eval_count,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.available_models().await.is_ok())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
