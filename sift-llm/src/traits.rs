use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sift_common::{Result, SiftError};
use sift_http::HttpError;

/// Cap applied to page text before it is handed to the model for summarization.
pub const SUMMARY_INPUT_CHARS: usize = 8000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub tokens_used: Option<u32>,
}

/// Free text from a search-grounded model call, plus the loosely shaped
/// source objects the provider attached to it.
///
/// `sources` are kept as raw JSON because each backend names its fields
/// differently; `sift-search` normalizes them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroundedAnswer {
    pub text: String,
    #[serde(default)]
    pub sources: Vec<serde_json::Value>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a response to the given prompt with optional system prompt
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse>;

    /// Check if the LLM service is available
    async fn health_check(&self) -> Result<bool>;

    /// Get the model name being used
    fn model_name(&self) -> &str;

    fn default_research_system_prompt(&self) -> String {
        format!(
            r#"You are an expert research assistant. Today is {today}.

Your role:
- Work only from the material you are given
- Separate well-supported facts from speculation
- Be precise, factual and concise
- If something is unknown, say so rather than inventing it"#,
            today = chrono::Utc::now().format("%Y-%m-%d")
        )
    }

    /// Summarize one fetched page for a research query.
    async fn summarize_page(
        &self,
        query: &str,
        title: Option<&str>,
        url: &str,
        text: &str,
    ) -> Result<String> {
        let bounded: String = text.chars().take(SUMMARY_INPUT_CHARS).collect();
        let prompt = format!(
            "Summarize the following web content for the research query: \"{query}\"\n\n\
             Title: {title}\nURL: {url}\nContent: {bounded}...\n\n\
             Provide a concise summary that captures the key information relevant to the research query.",
            title = title.unwrap_or("No title"),
        );
        let response = self
            .generate(
                &prompt,
                Some(&self.default_research_system_prompt()),
                Some(400),
                Some(0.3),
            )
            .await?;
        let summary = response.text.trim();
        if summary.is_empty() {
            return Err(SiftError::Agent("empty summary from model".into()));
        }
        Ok(summary.to_string())
    }
}

/// A model that can search the web itself and cite what it found.
#[async_trait]
pub trait GroundedSearch: Send + Sync {
    async fn grounded_search(&self, query: &str) -> Result<GroundedAnswer>;

    fn model_name(&self) -> &str;
}

pub(crate) fn http_to_sift(e: HttpError) -> SiftError {
    SiftError::Http(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        prompts: Mutex<Vec<String>>,
        reply: &'static str,
    }

    #[async_trait]
    impl LlmClient for Recorder {
        async fn generate(
            &self,
            prompt: &str,
            _system_prompt: Option<&str>,
            _max_tokens: Option<u32>,
            _temperature: Option<f32>,
        ) -> Result<LlmResponse> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(LlmResponse {
                text: self.reply.to_string(),
                ..Default::default()
            })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn model_name(&self) -> &str {
            "recorder"
        }
    }

    #[tokio::test]
    async fn summarize_page_bounds_input_text() {
        let llm = Recorder {
            prompts: Mutex::new(Vec::new()),
            reply: "  short summary ",
        };
        let page = "a".repeat(SUMMARY_INPUT_CHARS + 500);
        let out = llm
            .summarize_page("rust", None, "https://a.dev", &page)
            .await
            .unwrap();
        assert_eq!(out, "short summary");

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("Title: No title"));
        assert!(!prompts[0].contains(&"a".repeat(SUMMARY_INPUT_CHARS + 1)));
    }

    #[tokio::test]
    async fn blank_summary_is_an_error() {
        let llm = Recorder {
            prompts: Mutex::new(Vec::new()),
            reply: "   ",
        };
        assert!(llm
            .summarize_page("q", Some("t"), "https://a.dev", "body")
            .await
            .is_err());
    }
}
