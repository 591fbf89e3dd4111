mod common;

use serde_json::json;
use sift_llm::ollama::OllamaClient;
use sift_llm::openai::OpenAiClient;
use sift_llm::traits::{GroundedSearch, LlmClient};
use sift_llm::xai::XaiClient;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn responses_body(text: &str, annotations: serde_json::Value) -> serde_json::Value {
    json!({
        "id": "resp_1",
        "object": "response",
        "model": "gpt-4.1-mini",
        "output": [
            { "type": "web_search_call", "id": "ws_1", "status": "completed" },
            {
                "type": "message",
                "id": "msg_1",
                "content": [
                    { "type": "output_text", "text": text, "annotations": annotations }
                ]
            }
        ],
        "usage": { "total_tokens": 42 }
    })
}

#[tokio::test]
async fn openai_generate_reads_output_text() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "gpt-4.1-mini", "input": "Say ok"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(responses_body("ok", json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiClient::new(
        "sk-test".into(),
        "gpt-4.1-mini".into(),
        Some(&format!("{}/v1", server.uri())),
    )
    .unwrap();
    let resp = client.generate("Say ok", None, Some(8), None).await.unwrap();
    assert_eq!(resp.text, "ok");
    assert_eq!(resp.tokens_used, Some(42));
}

#[tokio::test]
async fn openai_grounded_search_returns_url_citations() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .and(body_partial_json(json!({"tools": [{"type": "web_search_preview"}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(responses_body(
            "Rust 1.90 shipped [rust-lang.org].",
            json!([
                {
                    "type": "url_citation",
                    "url": "https://blog.rust-lang.org/",
                    "title": "Rust Blog",
                    "start_index": 0,
                    "end_index": 10
                },
                { "type": "file_citation", "file_id": "f_1" }
            ]),
        )))
        .mount(&server)
        .await;

    let client = OpenAiClient::new(
        "sk-test".into(),
        "gpt-4.1-mini".into(),
        Some(&format!("{}/v1/", server.uri())),
    )
    .unwrap();
    let answer = client.grounded_search("rust release").await.unwrap();
    assert!(answer.text.starts_with("Rust 1.90"));
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0]["url"], "https://blog.rust-lang.org/");
}

#[tokio::test]
async fn xai_live_search_requests_citations() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "model": "grok-3-latest",
            "search_parameters": { "mode": "on", "return_citations": true }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "grok-3-latest",
            "choices": [{ "message": { "role": "assistant", "content": "Latest news..." } }],
            "citations": ["https://x.com/a", "https://news.example.com/b"]
        })))
        .mount(&server)
        .await;

    let client =
        XaiClient::new("xai-key".into(), "grok-3-latest".into(), Some(&server.uri())).unwrap();
    let answer = client.grounded_search("what happened today").await.unwrap();
    assert_eq!(answer.text, "Latest news...");
    assert_eq!(answer.sources, vec![json!("https://x.com/a"), json!("https://news.example.com/b")]);
}

#[tokio::test]
async fn xai_errors_surface_as_http_errors() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"error": "Incorrect API key"})),
        )
        .mount(&server)
        .await;

    let client = XaiClient::new("bad".into(), "grok-3-latest".into(), Some(&server.uri())).unwrap();
    let err = client.generate("hi", None, None, None).await.unwrap_err();
    assert!(err.to_string().contains("Incorrect API key"), "{err}");
}

#[tokio::test]
async fn ollama_generate_folds_system_prompt() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"models": [{"name": "llama3.2:3b"}]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "llama3.2:3b",
            "prompt": "Be brief.\n\nUser: hello\n\nAssistant:",
            "stream": false
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"response": "hi", "eval_count": 3})),
        )
        .mount(&server)
        .await;

    let client = OllamaClient::new(server.uri(), "llama3.2:3b".into()).await.unwrap();
    let resp = client
        .generate("hello", Some("Be brief."), Some(16), Some(0.2))
        .await
        .unwrap();
    assert_eq!(resp.text, "hi");
    assert_eq!(resp.tokens_used, Some(3));
    assert!(client.health_check().await.unwrap());
}

#[cfg(feature = "e2e")]
#[tokio::test]
#[ignore]
async fn openai_generate_smoketest() {
    common::init_test_tracing();
    let Ok(key) = std::env::var("OPENAI_API_KEY") else {
        tracing::debug!("Skipping: OPENAI_API_KEY not set");
        return;
    };
    let client = OpenAiClient::new(key, sift_llm::DEFAULT_OPENAI_MODEL.into(), None).unwrap();
    let response = client.generate("Say Ok", None, Some(16), None).await.unwrap();
    assert!(!response.text.trim().is_empty());
}
