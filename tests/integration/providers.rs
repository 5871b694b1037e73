//! HTTP provider behaviour against the fake server: retries, status
//! handling, response shapes and the Ollama pull-then-retry path.

use secrecy::SecretString;
use serde_json::json;

use hotel_enricher::config::{GeminiConfig, OllamaConfig};
use hotel_enricher::llm::gemini::GeminiClient;
use hotel_enricher::llm::ollama::OllamaClient;
use hotel_enricher::llm::retry::RetryPolicy;
use hotel_enricher::llm::TextGenerator;

use crate::fake_provider::{gemini_text, ollama_text, FakeProvider};
use crate::log_capture::CapturedLogs;

const SECRET_KEY: &str = "SUPERSECRETKEY";

fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        backoff_base_ms: 1,
        ..RetryPolicy::default()
    }
}

fn gemini_at(base: &str, max_retries: u32) -> GeminiClient {
    let cfg = GeminiConfig {
        base_url: format!("{base}/models"),
        model: "gemini-test".into(),
        timeout_secs: 5,
        ..GeminiConfig::default()
    };
    GeminiClient::new(
        &cfg,
        Some(SecretString::new(SECRET_KEY.to_string())),
        fast_retry(max_retries),
    )
    .unwrap()
}

async fn gemini(fake: &FakeProvider, max_retries: u32) -> GeminiClient {
    let base = fake.serve().await;
    gemini_at(&base, max_retries)
}

/// Base URL of a port nobody is listening on.
async fn closed_port() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

async fn ollama(fake: &FakeProvider, max_retries: u32) -> OllamaClient {
    let base = fake.serve().await;
    let cfg = OllamaConfig {
        base_url: base,
        model: "tiny-test".into(),
        timeout_secs: 5,
        pull_timeout_secs: 5,
        post_call_delay_ms: 0,
    };
    OllamaClient::new(&cfg, fast_retry(max_retries)).unwrap()
}

// -- Gemini ----------------------------------------------------------------

#[tokio::test]
async fn test_gemini_success_sends_key_and_prompt() {
    let fake = FakeProvider::scripted(vec![(200, gemini_text("  A bright loft.  "))]);
    let client = gemini(&fake, 3).await;

    assert_eq!(client.generate("Describe it").await.as_deref(), Some("A bright loft."));

    let requests = fake.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/models/gemini-test:generateContent");
    assert_eq!(requests[0].key.as_deref(), Some(SECRET_KEY));
    assert!(requests[0].query.is_none());
    assert_eq!(
        requests[0].body,
        json!({"contents": [{"parts": [{"text": "Describe it"}]}]})
    );
}

#[tokio::test]
async fn test_gemini_retries_unavailable() {
    let fake = FakeProvider::scripted(vec![
        (503, json!({"error": "overloaded"})),
        (429, json!({"error": "slow down"})),
        (200, gemini_text("Recovered.")),
    ]);
    let client = gemini(&fake, 3).await;

    assert_eq!(client.generate("p").await.as_deref(), Some("Recovered."));
    assert_eq!(fake.requests().len(), 3);
}

#[tokio::test]
async fn test_gemini_gives_up_after_retry_budget() {
    let fake = FakeProvider::scripted(vec![
        (500, json!({})),
        (500, json!({})),
        (500, json!({})),
        (200, gemini_text("Too late.")),
    ]);
    let client = gemini(&fake, 2).await;

    assert!(client.generate("p").await.is_none());
    assert_eq!(fake.requests().len(), 3);
}

#[tokio::test]
async fn test_gemini_client_error_not_retried() {
    let fake = FakeProvider::scripted(vec![
        (400, json!({"error": {"message": "API key not valid"}})),
        (200, gemini_text("unreachable")),
    ]);
    let client = gemini(&fake, 3).await;

    assert!(client.generate("p").await.is_none());
    assert_eq!(fake.requests().len(), 1);
}

#[tokio::test]
async fn test_gemini_missing_candidates_is_none() {
    let fake = FakeProvider::scripted(vec![(200, json!({"candidates": []}))]);
    let client = gemini(&fake, 3).await;

    assert!(client.generate("p").await.is_none());
    assert_eq!(fake.requests().len(), 1);
}

#[tokio::test]
async fn test_gemini_blank_text_is_none() {
    let fake = FakeProvider::scripted(vec![(200, gemini_text("   \n"))]);
    let client = gemini(&fake, 3).await;
    assert!(client.generate("p").await.is_none());
}

#[tokio::test]
async fn test_empty_prompt_sends_nothing() {
    let fake = FakeProvider::scripted(vec![(200, gemini_text("x"))]);
    let client = gemini(&fake, 3).await;

    assert!(client.generate("   ").await.is_none());
    assert!(fake.requests().is_empty());
}

#[tokio::test]
async fn test_gemini_connection_error_does_not_log_key() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();

    let client = gemini_at(&closed_port().await, 1);
    assert!(client.generate("p").await.is_none());

    let out = logs.contents();
    assert!(out.contains("Gemini generation failed"), "{out}");
    assert!(out.contains("Retryable provider error"), "{out}");
    assert!(!out.contains(SECRET_KEY), "{out}");
}

#[tokio::test]
async fn test_gemini_status_and_shape_errors_do_not_log_key() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();

    let fake = FakeProvider::scripted(vec![
        (503, json!({"error": "overloaded"})),
        (200, json!("not an object")),
    ]);
    let client = gemini(&fake, 3).await;
    assert!(client.generate("p").await.is_none());
    assert_eq!(fake.requests().len(), 2);

    let out = logs.contents();
    assert!(out.contains("undecodable body"), "{out}");
    assert!(!out.contains(SECRET_KEY), "{out}");
}

// -- Ollama ----------------------------------------------------------------

#[tokio::test]
async fn test_ollama_success() {
    let fake = FakeProvider::scripted(vec![(200, ollama_text("Canal-side charm.\n"))]);
    let client = ollama(&fake, 3).await;

    assert_eq!(client.generate("Summarize").await.as_deref(), Some("Canal-side charm."));
    let requests = fake.requests();
    assert_eq!(requests[0].path, "/api/generate");
    assert_eq!(
        requests[0].body,
        json!({"model": "tiny-test", "prompt": "Summarize", "stream": false})
    );
}

#[tokio::test]
async fn test_ollama_base_url_may_name_generate_endpoint() {
    let fake = FakeProvider::scripted(vec![(200, ollama_text("Full endpoint."))]);
    let base = fake.serve().await;
    let cfg = OllamaConfig {
        base_url: format!("{base}/api/generate"),
        model: "tiny-test".into(),
        post_call_delay_ms: 0,
        ..OllamaConfig::default()
    };
    let client = OllamaClient::new(&cfg, fast_retry(0)).unwrap();

    assert_eq!(client.generate("p").await.as_deref(), Some("Full endpoint."));
    assert_eq!(fake.paths(), ["/api/generate"]);
}

#[tokio::test]
async fn test_ollama_pulls_missing_model_then_retries_once() {
    let fake = FakeProvider::scripted(vec![
        (404, json!({"error": "model 'tiny-test' not found"})),
        (200, ollama_text("After pull.")),
    ]);
    let client = ollama(&fake, 3).await;

    assert_eq!(client.generate("p").await.as_deref(), Some("After pull."));
    assert_eq!(fake.paths(), ["/api/generate", "/api/pull", "/api/generate"]);
    assert_eq!(fake.requests()[1].body, json!({"name": "tiny-test"}));
}

#[tokio::test]
async fn test_ollama_failed_pull_is_none() {
    let fake = FakeProvider::scripted(vec![
        (404, json!({"error": "not found"})),
        (200, ollama_text("unreachable")),
    ])
    .with_pull_status(500);
    let client = ollama(&fake, 3).await;

    assert!(client.generate("p").await.is_none());
    assert_eq!(fake.paths(), ["/api/generate", "/api/pull"]);
}

#[tokio::test]
async fn test_ollama_second_not_found_is_none() {
    let fake = FakeProvider::scripted(vec![
        (404, json!({"error": "not found"})),
        (404, json!({"error": "still not found"})),
    ]);
    let client = ollama(&fake, 3).await;

    assert!(client.generate("p").await.is_none());
    assert_eq!(fake.paths(), ["/api/generate", "/api/pull", "/api/generate"]);
}

#[tokio::test]
async fn test_ollama_empty_response_is_none() {
    let fake = FakeProvider::scripted(vec![(200, ollama_text("   "))]);
    let client = ollama(&fake, 3).await;

    assert!(client.generate("p").await.is_none());
    assert_eq!(fake.requests().len(), 1);
}

#[tokio::test]
async fn test_ollama_unreachable_is_none() {
    let cfg = OllamaConfig {
        base_url: closed_port().await,
        post_call_delay_ms: 0,
        ..OllamaConfig::default()
    };
    let client = OllamaClient::new(&cfg, fast_retry(1)).unwrap();
    assert!(client.generate("p").await.is_none());
}
