//! Local stand-in for the Gemini and Ollama HTTP APIs.
//!
//! Serves scripted status/body pairs in order from an axum router bound
//! to an ephemeral port, and records every request it receives.

use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One request as seen by the fake server.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub query: Option<String>,
    pub key: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct Inner {
    generate: VecDeque<(u16, Value)>,
    pull_status: u16,
    requests: Vec<Recorded>,
}

#[derive(Clone, Default)]
pub struct FakeProvider {
    inner: Arc<Mutex<Inner>>,
}

impl FakeProvider {
    /// Responses for generate calls, served in order. When the script
    /// runs out the server answers 500.
    pub fn scripted(responses: Vec<(u16, Value)>) -> Self {
        let fake = Self::default();
        {
            let mut inner = fake.inner.lock().unwrap();
            inner.generate = responses.into();
            inner.pull_status = 200;
        }
        fake
    }

    pub fn with_pull_status(self, status: u16) -> Self {
        self.inner.lock().unwrap().pull_status = status;
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.inner.lock().unwrap().requests.clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }

    /// Start serving; returns the base URL.
    pub async fn serve(&self) -> String {
        let app = Router::new()
            .route("/models/:action", post(gemini_generate))
            .route("/api/generate", post(ollama_generate))
            .route("/api/pull", post(ollama_pull))
            .with_state(self.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn record(&self, path: String, query: Option<String>, key: Option<String>, body: Value) {
        self.inner.lock().unwrap().requests.push(Recorded {
            path,
            query,
            key,
            body,
        });
    }

    fn next_generate(&self) -> (StatusCode, Json<Value>) {
        let (status, body) = self
            .inner
            .lock()
            .unwrap()
            .generate
            .pop_front()
            .unwrap_or((500, json!({"error": "script exhausted"})));
        (StatusCode::from_u16(status).unwrap(), Json(body))
    }
}

/// Gemini-shaped success body.
pub fn gemini_text(text: &str) -> Value {
    json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})
}

/// Ollama-shaped success body.
pub fn ollama_text(text: &str) -> Value {
    json!({"model": "test", "response": text, "done": true})
}

async fn gemini_generate(
    State(fake): State<FakeProvider>,
    Path(action): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let key = headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    fake.record(format!("/models/{action}"), query, key, body);
    fake.next_generate()
}

async fn ollama_generate(
    State(fake): State<FakeProvider>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    fake.record("/api/generate".into(), None, None, body);
    fake.next_generate()
}

async fn ollama_pull(State(fake): State<FakeProvider>, Json(body): Json<Value>) -> StatusCode {
    fake.record("/api/pull".into(), None, None, body);
    let status = fake.inner.lock().unwrap().pull_status;
    StatusCode::from_u16(status).unwrap()
}
