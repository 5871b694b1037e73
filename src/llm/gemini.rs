//! Google Gemini integration.
//!
//! Implements `TextGenerator` over the `generateContent` REST endpoint.
//! Every failure (transport, status, shape, empty text) is logged and
//! collapsed to `None` at the trait boundary.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::retry::{ProviderError, RetryPolicy};
use super::TextGenerator;
use crate::config::GeminiConfig;

const API_KEY_HEADER: &str = "x-goog-api-key";

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// `candidates[0].content.parts[0].text`, or a shape error naming
    /// the first missing level.
    fn into_text(self) -> Result<String, ProviderError> {
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Shape("no candidates".into()))?;
        let content = candidate
            .content
            .ok_or_else(|| ProviderError::Shape("candidate has no content".into()))?;
        let part = content
            .parts
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Shape("content has no parts".into()))?;
        let text = part
            .text
            .ok_or_else(|| ProviderError::Shape("part has no text".into()))?;

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(ProviderError::Empty);
        }
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct GeminiClient {
    http: Client,
    api_key: Option<SecretString>,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(
        cfg: &GeminiConfig,
        api_key: Option<SecretString>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("Failed to build Gemini HTTP client")?;

        if api_key.is_none() {
            warn!(
                env = %cfg.api_key_env,
                "No Gemini API key configured; requests will be rejected"
            );
        }

        Ok(Self {
            http,
            api_key,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            retry,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// `{base_url}/{model}:generateContent`; the key goes in a header.
    fn endpoint(&self) -> String {
        format!(
            "{}/{}:generateContent",
            self.base_url,
            urlencoding::encode(&self.model)
        )
    }

    async fn attempt(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let mut request = self.http.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key.expose_secret().as_str());
        }

        // Errors are logged, so they must not carry the request URL.
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.without_url()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| {
                ProviderError::Shape(format!("undecodable body: {}", e.without_url()))
            })?;
        parsed.into_text()
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Option<String> {
        if prompt.trim().is_empty() {
            warn!(provider = "gemini", "Refusing to send an empty prompt");
            return None;
        }

        debug!(model = %self.model, prompt_len = prompt.len(), "Requesting Gemini generation");

        match self.retry.run("gemini", || self.attempt(prompt)).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(model = %self.model, error = %e, "Gemini generation failed");
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
