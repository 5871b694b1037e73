//! Ollama provider for locally hosted models.
//!
//! Talks to an Ollama instance via its HTTP API. No authentication.
//! A 404 from `/api/generate` means the model has not been pulled yet:
//! the client pulls it and retries the generation exactly once.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::retry::{ProviderError, RetryPolicy};
use super::TextGenerator;
use crate::config::OllamaConfig;

/// Ollama `/api/generate` request body.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Ollama `/api/generate` response.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Ollama `/api/pull` request body.
#[derive(Debug, Serialize)]
struct PullRequest<'a> {
    name: &'a str,
}

pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: String,
    timeout: Duration,
    pull_timeout: Duration,
    post_call_delay: Duration,
    retry: RetryPolicy,
}

impl OllamaClient {
    pub fn new(cfg: &OllamaConfig, retry: RetryPolicy) -> Result<Self> {
        let http = Client::builder()
            .build()
            .context("Failed to build Ollama HTTP client")?;

        Ok(Self {
            http,
            base_url: server_root(&cfg.base_url),
            model: cfg.model.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
            pull_timeout: Duration::from_secs(cfg.pull_timeout_secs),
            post_call_delay: Duration::from_millis(cfg.post_call_delay_ms),
            retry,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url)
    }

    async fn attempt(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .http
            .post(self.url("generate"))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

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
            .map_err(|e| ProviderError::Shape(format!("undecodable body: {e}")))?;

        let text = parsed.response.trim().to_string();
        if text.is_empty() {
            return Err(ProviderError::Empty);
        }
        Ok(text)
    }

    /// Ask the server to download the configured model.
    pub async fn pull_model(&self) -> bool {
        info!(model = %self.model, "Model not found, pulling");
        let result = self
            .http
            .post(self.url("pull"))
            .timeout(self.pull_timeout)
            .json(&PullRequest { name: &self.model })
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match result {
            Ok(_) => {
                info!(model = %self.model, "Model pulled");
                true
            }
            Err(e) => {
                warn!(model = %self.model, error = %e, "Model pull failed");
                false
            }
        }
    }

    async fn generate_with_pull(&self, prompt: &str) -> Result<String, ProviderError> {
        match self.retry.run("ollama", || self.attempt(prompt)).await {
            Err(e) if e.status() == Some(404) => {
                if !self.pull_model().await {
                    return Err(e);
                }
                self.retry.run("ollama", || self.attempt(prompt)).await
            }
            other => other,
        }
    }
}

/// Accept either the server root or a full `/api/generate` endpoint.
fn server_root(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    url.strip_suffix("/api/generate")
        .unwrap_or(url)
        .trim_end_matches('/')
        .to_string()
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, prompt: &str) -> Option<String> {
        if prompt.trim().is_empty() {
            warn!(provider = "ollama", "Refusing to send an empty prompt");
            return None;
        }

        debug!(model = %self.model, prompt_len = prompt.len(), "Requesting Ollama generation");

        match self.generate_with_pull(prompt).await {
            Ok(text) => {
                if !self.post_call_delay.is_zero() {
                    tokio::time::sleep(self.post_call_delay).await;
                }
                Some(text)
            }
            Err(ProviderError::Transport(e)) if e.is_timeout() => {
                warn!(
                    model = %self.model,
                    timeout_secs = self.timeout.as_secs(),
                    "Ollama timed out; consider raising ollama.timeout_secs"
                );
                None
            }
            Err(e) => {
                warn!(model = %self.model, error = %e, "Ollama generation failed");
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}
