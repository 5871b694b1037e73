//! LLM integration for listing text generation.
//!
//! Defines the `TextGenerator` trait, the two provider implementations
//! (Gemini in the cloud, Ollama self-hosted) and the four derived
//! operations the enrichment jobs call.

pub mod gemini;
pub mod ollama;
pub mod prompts;
pub mod retry;
pub mod review;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use tracing::debug;

use crate::config::AppConfig;
use crate::types::{PropertyData, MAX_TITLE_LEN};
use gemini::GeminiClient;
use ollama::OllamaClient;
use retry::RetryPolicy;
use review::{parse_review, ReviewParse};

/// Abstraction over text-generation providers.
///
/// `generate` never errors: network failures, bad statuses, unexpected
/// shapes and empty output all come back as `None`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for a non-empty prompt.
    async fn generate(&self, prompt: &str) -> Option<String>;

    /// Provider identifier for logs.
    fn name(&self) -> &'static str;
}

/// Which provider backs a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    Ollama,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Gemini => write!(f, "gemini"),
            ProviderKind::Ollama => write!(f, "ollama"),
        }
    }
}

/// Construct the configured client for `kind`.
pub fn build_generator(kind: ProviderKind, cfg: &AppConfig) -> Result<Box<dyn TextGenerator>> {
    let retry = RetryPolicy::from(&cfg.retry);
    Ok(match kind {
        ProviderKind::Gemini => {
            Box::new(GeminiClient::new(&cfg.gemini, cfg.gemini_api_key(), retry)?)
        }
        ProviderKind::Ollama => Box::new(OllamaClient::new(&cfg.ollama, retry)?),
    })
}

// ---------------------------------------------------------------------------
// Derived operations
// ---------------------------------------------------------------------------

/// Rewrite a listing title. Quotes the model wraps around it are dropped
/// and the result is cut to the title column width.
pub async fn rewrite_title(generator: &dyn TextGenerator, data: &PropertyData) -> Option<String> {
    let raw = generator.generate(&prompts::title_prompt(data)).await?;
    let title = clean_title(&raw);
    if title.is_empty() {
        debug!(provider = generator.name(), "Title was empty after cleanup");
        return None;
    }
    Some(title)
}

pub async fn generate_description(
    generator: &dyn TextGenerator,
    data: &PropertyData,
) -> Option<String> {
    generator.generate(&prompts::description_prompt(data)).await
}

pub async fn generate_summary(
    generator: &dyn TextGenerator,
    data: &PropertyData,
) -> Option<String> {
    generator.generate(&prompts::summary_prompt(data)).await
}

/// Generate and parse a rating + review pair. `None` means the provider
/// returned nothing at all; parse problems degrade inside `ReviewParse`.
pub async fn generate_review(
    generator: &dyn TextGenerator,
    data: &PropertyData,
) -> Option<ReviewParse> {
    let text = generator.generate(&prompts::review_prompt(data)).await?;
    Some(parse_review(&text, data.fallback_rating()))
}

fn clean_title(raw: &str) -> String {
    let first_line = raw.trim().lines().next().unwrap_or_default();
    let unquoted = first_line
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '*')
        .trim();
    unquoted.chars().take(MAX_TITLE_LEN).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
