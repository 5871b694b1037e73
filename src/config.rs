//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every field has a default, so a missing file falls back to the
//! built-in configuration. Secrets (API keys) are referenced by env-var
//! name in the config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::llm::ProviderKind;
use crate::types::{EnrichError, JobKind};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub batch: BatchConfig,
    pub retry: RetryConfig,
    pub gemini: GeminiConfig,
    pub ollama: OllamaConfig,
    pub jobs: JobsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://hotels.db".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BatchConfig {
    /// Properties per batch when `--batch-size` is not given.
    pub default_batch_size: usize,
    /// Fixed pause after each property (ms).
    pub item_delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            default_batch_size: 2,
            item_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 1000,
            retry_statuses: vec![408, 429, 500, 502, 503, 504],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeminiConfig {
    /// Name of the env var holding the API key.
    pub api_key_env: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: "GEMINI_API_KEY".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            model: "gemini-1.5-flash".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub pull_timeout_secs: u64,
    /// Pause after every successful generation (ms).
    pub post_call_delay_ms: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2:1b".to_string(),
            timeout_secs: 60,
            pull_timeout_secs: 300,
            post_call_delay_ms: 2000,
        }
    }
}

/// Which provider each job talks to unless overridden on the command line.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct JobsConfig {
    pub titles: ProviderKind,
    pub descriptions: ProviderKind,
    pub summaries: ProviderKind,
    pub reviews: ProviderKind,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            titles: ProviderKind::Ollama,
            descriptions: ProviderKind::Gemini,
            summaries: ProviderKind::Ollama,
            reviews: ProviderKind::Gemini,
        }
    }
}

impl JobsConfig {
    pub fn provider_for(&self, job: JobKind) -> ProviderKind {
        match job {
            JobKind::RewriteTitles => self.titles,
            JobKind::Descriptions => self.descriptions,
            JobKind::Summaries => self.summaries,
            JobKind::Reviews => self.reviews,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise use the defaults.
    /// Environment overrides are applied either way.
    pub fn load_or_default(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::load(path)?
        } else {
            warn!(path, "Config file not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// `DATABASE_URL` and `OLLAMA_BASE_URL` take precedence over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                self.database.url = url;
            }
        }
        if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
            if !url.trim().is_empty() {
                self.ollama.base_url = url;
            }
        }
    }

    /// Reject settings the batch tool cannot run with.
    pub fn validate(&self) -> Result<(), EnrichError> {
        if self.database.url.trim().is_empty() {
            return Err(EnrichError::Config("database.url must not be empty".into()));
        }
        if self.batch.default_batch_size == 0 {
            return Err(EnrichError::Config(
                "batch.default_batch_size must be >= 1".into(),
            ));
        }
        if self.retry.max_retries > 0 && self.retry.retry_statuses.is_empty() {
            return Err(EnrichError::Config(
                "retry.retry_statuses must not be empty when max_retries > 0".into(),
            ));
        }
        for (name, value) in [
            ("gemini.base_url", &self.gemini.base_url),
            ("gemini.model", &self.gemini.model),
            ("ollama.base_url", &self.ollama.base_url),
            ("ollama.model", &self.ollama.model),
        ] {
            if value.trim().is_empty() {
                return Err(EnrichError::Config(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }

    /// Resolve the Gemini API key. A missing key is not fatal: requests
    /// will fail and be reported per item.
    pub fn gemini_api_key(&self) -> Option<SecretString> {
        match Self::resolve_env(&self.gemini.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Some(SecretString::new(key)),
            _ => None,
        }
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
