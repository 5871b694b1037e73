//! Retry policy for transient provider failures.
//!
//! A `RetryPolicy` is built once from configuration and handed to each
//! client at construction. It classifies a failed attempt and drives
//! the exponential backoff loop shared by every provider.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RetryConfig;

/// Upper bound on a single backoff sleep.
const MAX_BACKOFF_MS: u64 = 30_000;

/// Why a single provider attempt produced no text.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response shape: {0}")]
    Shape(String),

    #[error("empty response")]
    Empty,
}

impl ProviderError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Bounded exponential backoff on a fixed set of status codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            backoff_base_ms: cfg.backoff_base_ms,
            retry_statuses: cfg.retry_statuses.clone(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Timeouts, connection failures and the configured statuses are
    /// retryable. Shape and empty-body failures are not.
    pub fn is_retryable(&self, error: &ProviderError) -> bool {
        match error {
            ProviderError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ProviderError::Status { status, .. } => self.retry_statuses.contains(status),
            ProviderError::Shape(_) | ProviderError::Empty => false,
        }
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
    /// capped at 30 seconds.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let delay = self
            .backoff_base_ms
            .saturating_mul(2u64.saturating_pow(exp));
        Duration::from_millis(delay.min(MAX_BACKOFF_MS))
    }

    /// Run `attempt` until it succeeds, fails permanently, or the retry
    /// budget is spent. Returns the last error on failure.
    pub async fn run<F, Fut>(&self, provider: &str, mut attempt: F) -> Result<String, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, ProviderError>>,
    {
        let mut tries = 0u32;
        loop {
            if tries > 0 {
                let delay = self.backoff(tries);
                debug!(
                    provider,
                    attempt = tries,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying provider call"
                );
                tokio::time::sleep(delay).await;
            }

            match attempt().await {
                Ok(text) => return Ok(text),
                Err(e) if tries < self.max_retries && self.is_retryable(&e) => {
                    warn!(provider, attempt = tries, error = %e, "Retryable provider error");
                    tries += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
