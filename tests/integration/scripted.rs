//! Scripted generator for integration testing.
//!
//! Provides a deterministic `TextGenerator` that replays a fixed list
//! of responses in order and records every prompt it was given.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use hotel_enricher::llm::TextGenerator;

/// Replays canned responses; `None` entries simulate provider failure.
/// Once the script runs out every call returns `None`.
#[derive(Clone, Default)]
pub struct ScriptedGenerator {
    responses: Arc<Mutex<VecDeque<Option<String>>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            responses: Arc::new(Mutex::new(
                responses.into_iter().map(|r| r.map(Into::into)).collect(),
            )),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Same response for every call.
    pub fn always(text: &str, times: usize) -> Self {
        Self::new(std::iter::repeat(Some(text.to_string())).take(times))
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Option<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses.lock().unwrap().pop_front().flatten()
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
