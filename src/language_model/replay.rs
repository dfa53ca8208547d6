use async_trait::async_trait;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::{estimate_tokens, LanguageModel, RawResponse, UsageSummary};
use crate::error::{AppError, AppResult, LanguageModelResult};

/// Offline model that answers every query from a fixed script of completions.
///
/// Completions are handed out in order across all queries and wrap around when
/// the script is exhausted, so a replay is fully deterministic. Every prompt is
/// recorded for inspection.
#[derive(Debug)]
pub struct ReplayModel {
    script: Vec<String>,
    inner: Mutex<ReplayState>,
}

#[derive(Debug, Default)]
struct ReplayState {
    cursor: usize,
    prompts: Vec<String>,
    usage: UsageSummary,
}

impl ReplayModel {
    /// Create a model replaying `script`.
    pub fn new<I, S>(script: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: script.into_iter().map(Into::into).collect(),
            inner: Mutex::new(ReplayState::default()),
        }
    }

    /// Load a script from a JSON file holding an array of strings.
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let script: Vec<String> = serde_json::from_str(&raw).map_err(|e| AppError::Config {
            message: format!("Replay file {} must be a JSON array of strings: {}", path.display(), e),
        })?;
        Ok(Self::new(script))
    }

    /// Prompts received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.state().prompts.clone()
    }

    fn state(&self) -> MutexGuard<'_, ReplayState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LanguageModel for ReplayModel {
    async fn query(
        &self,
        prompt: &str,
        num_responses: usize,
    ) -> LanguageModelResult<Vec<RawResponse>> {
        let mut state = self.state();
        state.prompts.push(prompt.to_string());

        let mut responses = Vec::with_capacity(num_responses);
        for _ in 0..num_responses {
            let response = if self.script.is_empty() {
                RawResponse::failed("replay script is empty")
            } else {
                let text = &self.script[state.cursor % self.script.len()];
                state.cursor += 1;
                RawResponse::text(text.clone()).with_model("replay")
            };
            state.usage.prompt_tokens += estimate_tokens(prompt);
            state.usage.completion_tokens += estimate_tokens(&response.content);
            responses.push(response);
        }

        debug!(
            num_responses = num_responses,
            cursor = state.cursor,
            "Replayed scripted completions"
        );
        Ok(responses)
    }

    fn usage(&self) -> UsageSummary {
        self.state().usage
    }
}
