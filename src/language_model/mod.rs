//! Language model seam used by operations.
//!
//! Operations only talk to a model through [`LanguageModel`]. The crate ships
//! two implementations: [`crate::langbase::LangbaseModel`] for live runs over
//! HTTP and [`ReplayModel`] for deterministic offline replay.

mod replay;

pub use replay::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LanguageModelResult;

/// One completion returned by a language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    /// Completion text. Empty when the call failed.
    pub content: String,
    /// Model that produced the completion, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Error text for a degraded response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RawResponse {
    /// A successful completion.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: None,
            error: None,
        }
    }

    /// An empty stand-in for a completion that could not be produced.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            model: None,
            error: Some(error.into()),
        }
    }

    /// Attach the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Token and cost counters accumulated by a model over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    /// Prompt tokens consumed.
    pub prompt_tokens: u64,
    /// Completion tokens produced.
    pub completion_tokens: u64,
    /// Cost in dollars.
    pub cost: f64,
}

/// A language model that answers prompts with one or more completions.
///
/// Implementations that cannot produce text should prefer returning one
/// [`RawResponse::failed`] per requested response over an error, so that the
/// number of responses stays predictable. An `Err` aborts the run.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Ask the model `num_responses` independent completions for `prompt`.
    async fn query(&self, prompt: &str, num_responses: usize)
        -> LanguageModelResult<Vec<RawResponse>>;

    /// Extract the completion texts, in order.
    fn response_texts(&self, responses: &[RawResponse]) -> Vec<String> {
        responses.iter().map(|r| r.content.clone()).collect()
    }

    /// Token and cost counters so far.
    fn usage(&self) -> UsageSummary {
        UsageSummary::default()
    }
}

/// Rough token estimate for text when the API does not report usage.
pub(crate) fn estimate_tokens(text: &str) -> u64 {
    (text.split_whitespace().count() as f64 * 1.3) as u64
}
