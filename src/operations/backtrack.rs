use serde_json::json;
use std::time::Instant;
use tracing::info;

use super::{ExecutionContext, OperationInput};
use crate::error::AppResult;
use crate::thought::{merge_state, Thought};

/// State key explaining why a thought was regenerated.
pub const BACKTRACK_REASON_KEY: &str = "backtrack_reason";

/// Regenerates the input thoughts when their average score falls below a
/// threshold; otherwise passes them through.
///
/// Unscored thoughts count as zero. Regenerated thoughts come from one
/// generate prompt per input, carry [`BACKTRACK_REASON_KEY`] and are unscored.
#[derive(Debug, Clone)]
pub struct Backtrack {
    quality_threshold: f64,
    thoughts: Vec<Thought>,
    backtracked: bool,
}

impl Backtrack {
    pub fn new(quality_threshold: f64) -> Self {
        Self {
            quality_threshold,
            thoughts: Vec::new(),
            backtracked: false,
        }
    }

    pub fn quality_threshold(&self) -> f64 {
        self.quality_threshold
    }

    pub fn thoughts(&self) -> &[Thought] {
        &self.thoughts
    }

    /// Whether the last execution regenerated its inputs.
    pub fn backtracked(&self) -> bool {
        self.backtracked
    }

    pub(super) async fn execute(
        &mut self,
        input: OperationInput,
        ctx: &ExecutionContext<'_>,
    ) -> AppResult<()> {
        input.require_predecessor("Backtrack")?;
        if input.thoughts.is_empty() {
            return Ok(());
        }

        let start = Instant::now();
        let average = input
            .thoughts
            .iter()
            .map(|t| t.score().unwrap_or(0.0))
            .sum::<f64>()
            / input.thoughts.len() as f64;

        if average >= self.quality_threshold {
            self.thoughts = input
                .thoughts
                .iter()
                .map(|t| t.derive(&ctx.thought_ids))
                .collect();
        } else {
            self.backtracked = true;
            let reason = format!(
                "average score {:.2} below threshold {:.2}",
                average, self.quality_threshold
            );
            for source in &input.thoughts {
                let prompt = ctx.prompter.generate_prompt(1, source.state());
                let texts = ctx.ask(&prompt, 1).await?;
                let deltas = ctx.parser.parse_generate_answer(source.state(), &texts)?;

                let mut state = source.state().clone();
                if let Some(delta) = deltas.into_iter().next() {
                    merge_state(&mut state, delta);
                }
                state.insert(BACKTRACK_REASON_KEY.to_string(), json!(reason));
                self.thoughts.push(Thought::new(&ctx.thought_ids, state));
            }
        }

        info!(
            operation_id = %input.operation_id,
            average_score = average,
            threshold = self.quality_threshold,
            backtracked = self.backtracked,
            thoughts = self.thoughts.len(),
            latency_ms = start.elapsed().as_millis(),
            "Backtrack operation executed"
        );
        Ok(())
    }
}
