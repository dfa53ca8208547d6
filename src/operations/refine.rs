use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, info};

use super::{ExecutionContext, OperationInput};
use crate::error::AppResult;
use crate::thought::{merge_state, Thought, ThoughtState};

/// State key counting how many refinements a thought has been through.
pub const REFINEMENT_COUNT_KEY: &str = "refinement_count";

/// Refinements already applied to `state`.
pub fn refinement_count(state: &ThoughtState) -> u64 {
    state
        .get(REFINEMENT_COUNT_KEY)
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// Asks the language model for one improved version of each input thought.
///
/// The refinement count travels in the state, so chained Refine operations
/// share one cap. Thoughts already at the cap pass through unchanged.
/// Refined thoughts are new and unscored.
#[derive(Debug, Clone)]
pub struct Refine {
    max_refinements: u64,
    thoughts: Vec<Thought>,
    refined: usize,
}

impl Refine {
    pub fn new(max_refinements: u64) -> Self {
        Self {
            max_refinements,
            thoughts: Vec::new(),
            refined: 0,
        }
    }

    pub fn max_refinements(&self) -> u64 {
        self.max_refinements
    }

    pub fn thoughts(&self) -> &[Thought] {
        &self.thoughts
    }

    /// How many thoughts the last execution sent to the model.
    pub fn refined(&self) -> usize {
        self.refined
    }

    pub(super) async fn execute(
        &mut self,
        input: OperationInput,
        ctx: &ExecutionContext<'_>,
    ) -> AppResult<()> {
        let start = Instant::now();
        let is_root = input.is_root();
        let mut sources = input.thoughts;

        if sources.is_empty() {
            if !is_root {
                debug!(
                    operation_id = %input.operation_id,
                    "No input thoughts reached non-root Refine, producing nothing"
                );
                return Ok(());
            }
            sources.push(ctx.seed_thought());
        }

        for source in &sources {
            let count = refinement_count(source.state());
            if count >= self.max_refinements {
                self.thoughts.push(source.derive(&ctx.thought_ids));
                continue;
            }

            let prompt = ctx.prompter.refine_prompt(source.state());
            let texts = ctx.ask(&prompt, 1).await?;
            let delta = ctx.parser.parse_improve_answer(source.state(), &texts)?;

            let mut state = source.state().clone();
            merge_state(&mut state, delta);
            state.insert(REFINEMENT_COUNT_KEY.to_string(), json!(count + 1));
            self.thoughts.push(Thought::new(&ctx.thought_ids, state));
            self.refined += 1;
        }

        info!(
            operation_id = %input.operation_id,
            sources = sources.len(),
            refined = self.refined,
            latency_ms = start.elapsed().as_millis(),
            "Refine operation executed"
        );
        Ok(())
    }
}
