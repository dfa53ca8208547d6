use std::time::Instant;
use tracing::{debug, info};

use super::{ExecutionContext, OperationInput};
use crate::error::AppResult;
use crate::thought::{merge_state, Thought};

/// Branches new thoughts from each input thought through the language model.
#[derive(Debug, Clone)]
pub struct Generate {
    num_branches_prompt: usize,
    num_branches_response: usize,
    thoughts: Vec<Thought>,
}

impl Generate {
    /// `num_branches_prompt` alternatives are asked for inside each prompt;
    /// `num_branches_response` completions are requested per prompt.
    pub fn new(num_branches_prompt: usize, num_branches_response: usize) -> Self {
        Self {
            num_branches_prompt,
            num_branches_response,
            thoughts: Vec::new(),
        }
    }

    pub fn num_branches_prompt(&self) -> usize {
        self.num_branches_prompt
    }

    pub fn num_branches_response(&self) -> usize {
        self.num_branches_response
    }

    pub fn thoughts(&self) -> &[Thought] {
        &self.thoughts
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
                    "No input thoughts reached non-root Generate, producing nothing"
                );
                return Ok(());
            }
            sources.push(ctx.seed_thought());
        }

        for source in &sources {
            let prompt = ctx
                .prompter
                .generate_prompt(self.num_branches_prompt, source.state());
            let texts = ctx.ask(&prompt, self.num_branches_response).await?;
            let deltas = ctx.parser.parse_generate_answer(source.state(), &texts)?;

            for delta in deltas {
                let mut state = source.state().clone();
                merge_state(&mut state, delta);
                self.thoughts.push(Thought::new(&ctx.thought_ids, state));
            }
        }

        info!(
            operation_id = %input.operation_id,
            sources = sources.len(),
            thoughts = self.thoughts.len(),
            latency_ms = start.elapsed().as_millis(),
            "Generate operation executed"
        );

        Ok(())
    }
}
