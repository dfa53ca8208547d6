use std::time::Instant;
use tracing::{debug, info};

use super::{ExecutionContext, OperationInput};
use crate::error::AppResult;
use crate::thought::{merge_state, Thought, ThoughtState};

/// Merges all input thoughts into one or more synthesized thoughts.
#[derive(Debug, Clone)]
pub struct Aggregate {
    num_responses: usize,
    thoughts: Vec<Thought>,
}

impl Aggregate {
    /// Request `num_responses` aggregation answers; each becomes one thought.
    pub fn new(num_responses: usize) -> Self {
        Self {
            num_responses,
            thoughts: Vec::new(),
        }
    }

    pub fn thoughts(&self) -> &[Thought] {
        &self.thoughts
    }

    pub(super) async fn execute(
        &mut self,
        input: OperationInput,
        ctx: &ExecutionContext<'_>,
    ) -> AppResult<()> {
        input.require_predecessor("Aggregate")?;
        if input.thoughts.is_empty() {
            debug!(operation_id = %input.operation_id, "Nothing to aggregate");
            return Ok(());
        }
        let start = Instant::now();

        let base_state = base_state(&input.thoughts);
        let states: Vec<ThoughtState> = input.thoughts.iter().map(|t| t.state().clone()).collect();

        let prompt = ctx.prompter.aggregation_prompt(&states);
        let texts = ctx.ask(&prompt, self.num_responses).await?;
        let merged = ctx.parser.parse_aggregation_answer(&states, &texts)?;

        for delta in merged.into_vec() {
            let mut state = base_state.clone();
            merge_state(&mut state, delta);
            self.thoughts.push(Thought::new(&ctx.thought_ids, state));
        }

        info!(
            operation_id = %input.operation_id,
            inputs = input.thoughts.len(),
            thoughts = self.thoughts.len(),
            latency_ms = start.elapsed().as_millis(),
            "Aggregate operation executed"
        );

        Ok(())
    }
}

/// Fold input states lowest score first, so the best thought's keys win.
/// Unscored thoughts rank as zero.
fn base_state(thoughts: &[Thought]) -> ThoughtState {
    let mut ordered: Vec<&Thought> = thoughts.iter().collect();
    ordered.sort_by(|a, b| a.score().unwrap_or(0.0).total_cmp(&b.score().unwrap_or(0.0)));

    let mut base = ThoughtState::new();
    for thought in ordered {
        merge_state(&mut base, thought.state().clone());
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thought::{state_from_value, IdSequence};
    use serde_json::json;

    #[test]
    fn test_base_state_prefers_higher_scores() {
        let ids = IdSequence::new();
        let mut best = Thought::new(&ids, state_from_value(json!({"summary": "best", "a": 1})));
        best.set_score(9.0);
        let mut worst = Thought::new(&ids, state_from_value(json!({"summary": "worst", "b": 2})));
        worst.set_score(1.0);

        let base = base_state(&[best, worst]);
        assert_eq!(base["summary"], json!("best"));
        assert_eq!(base["a"], json!(1));
        assert_eq!(base["b"], json!(2));
    }

    #[test]
    fn test_base_state_unscored_ranks_as_zero() {
        let ids = IdSequence::new();
        let unscored = Thought::new(&ids, state_from_value(json!({"k": "unscored"})));
        let mut negative = Thought::new(&ids, state_from_value(json!({"k": "negative"})));
        negative.set_score(-1.0);

        let base = base_state(&[unscored, negative]);
        assert_eq!(base["k"], json!("unscored"));
    }
}
