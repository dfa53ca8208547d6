use tracing::info;

use super::{ExecutionContext, OperationInput};
use crate::error::{AppResult, StructuralError};
use crate::thought::Thought;

/// Keeps the `n` best scored thoughts. Ties keep their input order.
#[derive(Debug, Clone)]
pub struct KeepBestN {
    n: usize,
    higher_is_better: bool,
    thoughts: Vec<Thought>,
}

impl KeepBestN {
    /// Fails with [`StructuralError::InvalidKeepCount`] when `n` is zero.
    pub fn new(n: usize, higher_is_better: bool) -> Result<Self, StructuralError> {
        if n == 0 {
            return Err(StructuralError::InvalidKeepCount);
        }
        Ok(Self {
            n,
            higher_is_better,
            thoughts: Vec::new(),
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn thoughts(&self) -> &[Thought] {
        &self.thoughts
    }

    pub(super) fn execute(
        &mut self,
        input: OperationInput,
        ctx: &ExecutionContext<'_>,
    ) -> AppResult<()> {
        input.require_predecessor("KeepBestN")?;

        let mut ranked = Vec::with_capacity(input.thoughts.len());
        for thought in &input.thoughts {
            match thought.score() {
                Some(score) => ranked.push((score, thought)),
                None => {
                    return Err(StructuralError::UnscoredThought {
                        operation_id: input.operation_id,
                        thought_id: thought.id(),
                    }
                    .into())
                }
            }
        }

        // sort_by is stable, so equal scores stay in input order either way
        if self.higher_is_better {
            ranked.sort_by(|(a, _), (b, _)| b.total_cmp(a));
        } else {
            ranked.sort_by(|(a, _), (b, _)| a.total_cmp(b));
        }

        self.thoughts = ranked
            .into_iter()
            .take(self.n)
            .map(|(_, thought)| thought.derive(&ctx.thought_ids))
            .collect();

        info!(
            operation_id = %input.operation_id,
            kept = self.thoughts.len(),
            candidates = input.thoughts.len(),
            best_score = ?self.thoughts.first().and_then(Thought::score),
            "KeepBestN operation executed"
        );

        Ok(())
    }
}
