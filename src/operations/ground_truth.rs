use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use super::{ExecutionContext, OperationInput};
use crate::error::AppResult;
use crate::thought::{Thought, ThoughtState};

/// Decides whether a state solves the problem.
pub type GroundTruthEvaluator = Arc<dyn Fn(&ThoughtState) -> anyhow::Result<bool> + Send + Sync>;

/// Labels a copy of every input thought solved or unsolved.
///
/// Evaluator errors never propagate; they count as unsolved.
#[derive(Clone)]
pub struct GroundTruth {
    evaluator: GroundTruthEvaluator,
    thoughts: Vec<Thought>,
}

impl GroundTruth {
    pub fn new<F>(evaluator: F) -> Self
    where
        F: Fn(&ThoughtState) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Self {
            evaluator: Arc::new(evaluator),
            thoughts: Vec::new(),
        }
    }

    pub fn thoughts(&self) -> &[Thought] {
        &self.thoughts
    }

    pub(super) fn execute(
        &mut self,
        input: OperationInput,
        ctx: &ExecutionContext<'_>,
    ) -> AppResult<()> {
        input.require_predecessor("GroundTruth")?;

        for source in &input.thoughts {
            let solved = (self.evaluator)(source.state()).unwrap_or_else(|e| {
                debug!(
                    operation_id = %input.operation_id,
                    thought_id = %source.id(),
                    error = %e,
                    "Ground truth evaluator failed, treating as unsolved"
                );
                false
            });
            let mut labelled = source.derive(&ctx.thought_ids);
            labelled.set_solved(solved);
            self.thoughts.push(labelled);
        }

        info!(
            operation_id = %input.operation_id,
            thoughts = self.thoughts.len(),
            solved = self.thoughts.iter().filter(|t| t.solved() == Some(true)).count(),
            "GroundTruth operation executed"
        );

        Ok(())
    }
}

impl fmt::Debug for GroundTruth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroundTruth")
            .field("thoughts", &self.thoughts)
            .finish_non_exhaustive()
    }
}
