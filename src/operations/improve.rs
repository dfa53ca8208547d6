use tracing::debug;

use super::{ExecutionContext, OperationInput};
use crate::error::AppResult;
use crate::thought::Thought;

/// Copies every input thought unchanged.
#[derive(Debug, Clone, Default)]
pub struct Improve {
    thoughts: Vec<Thought>,
}

impl Improve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thoughts(&self) -> &[Thought] {
        &self.thoughts
    }

    pub(super) fn execute(
        &mut self,
        input: OperationInput,
        ctx: &ExecutionContext<'_>,
    ) -> AppResult<()> {
        input.require_predecessor("Improve")?;
        self.thoughts = input
            .thoughts
            .iter()
            .map(|t| t.derive(&ctx.thought_ids))
            .collect();
        debug!(operation_id = %input.operation_id, thoughts = self.thoughts.len(), "Improve operation executed");
        Ok(())
    }
}
