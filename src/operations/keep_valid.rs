use tracing::info;

use super::{ExecutionContext, OperationInput};
use crate::error::AppResult;
use crate::thought::Thought;

/// Drops thoughts explicitly validated false. Unvalidated thoughts pass.
#[derive(Debug, Clone, Default)]
pub struct KeepValid {
    thoughts: Vec<Thought>,
}

impl KeepValid {
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
        input.require_predecessor("KeepValid")?;
        self.thoughts = input
            .thoughts
            .iter()
            .filter(|t| t.valid() != Some(false))
            .map(|t| t.derive(&ctx.thought_ids))
            .collect();

        info!(
            operation_id = %input.operation_id,
            kept = self.thoughts.len(),
            dropped = input.thoughts.len() - self.thoughts.len(),
            "KeepValid operation executed"
        );
        Ok(())
    }
}
