use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::{ExecutionContext, OperationInput};
use crate::error::AppResult;
use crate::thought::Thought;

/// Chooses, filters or reshapes a list of thoughts.
pub type Selection = Arc<dyn Fn(&[Thought]) -> Vec<Thought> + Send + Sync>;

/// Applies a caller-supplied selection to the input thoughts.
///
/// A root selector runs on a seed thought built from the problem parameters,
/// which makes it the usual entry point for fanning one input out into
/// per-partition branches.
#[derive(Clone)]
pub struct Selector {
    selection: Selection,
    thoughts: Vec<Thought>,
}

impl Selector {
    pub fn new<F>(selection: F) -> Self
    where
        F: Fn(&[Thought]) -> Vec<Thought> + Send + Sync + 'static,
    {
        Self {
            selection: Arc::new(selection),
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
        let sources = if input.is_root() && input.thoughts.is_empty() {
            vec![ctx.seed_thought()]
        } else {
            input.thoughts
        };

        self.thoughts = (self.selection)(&sources)
            .iter()
            .map(|t| t.derive(&ctx.thought_ids))
            .collect();

        debug!(
            operation_id = %input.operation_id,
            inputs = sources.len(),
            selected = self.thoughts.len(),
            "Selector operation executed"
        );
        Ok(())
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("thoughts", &self.thoughts)
            .finish_non_exhaustive()
    }
}
