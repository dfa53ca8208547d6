use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::{ExecutionContext, OperationInput};
use crate::error::AppResult;
use crate::thought::{Thought, ThoughtState};

/// Decides whether a state is valid.
pub type Validator = Arc<dyn Fn(&ThoughtState) -> bool + Send + Sync>;

/// How ValidateAndImprove judges each attempt.
#[derive(Clone, Default)]
pub enum Validation {
    /// Every attempt is valid.
    #[default]
    AlwaysValid,
    /// A caller-supplied predicate.
    Function(Validator),
    /// Ask the language model with the validation prompt.
    LanguageModel,
}

impl fmt::Debug for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validation::AlwaysValid => f.write_str("AlwaysValid"),
            Validation::Function(_) => f.write_str("Function"),
            Validation::LanguageModel => f.write_str("LanguageModel"),
        }
    }
}

/// Validates each input thought and repairs invalid ones, up to a bounded
/// number of attempts.
///
/// Every attempt is kept per input. Successors only see the last attempt.
#[derive(Debug, Clone)]
pub struct ValidateAndImprove {
    num_samples: usize,
    improve: bool,
    num_tries: usize,
    validation: Validation,
    attempts: Vec<Vec<Thought>>,
}

impl ValidateAndImprove {
    /// `num_tries` is the total number of attempts recorded per input, at
    /// least one. `num_samples` responses are requested per model call.
    pub fn new(num_samples: usize, improve: bool, num_tries: usize) -> Self {
        Self {
            num_samples,
            improve,
            num_tries: num_tries.max(1),
            validation: Validation::AlwaysValid,
            attempts: Vec::new(),
        }
    }

    /// Validate with a predicate over state.
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&ThoughtState) -> bool + Send + Sync + 'static,
    {
        self.validation = Validation::Function(Arc::new(validator));
        self
    }

    /// Validate by asking the language model.
    pub fn with_model_validation(self) -> Self {
        self.with_validation(Validation::LanguageModel)
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    pub fn num_tries(&self) -> usize {
        self.num_tries
    }

    /// Last attempt per input thought.
    pub fn thoughts(&self) -> Vec<&Thought> {
        self.attempts.iter().filter_map(|history| history.last()).collect()
    }

    /// Full attempt history per input thought, oldest first.
    pub fn attempts(&self) -> &[Vec<Thought>] {
        &self.attempts
    }

    pub(super) async fn execute(
        &mut self,
        input: OperationInput,
        ctx: &ExecutionContext<'_>,
    ) -> AppResult<()> {
        input.require_predecessor("ValidateAndImprove")?;
        let start = Instant::now();

        for source in &input.thoughts {
            let mut history: Vec<Thought> = Vec::new();
            let mut current = source.derive(&ctx.thought_ids);

            loop {
                let valid = self.validate(current.state(), ctx).await?;
                current.set_valid(valid);
                history.push(current.clone());

                if !self.improve || valid || history.len() >= self.num_tries {
                    break;
                }

                debug!(
                    operation_id = %input.operation_id,
                    thought_id = %current.id(),
                    attempt = history.len(),
                    "Thought failed validation, improving"
                );
                current = self.improve_attempt(&current, ctx).await?;
            }

            self.attempts.push(history);
        }

        info!(
            operation_id = %input.operation_id,
            inputs = input.thoughts.len(),
            attempts = self.attempts.iter().map(Vec::len).sum::<usize>(),
            valid = self.thoughts().iter().filter(|t| t.valid() == Some(true)).count(),
            latency_ms = start.elapsed().as_millis(),
            "ValidateAndImprove operation executed"
        );

        Ok(())
    }

    async fn validate(&self, state: &ThoughtState, ctx: &ExecutionContext<'_>) -> AppResult<bool> {
        match &self.validation {
            Validation::AlwaysValid => Ok(true),
            Validation::Function(validator) => Ok(validator(state)),
            Validation::LanguageModel => {
                let prompt = ctx.prompter.validation_prompt(state);
                let texts = ctx.ask(&prompt, self.num_samples).await?;
                Ok(ctx.parser.parse_validation_answer(state, &texts)?)
            }
        }
    }

    async fn improve_attempt(
        &self,
        attempt: &Thought,
        ctx: &ExecutionContext<'_>,
    ) -> AppResult<Thought> {
        let prompt = ctx.prompter.improve_prompt(attempt.state());
        let texts = ctx.ask(&prompt, self.num_samples).await?;
        let delta = ctx.parser.parse_improve_answer(attempt.state(), &texts)?;
        Ok(attempt.derive_with(&ctx.thought_ids, delta))
    }
}
