use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::{ExecutionContext, OperationInput};
use crate::error::{AppResult, CollaboratorError};
use crate::thought::{Thought, ThoughtState};

/// Scores a single state.
pub type StateScorer = Arc<dyn Fn(&ThoughtState) -> f64 + Send + Sync>;

/// Scores a batch of states, one score per state in order.
pub type BatchScorer = Arc<dyn Fn(&[ThoughtState]) -> Vec<f64> + Send + Sync>;

/// A caller-supplied scoring function. Takes precedence over the model.
#[derive(Clone)]
pub enum ScoringFunction {
    PerState(StateScorer),
    Batch(BatchScorer),
}

impl ScoringFunction {
    /// Wrap a per-state closure.
    pub fn per_state<F>(f: F) -> Self
    where
        F: Fn(&ThoughtState) -> f64 + Send + Sync + 'static,
    {
        ScoringFunction::PerState(Arc::new(f))
    }

    /// Wrap a batch closure.
    pub fn batch<F>(f: F) -> Self
    where
        F: Fn(&[ThoughtState]) -> Vec<f64> + Send + Sync + 'static,
    {
        ScoringFunction::Batch(Arc::new(f))
    }

    fn score_all(&self, states: &[ThoughtState]) -> Vec<f64> {
        match self {
            ScoringFunction::PerState(f) => states.iter().map(|s| f(s)).collect(),
            ScoringFunction::Batch(f) => f(states),
        }
    }

    fn score_one(&self, state: &ThoughtState) -> Option<f64> {
        match self {
            ScoringFunction::PerState(f) => Some(f(state)),
            ScoringFunction::Batch(f) => f(std::slice::from_ref(state)).first().copied(),
        }
    }
}

impl fmt::Debug for ScoringFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringFunction::PerState(_) => f.write_str("ScoringFunction::PerState"),
            ScoringFunction::Batch(_) => f.write_str("ScoringFunction::Batch"),
        }
    }
}

/// Attaches a score to a copy of every input thought.
#[derive(Debug, Clone)]
pub struct Score {
    num_samples: usize,
    combined: bool,
    scoring_function: Option<ScoringFunction>,
    thoughts: Vec<Thought>,
}

impl Score {
    /// Score through the language model, requesting `num_samples` answers per
    /// prompt. With `combined` all inputs share one prompt.
    pub fn new(num_samples: usize, combined: bool) -> Self {
        Self {
            num_samples,
            combined,
            scoring_function: None,
            thoughts: Vec::new(),
        }
    }

    /// Score with `function` instead of the language model.
    pub fn with_function(mut self, function: ScoringFunction) -> Self {
        self.scoring_function = Some(function);
        self
    }

    pub fn is_combined(&self) -> bool {
        self.combined
    }

    pub fn thoughts(&self) -> &[Thought] {
        &self.thoughts
    }

    pub(super) async fn execute(
        &mut self,
        input: OperationInput,
        ctx: &ExecutionContext<'_>,
    ) -> AppResult<()> {
        input.require_predecessor("Score")?;
        let start = Instant::now();

        let scores = if self.combined {
            self.score_combined(&input, ctx).await?
        } else {
            self.score_independently(&input, ctx).await?
        };

        if scores.len() != input.thoughts.len() {
            warn!(
                operation_id = %input.operation_id,
                thoughts = input.thoughts.len(),
                scores = scores.len(),
                "Score count does not match thought count, extra entries ignored"
            );
        }

        for (source, score) in input.thoughts.iter().zip(scores) {
            let mut scored = source.derive(&ctx.thought_ids);
            scored.set_score(score);
            self.thoughts.push(scored);
        }

        info!(
            operation_id = %input.operation_id,
            combined = self.combined,
            thoughts = self.thoughts.len(),
            latency_ms = start.elapsed().as_millis(),
            "Score operation executed"
        );

        Ok(())
    }

    async fn score_combined(
        &self,
        input: &OperationInput,
        ctx: &ExecutionContext<'_>,
    ) -> AppResult<Vec<f64>> {
        if input.thoughts.is_empty() {
            return Ok(Vec::new());
        }
        let states: Vec<ThoughtState> = input.thoughts.iter().map(|t| t.state().clone()).collect();

        match &self.scoring_function {
            Some(function) => Ok(function.score_all(&states)),
            None => {
                let prompt = ctx.prompter.score_prompt(&states);
                let texts = ctx.ask(&prompt, self.num_samples).await?;
                Ok(ctx.parser.parse_score_answer(&states, &texts)?)
            }
        }
    }

    async fn score_independently(
        &self,
        input: &OperationInput,
        ctx: &ExecutionContext<'_>,
    ) -> AppResult<Vec<f64>> {
        let missing = || CollaboratorError::MissingScore {
            operation_id: input.operation_id,
        };
        let mut scores = Vec::with_capacity(input.thoughts.len());

        for thought in &input.thoughts {
            let score = match &self.scoring_function {
                Some(function) => function.score_one(thought.state()).ok_or_else(missing)?,
                None => {
                    let states = std::slice::from_ref(thought.state());
                    let prompt = ctx.prompter.score_prompt(states);
                    let texts = ctx.ask(&prompt, self.num_samples).await?;
                    ctx.parser
                        .parse_score_answer(states, &texts)?
                        .first()
                        .copied()
                        .ok_or_else(missing)?
                }
            };
            scores.push(score);
        }

        Ok(scores)
    }
}
