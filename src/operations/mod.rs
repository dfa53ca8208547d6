//! Operations: the nodes of a graph of operations.
//!
//! Each operation consumes the thoughts of its predecessors and produces its
//! own. The transformation policy is one of a closed set of variants:
//! - [`Generate`]: branch new thoughts through the language model
//! - [`Score`]: attach scores, by function or by model
//! - [`KeepBestN`]: deterministic top-N filter over scored thoughts
//! - [`Aggregate`]: merge several thoughts into synthesized ones
//! - [`GroundTruth`]: label thoughts solved/unsolved with an evaluator
//! - [`ValidateAndImprove`]: bounded validate/repair loop per thought
//! - [`Improve`]: identity pass-through
//! - [`KeepValid`]: drop thoughts explicitly validated false
//! - [`Selector`]: caller-supplied selection or fan-out
//! - [`Refine`]: bounded model refinement tracked in the state
//! - [`Backtrack`]: regenerate when the average score is too low
//!
//! Operations live in a [`crate::graph::GraphOfOperations`] arena and refer to
//! each other by [`OperationId`].

mod aggregate;
mod backtrack;
mod generate;
mod ground_truth;
mod improve;
mod keep_best_n;
mod keep_valid;
mod refine;
mod score;
mod selector;
mod validate_and_improve;

pub use aggregate::*;
pub use backtrack::*;
pub use generate::*;
pub use ground_truth::*;
pub use improve::*;
pub use keep_best_n::*;
pub use keep_valid::*;
pub use refine::*;
pub use score::*;
pub use selector::*;
pub use validate_and_improve::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::{AppResult, StructuralError};
use crate::language_model::LanguageModel;
use crate::parser::ResponseParser;
use crate::prompts::Prompter;
use crate::thought::{IdSequence, Thought, ThoughtState};


/// Index of an operation inside its graph. Assigned in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(usize);

impl OperationId {
    /// Wrap a raw index.
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position of the operation in its graph.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// Collaborators and run parameters handed to every executing operation.
pub struct ExecutionContext<'a> {
    /// Model answering prompts.
    pub lm: &'a dyn LanguageModel,
    /// Prompt builder.
    pub prompter: &'a dyn Prompter,
    /// Completion parser.
    pub parser: &'a dyn ResponseParser,
    /// Problem parameters; the implicit seed state of root operations.
    pub problem_parameters: &'a ThoughtState,
    /// Identifier source for new thoughts.
    pub thought_ids: IdSequence,
}

impl ExecutionContext<'_> {
    /// A fresh thought holding the problem parameters.
    pub fn seed_thought(&self) -> Thought {
        Thought::new(&self.thought_ids, self.problem_parameters.clone())
    }

    /// Query the model and return the completion texts.
    pub async fn ask(&self, prompt: &str, num_responses: usize) -> AppResult<Vec<String>> {
        debug!(prompt = %prompt, num_responses = num_responses, "Prompt for language model");
        let responses = self.lm.query(prompt, num_responses).await?;
        let texts = self.lm.response_texts(&responses);
        debug!(responses = ?texts, "Responses from language model");
        Ok(texts)
    }
}

/// What an executing operation sees of its position in the graph.
#[derive(Debug)]
pub struct OperationInput {
    /// The executing operation.
    pub operation_id: OperationId,
    /// Number of predecessor operations.
    pub predecessor_count: usize,
    /// Predecessor thoughts, concatenated in predecessor registration order.
    pub thoughts: Vec<Thought>,
}

impl OperationInput {
    /// Whether the operation has no predecessors.
    pub fn is_root(&self) -> bool {
        self.predecessor_count == 0
    }

    /// Fail unless the operation has at least one predecessor.
    pub fn require_predecessor(&self, kind: &'static str) -> Result<(), StructuralError> {
        if self.is_root() {
            return Err(StructuralError::MissingPredecessor {
                kind,
                operation_id: self.operation_id,
            });
        }
        Ok(())
    }
}

/// The transformation policy of an operation.
#[derive(Debug)]
pub enum OperationVariant {
    Generate(Generate),
    Score(Score),
    KeepBestN(KeepBestN),
    Aggregate(Aggregate),
    GroundTruth(GroundTruth),
    ValidateAndImprove(ValidateAndImprove),
    Improve(Improve),
    KeepValid(KeepValid),
    Selector(Selector),
    Refine(Refine),
    Backtrack(Backtrack),
}

impl OperationVariant {
    /// Name of the variant, used in logs and snapshots.
    pub fn kind(&self) -> &'static str {
        match self {
            OperationVariant::Generate(_) => "Generate",
            OperationVariant::Score(_) => "Score",
            OperationVariant::KeepBestN(_) => "KeepBestN",
            OperationVariant::Aggregate(_) => "Aggregate",
            OperationVariant::GroundTruth(_) => "GroundTruth",
            OperationVariant::ValidateAndImprove(_) => "ValidateAndImprove",
            OperationVariant::Improve(_) => "Improve",
            OperationVariant::KeepValid(_) => "KeepValid",
            OperationVariant::Selector(_) => "Selector",
            OperationVariant::Refine(_) => "Refine",
            OperationVariant::Backtrack(_) => "Backtrack",
        }
    }

    /// The thoughts this operation exposes to its successors.
    pub fn thoughts(&self) -> Vec<&Thought> {
        match self {
            OperationVariant::Generate(op) => op.thoughts().iter().collect(),
            OperationVariant::Score(op) => op.thoughts().iter().collect(),
            OperationVariant::KeepBestN(op) => op.thoughts().iter().collect(),
            OperationVariant::Aggregate(op) => op.thoughts().iter().collect(),
            OperationVariant::GroundTruth(op) => op.thoughts().iter().collect(),
            OperationVariant::ValidateAndImprove(op) => op.thoughts(),
            OperationVariant::Improve(op) => op.thoughts().iter().collect(),
            OperationVariant::KeepValid(op) => op.thoughts().iter().collect(),
            OperationVariant::Selector(op) => op.thoughts().iter().collect(),
            OperationVariant::Refine(op) => op.thoughts().iter().collect(),
            OperationVariant::Backtrack(op) => op.thoughts().iter().collect(),
        }
    }

    async fn execute(&mut self, input: OperationInput, ctx: &ExecutionContext<'_>) -> AppResult<()> {
        match self {
            OperationVariant::Generate(op) => op.execute(input, ctx).await,
            OperationVariant::Score(op) => op.execute(input, ctx).await,
            OperationVariant::KeepBestN(op) => op.execute(input, ctx),
            OperationVariant::Aggregate(op) => op.execute(input, ctx).await,
            OperationVariant::GroundTruth(op) => op.execute(input, ctx),
            OperationVariant::ValidateAndImprove(op) => op.execute(input, ctx).await,
            OperationVariant::Improve(op) => op.execute(input, ctx),
            OperationVariant::KeepValid(op) => op.execute(input, ctx),
            OperationVariant::Selector(op) => op.execute(input, ctx),
            OperationVariant::Refine(op) => op.execute(input, ctx).await,
            OperationVariant::Backtrack(op) => op.execute(input, ctx).await,
        }
    }
}

macro_rules! impl_from_variant {
    ($($name:ident),* $(,)?) => {
        $(
            impl From<$name> for OperationVariant {
                fn from(op: $name) -> Self {
                    OperationVariant::$name(op)
                }
            }
        )*
    };
}

impl_from_variant!(
    Generate,
    Score,
    KeepBestN,
    Aggregate,
    GroundTruth,
    ValidateAndImprove,
    Improve,
    KeepValid,
    Selector,
    Refine,
    Backtrack,
);

/// A node of the graph: edges, execution flag and transformation policy.
#[derive(Debug)]
pub struct Operation {
    id: OperationId,
    predecessors: Vec<OperationId>,
    successors: Vec<OperationId>,
    executed: bool,
    variant: OperationVariant,
}

impl Operation {
    pub(crate) fn new(id: OperationId, variant: OperationVariant) -> Self {
        Self {
            id,
            predecessors: Vec::new(),
            successors: Vec::new(),
            executed: false,
            variant,
        }
    }

    /// This operation's identifier.
    pub fn id(&self) -> OperationId {
        self.id
    }

    /// Predecessors in registration order.
    pub fn predecessors(&self) -> &[OperationId] {
        &self.predecessors
    }

    /// Successors in registration order.
    pub fn successors(&self) -> &[OperationId] {
        &self.successors
    }

    /// Whether the transformation has run.
    pub fn is_executed(&self) -> bool {
        self.executed
    }

    /// The transformation policy.
    pub fn variant(&self) -> &OperationVariant {
        &self.variant
    }

    /// Name of the variant.
    pub fn kind(&self) -> &'static str {
        self.variant.kind()
    }

    /// The thoughts exposed to successors.
    pub fn thoughts(&self) -> Vec<&Thought> {
        self.variant.thoughts()
    }

    pub(crate) fn push_predecessor(&mut self, id: OperationId) {
        self.predecessors.push(id);
    }

    pub(crate) fn push_successor(&mut self, id: OperationId) {
        self.successors.push(id);
    }

    /// Run the transformation once. Readiness is checked by the graph.
    pub(crate) async fn execute(
        &mut self,
        previous: Vec<Thought>,
        ctx: &ExecutionContext<'_>,
    ) -> AppResult<()> {
        if self.executed {
            return Err(StructuralError::AlreadyExecuted {
                operation_id: self.id,
            }
            .into());
        }
        let input = OperationInput {
            operation_id: self.id,
            predecessor_count: self.predecessors.len(),
            thoughts: previous,
        };
        self.variant.execute(input, ctx).await?;
        self.executed = true;
        Ok(())
    }
}
