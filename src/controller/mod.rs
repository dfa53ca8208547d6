//! The controller: runs a graph of operations to completion.
//!
//! Scheduling is a FIFO ready-queue. Every operation whose predecessors have
//! all executed is queued; after each execution, successors that became ready
//! are appended. Operations therefore run one at a time, each exactly once,
//! and never before any of its predecessors. Operations that can never become
//! ready stay unexecuted without failing the run.

mod snapshot;
mod tracker;

pub use snapshot::*;
pub use tracker::{ExecutionTrace, OperationRecord, OperationStatus};

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::error::{AppResult, StructuralError};
use crate::graph::{GraphOfOperations, OperationId};
use crate::language_model::LanguageModel;
use crate::operations::ExecutionContext;
use crate::parser::ResponseParser;
use crate::prompts::Prompter;
use crate::thought::{Thought, ThoughtState};
use tracker::ExecutionTracker;

/// Executes a [`GraphOfOperations`] against one set of collaborators.
pub struct Controller {
    lm: Arc<dyn LanguageModel>,
    graph: GraphOfOperations,
    prompter: Arc<dyn Prompter>,
    parser: Arc<dyn ResponseParser>,
    problem_parameters: ThoughtState,
    run_executed: bool,
    tracker: ExecutionTracker,
}

impl Controller {
    /// Create a controller owning `graph`.
    pub fn new(
        lm: Arc<dyn LanguageModel>,
        graph: GraphOfOperations,
        prompter: Arc<dyn Prompter>,
        parser: Arc<dyn ResponseParser>,
        problem_parameters: ThoughtState,
    ) -> Self {
        Self {
            lm,
            graph,
            prompter,
            parser,
            problem_parameters,
            run_executed: false,
            tracker: ExecutionTracker::new(),
        }
    }

    /// Execute every reachable operation.
    ///
    /// The first failure aborts the run; the graph keeps exactly the
    /// executed flags of the operations that completed.
    pub async fn run(&mut self) -> AppResult<()> {
        debug!("Checking that the program is in a valid state");
        if self.graph.roots().is_empty() {
            return Err(StructuralError::EmptyGraph.into());
        }
        debug!("The program is in a valid state");

        let start = Instant::now();
        self.tracker.initialize(&self.graph);

        let mut queue: VecDeque<OperationId> = VecDeque::new();
        for op in self.graph.operations() {
            if self.graph.can_be_executed(op.id())? {
                queue.push_back(op.id());
            }
        }

        let ctx = ExecutionContext {
            lm: self.lm.as_ref(),
            prompter: self.prompter.as_ref(),
            parser: self.parser.as_ref(),
            problem_parameters: &self.problem_parameters,
            thought_ids: self.graph.thought_ids().clone(),
        };

        info!(
            operations = self.graph.len(),
            ready = queue.len(),
            "Starting graph execution"
        );

        while let Some(id) = queue.pop_front() {
            let kind = self.graph.get(id)?.kind();
            info!(operation_id = %id, kind = kind, "Executing operation");
            self.tracker.start_operation(id);

            if let Err(e) = self.graph.execute(id, &ctx).await {
                error!(operation_id = %id, kind = kind, error = %e, "Operation failed, aborting run");
                self.tracker.fail_operation(id, &e.to_string());
                self.tracker.finish_run();
                return Err(e);
            }

            let op = self.graph.get(id)?;
            let produced = op.thoughts().len();
            self.tracker.complete_operation(id, produced);
            info!(operation_id = %id, kind = kind, thoughts = produced, "Operation executed");

            let successors = op.successors().to_vec();
            for successor in successors {
                if self.graph.can_be_executed(successor)? {
                    queue.push_back(successor);
                }
            }
        }

        self.tracker.finish_run();
        self.run_executed = true;

        let usage = self.lm.usage();
        info!(
            latency_ms = start.elapsed().as_millis(),
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            cost = usage.cost,
            "All operations executed"
        );
        Ok(())
    }

    /// Thoughts of every leaf operation, in leaf order.
    pub fn final_thoughts(&self) -> Result<Vec<Vec<&Thought>>, StructuralError> {
        if !self.run_executed {
            return Err(StructuralError::RunNotExecuted);
        }
        self.graph
            .leaves()
            .iter()
            .map(|&leaf| Ok(self.graph.get(leaf)?.thoughts()))
            .collect()
    }

    /// The graph with every operation's current output.
    pub fn graph(&self) -> &GraphOfOperations {
        &self.graph
    }

    /// Give the graph back, e.g. to inspect after the controller is done.
    pub fn into_graph(self) -> GraphOfOperations {
        self.graph
    }

    /// Whether `run` completed.
    pub fn is_run_executed(&self) -> bool {
        self.run_executed
    }

    /// Per-operation outputs followed by language model usage.
    pub fn snapshot(&self) -> Vec<SnapshotEntry> {
        snapshot_graph(&self.graph, self.lm.usage())
    }

    /// Write [`Controller::snapshot`] to `path` as pretty JSON.
    pub fn output_graph(&self, path: &Path) -> AppResult<()> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Graph snapshot written");
        Ok(())
    }

    /// Status of every operation in the latest run.
    pub fn trace(&self) -> ExecutionTrace {
        self.tracker.trace()
    }
}
