use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

use crate::graph::{GraphOfOperations, OperationId};

/// Lifecycle of one operation within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// What happened to one operation during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub operation_id: OperationId,
    pub kind: String,
    pub predecessors: Vec<OperationId>,
    pub status: OperationStatus,
    pub thoughts_produced: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run-level view of the execution, for logs and diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub run_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub total_operations: usize,
    pub completed: usize,
    pub failed: usize,
    pub thoughts_produced: usize,
    pub operations: Vec<OperationRecord>,
}

impl ExecutionTrace {
    /// Records in the given status.
    pub fn with_status(&self, status: OperationStatus) -> impl Iterator<Item = &OperationRecord> {
        self.operations.iter().filter(move |r| r.status == status)
    }
}

#[derive(Debug)]
pub(crate) struct ExecutionTracker {
    run_id: Uuid,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    records: Vec<OperationRecord>,
    clocks: Vec<Option<Instant>>,
}

impl ExecutionTracker {
    pub(crate) fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: None,
            finished_at: None,
            records: Vec::new(),
            clocks: Vec::new(),
        }
    }

    /// Reset to one pending record per operation.
    pub(crate) fn initialize(&mut self, graph: &GraphOfOperations) {
        self.started_at = Some(Utc::now());
        self.finished_at = None;
        self.records = graph
            .operations()
            .iter()
            .map(|op| OperationRecord {
                operation_id: op.id(),
                kind: op.kind().to_string(),
                predecessors: op.predecessors().to_vec(),
                status: OperationStatus::Pending,
                thoughts_produced: 0,
                started_at: None,
                finished_at: None,
                elapsed_ms: None,
                error: None,
            })
            .collect();
        self.clocks = vec![None; self.records.len()];
    }

    pub(crate) fn start_operation(&mut self, id: OperationId) {
        if let Some(record) = self.records.get_mut(id.index()) {
            record.status = OperationStatus::Running;
            record.started_at = Some(Utc::now());
            self.clocks[id.index()] = Some(Instant::now());
        }
    }

    pub(crate) fn complete_operation(&mut self, id: OperationId, thoughts_produced: usize) {
        self.finish(id, OperationStatus::Completed);
        if let Some(record) = self.records.get_mut(id.index()) {
            record.thoughts_produced = thoughts_produced;
        }
    }

    pub(crate) fn fail_operation(&mut self, id: OperationId, error: &str) {
        self.finish(id, OperationStatus::Failed);
        if let Some(record) = self.records.get_mut(id.index()) {
            record.error = Some(error.to_string());
        }
    }

    pub(crate) fn finish_run(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    fn finish(&mut self, id: OperationId, status: OperationStatus) {
        let elapsed = self
            .clocks
            .get(id.index())
            .copied()
            .flatten()
            .map(|start| start.elapsed().as_millis() as u64);
        if let Some(record) = self.records.get_mut(id.index()) {
            record.status = status;
            record.finished_at = Some(Utc::now());
            record.elapsed_ms = elapsed;
        }
    }

    pub(crate) fn trace(&self) -> ExecutionTrace {
        let count = |status: OperationStatus| self.records.iter().filter(|r| r.status == status).count();
        ExecutionTrace {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: self.finished_at,
            total_operations: self.records.len(),
            completed: count(OperationStatus::Completed),
            failed: count(OperationStatus::Failed),
            thoughts_produced: self.records.iter().map(|r| r.thoughts_produced).sum(),
            operations: self.records.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::{Generate, Improve};

    fn graph() -> GraphOfOperations {
        let mut graph = GraphOfOperations::new();
        graph.append_operation(Generate::new(1, 1));
        graph.append_operation(Improve::new());
        graph
    }

    #[test]
    fn test_initialize_marks_everything_pending() {
        let mut tracker = ExecutionTracker::new();
        tracker.initialize(&graph());
        let trace = tracker.trace();
        assert_eq!(trace.total_operations, 2);
        assert_eq!(trace.with_status(OperationStatus::Pending).count(), 2);
        assert_eq!(trace.operations[1].kind, "Improve");
        assert_eq!(trace.operations[1].predecessors, vec![OperationId::new(0)]);
    }

    #[test]
    fn test_lifecycle_counts() {
        let mut tracker = ExecutionTracker::new();
        tracker.initialize(&graph());
        tracker.start_operation(OperationId::new(0));
        tracker.complete_operation(OperationId::new(0), 3);
        tracker.start_operation(OperationId::new(1));
        tracker.fail_operation(OperationId::new(1), "boom");
        tracker.finish_run();

        let trace = tracker.trace();
        assert_eq!(trace.completed, 1);
        assert_eq!(trace.failed, 1);
        assert_eq!(trace.thoughts_produced, 3);
        assert!(trace.operations[0].elapsed_ms.is_some());
        assert_eq!(trace.operations[1].error.as_deref(), Some("boom"));
        assert!(trace.finished_at.is_some());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&OperationStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }

    #[test]
    fn test_unknown_operation_is_ignored() {
        let mut tracker = ExecutionTracker::new();
        tracker.initialize(&graph());
        tracker.start_operation(OperationId::new(7));
        tracker.complete_operation(OperationId::new(7), 1);
        assert_eq!(tracker.trace().completed, 0);
    }
}
