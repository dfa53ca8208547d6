use serde::{Deserialize, Serialize};

use crate::graph::GraphOfOperations;
use crate::language_model::UsageSummary;
use crate::operations::OperationVariant;
use crate::thought::{Thought, ThoughtState};

/// Serialized view of one operation's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSnapshot {
    pub operation: String,
    pub thoughts: Vec<ThoughtState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scored: Option<Vec<bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated: Option<Vec<bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity: Option<Vec<bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solved: Option<Vec<bool>>,
    /// Full attempt history per input, for ValidateAndImprove.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<Vec<Vec<ThoughtState>>>,
}

/// One entry of a graph snapshot: an operation, or the trailing usage totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotEntry {
    Operation(OperationSnapshot),
    Usage(UsageSummary),
}

impl OperationSnapshot {
    fn from_thoughts(operation: &str, thoughts: &[&Thought]) -> Self {
        let any_scored = thoughts.iter().any(|t| t.is_scored());
        let any_validated = thoughts.iter().any(|t| t.is_validated());
        let any_compared = thoughts.iter().any(|t| t.is_compared_to_ground_truth());

        Self {
            operation: operation.to_string(),
            thoughts: thoughts.iter().map(|t| t.state().clone()).collect(),
            scored: any_scored.then(|| thoughts.iter().map(|t| t.is_scored()).collect()),
            scores: any_scored.then(|| thoughts.iter().map(|t| t.score().unwrap_or(0.0)).collect()),
            validated: any_validated.then(|| thoughts.iter().map(|t| t.is_validated()).collect()),
            validity: any_validated
                .then(|| thoughts.iter().map(|t| t.valid().unwrap_or(false)).collect()),
            solved: any_compared
                .then(|| thoughts.iter().map(|t| t.solved().unwrap_or(false)).collect()),
            attempts: None,
        }
    }
}

/// Operation entries in insertion order, followed by the usage entry.
pub fn snapshot_graph(graph: &GraphOfOperations, usage: UsageSummary) -> Vec<SnapshotEntry> {
    let mut entries: Vec<SnapshotEntry> = graph
        .operations()
        .iter()
        .map(|op| {
            let mut snapshot = OperationSnapshot::from_thoughts(op.kind(), &op.thoughts());
            if let OperationVariant::ValidateAndImprove(vai) = op.variant() {
                snapshot.attempts = Some(
                    vai.attempts()
                        .iter()
                        .map(|history| history.iter().map(|t| t.state().clone()).collect())
                        .collect(),
                );
            }
            SnapshotEntry::Operation(snapshot)
        })
        .collect();
    entries.push(SnapshotEntry::Usage(usage));
    entries
}
