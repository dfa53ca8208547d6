//! The graph of operations: an arena of [`Operation`]s with explicit edges
//! and tracked root and leaf sets.

use tracing::debug;

use crate::error::{AppResult, StructuralError};
use crate::operations::{ExecutionContext, Operation, OperationVariant};
use crate::thought::{IdSequence, Thought};

pub use crate::operations::OperationId;

/// A directed acyclic graph of operations.
///
/// Operations are owned by the graph and addressed by [`OperationId`]. Roots
/// have no predecessors; leaves have no successors. Edges are only added
/// through this type, which keeps both sets consistent and rejects cycles.
#[derive(Debug, Default)]
pub struct GraphOfOperations {
    operations: Vec<Operation>,
    roots: Vec<OperationId>,
    leaves: Vec<OperationId>,
    thought_ids: IdSequence,
}

impl GraphOfOperations {
    /// Create an empty graph with its own thought id sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty graph drawing thought ids from `thought_ids`.
    pub fn with_thought_ids(thought_ids: IdSequence) -> Self {
        Self {
            thought_ids,
            ..Self::default()
        }
    }

    /// Identifier source for thoughts created in this graph.
    pub fn thought_ids(&self) -> &IdSequence {
        &self.thought_ids
    }

    /// Append an operation after every current leaf.
    ///
    /// The new operation becomes the only leaf; in an empty graph it is also
    /// the only root.
    pub fn append_operation(&mut self, op: impl Into<OperationVariant>) -> OperationId {
        let id = self.push(op.into());
        let previous_leaves = std::mem::take(&mut self.leaves);

        if self.operations.len() == 1 {
            self.roots.push(id);
        }
        for leaf in previous_leaves {
            self.link(leaf, id);
        }
        self.leaves = vec![id];
        id
    }

    /// Register an operation with edges from already registered
    /// `predecessors`, in the given order.
    ///
    /// Operations without predecessors become roots. Predecessors stop being
    /// leaves; the new operation becomes one. Listing a predecessor twice is
    /// rejected.
    pub fn add_operation(
        &mut self,
        op: impl Into<OperationVariant>,
        predecessors: &[OperationId],
    ) -> Result<OperationId, StructuralError> {
        if self.operations.is_empty() && !predecessors.is_empty() {
            return Err(StructuralError::FirstOperationHasPredecessors);
        }
        for (i, &predecessor) in predecessors.iter().enumerate() {
            self.get(predecessor)?;
            if predecessors[..i].contains(&predecessor) {
                return Err(StructuralError::DuplicateEdge {
                    from: predecessor,
                    to: OperationId::new(self.operations.len()),
                });
            }
        }

        let id = self.push(op.into());
        if predecessors.is_empty() {
            self.roots.push(id);
        }
        for &predecessor in predecessors {
            self.link(predecessor, id);
            self.leaves.retain(|&leaf| leaf != predecessor);
        }
        self.leaves.push(id);
        Ok(id)
    }

    /// Add an edge between two registered operations.
    ///
    /// Fails for self-loops, cycles and edges that already exist.
    pub fn connect(&mut self, from: OperationId, to: OperationId) -> Result<(), StructuralError> {
        self.get(from)?;
        self.get(to)?;
        if from == to || self.reaches(to, from) {
            return Err(StructuralError::Cycle { from, to });
        }
        if self.operations[from.index()].successors().contains(&to) {
            return Err(StructuralError::DuplicateEdge { from, to });
        }

        self.link(from, to);
        self.leaves.retain(|&leaf| leaf != from);
        self.roots.retain(|&root| root != to);
        Ok(())
    }

    /// All operations, in insertion order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Look up an operation.
    pub fn operation(&self, id: OperationId) -> Option<&Operation> {
        self.operations.get(id.index())
    }

    /// Look up an operation, failing for unknown ids.
    pub fn get(&self, id: OperationId) -> Result<&Operation, StructuralError> {
        self.operation(id)
            .ok_or(StructuralError::UnknownOperation { operation_id: id })
    }

    /// Operations without predecessors.
    pub fn roots(&self) -> &[OperationId] {
        &self.roots
    }

    /// Operations without successors.
    pub fn leaves(&self) -> &[OperationId] {
        &self.leaves
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Whether every predecessor of `id` has executed.
    pub fn can_be_executed(&self, id: OperationId) -> Result<bool, StructuralError> {
        let op = self.get(id)?;
        Ok(op
            .predecessors()
            .iter()
            .all(|&p| self.operations[p.index()].is_executed()))
    }

    /// Copies of the predecessors' thoughts, in predecessor registration order.
    pub fn previous_thoughts(&self, id: OperationId) -> Result<Vec<Thought>, StructuralError> {
        let op = self.get(id)?;
        Ok(op
            .predecessors()
            .iter()
            .flat_map(|&p| self.operations[p.index()].thoughts())
            .cloned()
            .collect())
    }

    /// Execute one operation.
    ///
    /// Fails with [`StructuralError::NotReady`] when a predecessor has not
    /// executed and [`StructuralError::AlreadyExecuted`] on a second call.
    pub async fn execute(&mut self, id: OperationId, ctx: &ExecutionContext<'_>) -> AppResult<()> {
        if !self.can_be_executed(id)? {
            return Err(StructuralError::NotReady { operation_id: id }.into());
        }
        let previous = self.previous_thoughts(id)?;
        debug!(operation_id = %id, inputs = previous.len(), "Executing operation");

        self.operations[id.index()].execute(previous, ctx).await
    }

    fn push(&mut self, variant: OperationVariant) -> OperationId {
        let id = OperationId::new(self.operations.len());
        self.operations.push(Operation::new(id, variant));
        id
    }

    fn link(&mut self, from: OperationId, to: OperationId) {
        self.operations[from.index()].push_successor(to);
        self.operations[to.index()].push_predecessor(from);
    }

    /// Whether `target` is reachable from `start` along successor edges.
    fn reaches(&self, start: OperationId, target: OperationId) -> bool {
        let mut stack = vec![start];
        let mut seen = vec![false; self.operations.len()];
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if std::mem::replace(&mut seen[id.index()], true) {
                continue;
            }
            stack.extend_from_slice(self.operations[id.index()].successors());
        }
        false
    }
}
