//! Prebuilt graphs for common reasoning patterns.
//!
//! Every builder returns a fresh [`GraphOfOperations`] ready for a
//! [`crate::controller::Controller`]. Scoring defaults to the language model
//! when no scoring function is given.

use serde_json::{json, Value};
use tracing::debug;

use crate::error::StructuralError;
use crate::graph::{GraphOfOperations, OperationId};
use crate::operations::{
    Aggregate, Generate, KeepBestN, KeepValid, Refine, Score, ScoringFunction, Selector,
    Validation, ValidateAndImprove,
};
use crate::thought::{Thought, ThoughtState};

/// State key holding the partition index in [`partitioned_merge`].
pub const PART_KEY: &str = "part";

/// State key holding the partition's own item in [`partitioned_merge`].
pub const PART_ITEM_KEY: &str = "part_item";

fn score(scorer: &Option<ScoringFunction>) -> Score {
    let score = Score::new(1, false);
    match scorer {
        Some(function) => score.with_function(function.clone()),
        None => score,
    }
}

/// Generate → Score → KeepBestN.
pub fn best_of_n(
    branches: usize,
    keep: usize,
    scorer: Option<ScoringFunction>,
) -> Result<GraphOfOperations, StructuralError> {
    let mut graph = GraphOfOperations::new();
    graph.append_operation(Generate::new(1, branches));
    graph.append_operation(score(&scorer));
    graph.append_operation(KeepBestN::new(keep, true)?);
    Ok(graph)
}

/// Best-of-n followed by a validate/repair loop and a validity filter.
pub fn validated_refinement(
    branches: usize,
    tries: usize,
    scorer: Option<ScoringFunction>,
    validation: Validation,
) -> Result<GraphOfOperations, StructuralError> {
    let mut graph = best_of_n(branches, 1, scorer)?;
    graph.append_operation(ValidateAndImprove::new(1, true, tries).with_validation(validation));
    graph.append_operation(KeepValid::new());
    Ok(graph)
}

/// Best-of-n keeping `keep` candidates, a refinement pass over each, one
/// aggregation of the refined candidates and a final best-of-one.
pub fn refined_aggregation(
    branches: usize,
    keep: usize,
    max_refinements: u64,
    scorer: Option<ScoringFunction>,
) -> Result<GraphOfOperations, StructuralError> {
    let mut graph = best_of_n(branches, keep, scorer.clone())?;
    graph.append_operation(Refine::new(max_refinements));
    graph.append_operation(Aggregate::new(1));
    graph.append_operation(score(&scorer));
    graph.append_operation(KeepBestN::new(1, true)?);
    Ok(graph)
}

/// Split the array at `partition_key` into up to `max_parts` branches, refine
/// each branch independently, merge the branches pairwise and refine the
/// merged result once more.
///
/// Each branch thought keeps the full seed state plus [`PART_KEY`] (its
/// index) and [`PART_ITEM_KEY`] (its array element).
pub fn partitioned_merge(
    partition_key: &str,
    max_parts: usize,
    branches: usize,
    scorer: Option<ScoringFunction>,
) -> Result<GraphOfOperations, StructuralError> {
    let mut graph = GraphOfOperations::new();

    let ids = graph.thought_ids().clone();
    let key = partition_key.to_string();
    let splitter = graph.append_operation(Selector::new(move |thoughts| {
        let Some(seed) = thoughts.first() else {
            return Vec::new();
        };
        let items = seed
            .state()
            .get(&key)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        items
            .into_iter()
            .take(max_parts)
            .enumerate()
            .map(|(part, item)| {
                let mut delta = ThoughtState::new();
                delta.insert(PART_KEY.to_string(), json!(part));
                delta.insert(PART_ITEM_KEY.to_string(), item);
                seed.derive_with(&ids, delta)
            })
            .collect()
    }));

    let mut branch_ends: Vec<OperationId> = Vec::with_capacity(max_parts);
    for part in 0..max_parts {
        let selector = graph.add_operation(
            Selector::new(move |thoughts: &[Thought]| {
                thoughts
                    .iter()
                    .filter(|t| t.state().get(PART_KEY) == Some(&json!(part)))
                    .cloned()
                    .collect()
            }),
            &[splitter],
        )?;
        let generate = graph.add_operation(Generate::new(1, branches), &[selector])?;
        let scored = graph.add_operation(score(&scorer), &[generate])?;
        branch_ends.push(graph.add_operation(KeepBestN::new(1, true)?, &[scored])?);
    }

    while branch_ends.len() > 1 {
        let mut merged = Vec::with_capacity((branch_ends.len() + 1) / 2);
        for pair in branch_ends.chunks(2) {
            if let [left, right] = pair {
                let aggregate = graph.add_operation(Aggregate::new(2), &[*left, *right])?;
                let scored = graph.add_operation(score(&scorer), &[aggregate])?;
                merged.push(graph.add_operation(KeepBestN::new(1, true)?, &[scored])?);
            } else {
                merged.extend_from_slice(pair);
            }
        }
        branch_ends = merged;
    }

    graph.append_operation(Generate::new(1, branches));
    graph.append_operation(score(&scorer));
    graph.append_operation(KeepBestN::new(1, true)?);

    debug!(
        operations = graph.len(),
        parts = max_parts,
        "Built partitioned merge graph"
    );
    Ok(graph)
}
