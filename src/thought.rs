//! Thoughts: versioned snapshots of working state plus score, validity and
//! ground-truth metadata.
//!
//! A [`Thought`] is never mutated once another operation can see it. Operations
//! derive new thoughts from their inputs with [`Thought::derive`], which assigns
//! a fresh identity from an explicitly owned [`IdSequence`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Ordered, schema-less key/value state carried by a thought.
pub type ThoughtState = serde_json::Map<String, serde_json::Value>;

/// Unique identifier of a thought, never reused within its sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThoughtId(u64);

impl ThoughtId {
    /// Wrap a raw identifier.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ThoughtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic identifier source shared by everything that creates thoughts for
/// one graph. Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct IdSequence {
    next: Arc<AtomicU64>,
}

impl IdSequence {
    /// Create a sequence starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next identifier.
    pub fn next_id(&self) -> ThoughtId {
        ThoughtId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of identifiers handed out so far.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

/// An LLM thought: state plus optional score, validity and solved labels.
///
/// Each label is `None` until explicitly assigned, so the scored/validated/
/// compared-to-ground-truth flags can never disagree with the values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thought {
    id: ThoughtId,
    state: ThoughtState,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    solved: Option<bool>,
}

impl Thought {
    /// Create a fresh, unlabelled thought.
    pub fn new(ids: &IdSequence, state: ThoughtState) -> Self {
        Self {
            id: ids.next_id(),
            state,
            score: None,
            valid: None,
            solved: None,
        }
    }

    /// Copy this thought under a new identity, keeping state and all labels.
    pub fn derive(&self, ids: &IdSequence) -> Self {
        Self {
            id: ids.next_id(),
            state: self.state.clone(),
            score: self.score,
            valid: self.valid,
            solved: self.solved,
        }
    }

    /// Copy this thought under a new identity with `delta` laid over its state.
    /// Keys in `delta` win.
    pub fn derive_with(&self, ids: &IdSequence, delta: ThoughtState) -> Self {
        let mut derived = self.derive(ids);
        merge_state(&mut derived.state, delta);
        derived
    }

    /// This thought's identifier.
    pub fn id(&self) -> ThoughtId {
        self.id
    }

    /// The working state.
    pub fn state(&self) -> &ThoughtState {
        &self.state
    }

    /// Consume the thought, keeping only its state.
    pub fn into_state(self) -> ThoughtState {
        self.state
    }

    /// The score, if one was assigned.
    pub fn score(&self) -> Option<f64> {
        self.score
    }

    /// Assign a score; marks the thought as scored.
    pub fn set_score(&mut self, score: f64) {
        self.score = Some(score);
    }

    /// Whether a score was assigned.
    pub fn is_scored(&self) -> bool {
        self.score.is_some()
    }

    /// The validity verdict, if the thought was validated.
    pub fn valid(&self) -> Option<bool> {
        self.valid
    }

    /// Record a validity verdict; marks the thought as validated.
    pub fn set_valid(&mut self, valid: bool) {
        self.valid = Some(valid);
    }

    /// Whether a validity verdict was recorded.
    pub fn is_validated(&self) -> bool {
        self.valid.is_some()
    }

    /// The ground-truth verdict, if the thought was compared.
    pub fn solved(&self) -> Option<bool> {
        self.solved
    }

    /// Record a ground-truth verdict.
    pub fn set_solved(&mut self, solved: bool) {
        self.solved = Some(solved);
    }

    /// Whether the thought was compared to ground truth.
    pub fn is_compared_to_ground_truth(&self) -> bool {
        self.solved.is_some()
    }
}

/// Overlay `delta` onto `base` at the top level; keys in `delta` win.
pub fn merge_state(base: &mut ThoughtState, delta: ThoughtState) {
    for (key, value) in delta {
        base.insert(key, value);
    }
}

/// Build a [`ThoughtState`] from a JSON value, treating non-objects as empty.
pub fn state_from_value(value: serde_json::Value) -> ThoughtState {
    match value {
        serde_json::Value::Object(map) => map,
        _ => ThoughtState::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(value: serde_json::Value) -> ThoughtState {
        state_from_value(value)
    }

    #[test]
    fn test_id_sequence_is_monotonic() {
        let ids = IdSequence::new();
        let a = ids.next_id();
        let b = ids.next_id();
        assert!(b > a);
        assert_eq!(ids.issued(), 2);
    }

    #[test]
    fn test_id_sequence_clones_share_counter() {
        let ids = IdSequence::new();
        let other = ids.clone();
        let a = ids.next_id();
        let b = other.next_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_independent_sequences_do_not_interfere() {
        let first = IdSequence::new();
        let second = IdSequence::new();
        assert_eq!(first.next_id(), ThoughtId::new(0));
        assert_eq!(second.next_id(), ThoughtId::new(0));
    }

    #[test]
    fn test_new_thought_is_unlabelled() {
        let ids = IdSequence::new();
        let thought = Thought::new(&ids, state(json!({"text": "abc"})));
        assert!(!thought.is_scored());
        assert!(!thought.is_validated());
        assert!(!thought.is_compared_to_ground_truth());
        assert_eq!(thought.score(), None);
    }

    #[test]
    fn test_setters_mark_flags() {
        let ids = IdSequence::new();
        let mut thought = Thought::new(&ids, ThoughtState::new());
        thought.set_score(0.0);
        thought.set_valid(false);
        thought.set_solved(true);
        assert!(thought.is_scored());
        assert_eq!(thought.score(), Some(0.0));
        assert!(thought.is_validated());
        assert_eq!(thought.valid(), Some(false));
        assert!(thought.is_compared_to_ground_truth());
        assert_eq!(thought.solved(), Some(true));
    }

    #[test]
    fn test_derive_copies_state_and_labels_with_new_id() {
        let ids = IdSequence::new();
        let mut original = Thought::new(&ids, state(json!({"text": "abc", "n": [1, 2]})));
        original.set_score(4.5);
        original.set_valid(true);

        let copy = original.derive(&ids);
        assert_ne!(copy.id(), original.id());
        assert_eq!(copy.state(), original.state());
        assert_eq!(copy.score(), Some(4.5));
        assert_eq!(copy.valid(), Some(true));
        assert_eq!(copy.solved(), None);
    }

    #[test]
    fn test_derive_does_not_alias_state() {
        let ids = IdSequence::new();
        let original = Thought::new(&ids, state(json!({"text": "abc"})));
        let copy = original.derive_with(&ids, state(json!({"text": "changed"})));
        assert_eq!(original.state()["text"], json!("abc"));
        assert_eq!(copy.state()["text"], json!("changed"));
    }

    #[test]
    fn test_merge_state_delta_wins_and_keeps_order() {
        let mut base = state(json!({"a": 1, "b": 2}));
        merge_state(&mut base, state(json!({"b": 3, "c": 4})));
        let keys: Vec<&str> = base.keys().map(String::as_str).collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert_eq!(base["b"], json!(3));
    }

    #[test]
    fn test_state_from_non_object_is_empty() {
        assert!(state_from_value(json!([1, 2, 3])).is_empty());
        assert!(state_from_value(json!("text")).is_empty());
    }

    #[test]
    fn test_thought_serialization_skips_missing_labels() {
        let ids = IdSequence::new();
        let thought = Thought::new(&ids, state(json!({"k": "v"})));
        let json = serde_json::to_string(&thought).unwrap();
        assert!(json.contains("\"state\""));
        assert!(!json.contains("score"));
    }
}
