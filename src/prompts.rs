//! Prompt templates for the operation kinds.
//!
//! [`Prompter`] is the seam operations call; [`JsonPrompter`] is a generic
//! implementation that embeds thought states as JSON between fixed
//! instructions. Prompts must be a pure function of their inputs so a graph
//! can be replayed.

use crate::thought::ThoughtState;

/// Builds the prompt text for each operation kind.
#[cfg_attr(test, mockall::automock)]
pub trait Prompter: Send + Sync {
    /// Prompt asking for new thoughts derived from `state`.
    fn generate_prompt(&self, num_branches: usize, state: &ThoughtState) -> String;

    /// Prompt asking for one score per state.
    fn score_prompt(&self, states: &[ThoughtState]) -> String;

    /// Prompt asking to merge several states into one.
    fn aggregation_prompt(&self, states: &[ThoughtState]) -> String;

    /// Prompt asking to repair a state that failed validation.
    fn improve_prompt(&self, state: &ThoughtState) -> String;

    /// Prompt asking whether a state is valid.
    fn validation_prompt(&self, state: &ThoughtState) -> String;

    /// Prompt asking for a more thorough version of an acceptable state.
    fn refine_prompt(&self, state: &ThoughtState) -> String;
}

/// System prompt installed on the pipe.
pub const SYSTEM_PROMPT: &str = r#"You are a careful analytical assistant taking part in a multi-step reasoning workflow.

Every answer MUST be a single valid JSON object. Do not wrap it in prose.
Only use the keys requested by the instructions; omit keys you cannot fill."#;

/// Instructions for generate prompts.
pub const GENERATE_PROMPT: &str = r#"Work on the task described by the state below and produce an improved or extended version of it.

Respond with a JSON object containing only the keys you add or change."#;

/// Instructions for score prompts.
pub const SCORE_PROMPT: &str = r#"Rate the quality of each candidate state below on a scale from 0 to 10.

Respond with JSON in this exact format:
{"scores": [7.5, 3.0]}
with one score per candidate, in the order given."#;

/// Instructions for aggregation prompts.
pub const AGGREGATE_PROMPT: &str = r#"Merge the candidate states below into a single state that keeps the strongest content of each and resolves contradictions.

Respond with a JSON object containing the merged keys."#;

/// Instructions for improve prompts.
pub const IMPROVE_PROMPT: &str = r#"The state below failed validation. Correct its mistakes while keeping what is already right.

Respond with a JSON object containing only the keys you change."#;

/// Instructions for validation prompts.
pub const VALIDATION_PROMPT: &str = r#"Decide whether the state below is complete and internally consistent.

Respond with JSON in this exact format:
{"valid": true}"#;

/// Instructions for refine prompts.
pub const REFINE_PROMPT: &str = r#"Make the state below more thorough: strengthen its reasoning, add concrete supporting detail and point out gaps or limitations.

Respond with a JSON object containing only the keys you change."#;

/// Generic prompter rendering states as pretty-printed JSON.
#[derive(Debug, Clone, Default)]
pub struct JsonPrompter;

impl JsonPrompter {
    /// Create a new JSON prompter.
    pub fn new() -> Self {
        Self
    }
}

fn render(state: &ThoughtState) -> String {
    serde_json::to_string_pretty(state).unwrap_or_else(|_| "{}".to_string())
}

fn render_candidates(states: &[ThoughtState]) -> String {
    states
        .iter()
        .enumerate()
        .map(|(i, s)| format!("Candidate {}:\n{}", i + 1, render(s)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

impl Prompter for JsonPrompter {
    fn generate_prompt(&self, num_branches: usize, state: &ThoughtState) -> String {
        let mut prompt = format!("{}\n\nState:\n{}", GENERATE_PROMPT, render(state));
        if num_branches > 1 {
            prompt.push_str(&format!(
                "\n\nPropose {} alternatives as a JSON array of objects.",
                num_branches
            ));
        }
        prompt
    }

    fn score_prompt(&self, states: &[ThoughtState]) -> String {
        format!("{}\n\n{}", SCORE_PROMPT, render_candidates(states))
    }

    fn aggregation_prompt(&self, states: &[ThoughtState]) -> String {
        format!("{}\n\n{}", AGGREGATE_PROMPT, render_candidates(states))
    }

    fn improve_prompt(&self, state: &ThoughtState) -> String {
        format!("{}\n\nState:\n{}", IMPROVE_PROMPT, render(state))
    }

    fn validation_prompt(&self, state: &ThoughtState) -> String {
        format!("{}\n\nState:\n{}", VALIDATION_PROMPT, render(state))
    }

    fn refine_prompt(&self, state: &ThoughtState) -> String {
        format!("{}\n\nState:\n{}", REFINE_PROMPT, render(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thought::state_from_value;
    use serde_json::json;

    fn sample() -> ThoughtState {
        state_from_value(json!({"text": "quarterly revenue grew"}))
    }

    #[test]
    fn test_prompts_are_valid_json_instructions() {
        for prompt in [
            SYSTEM_PROMPT,
            GENERATE_PROMPT,
            SCORE_PROMPT,
            AGGREGATE_PROMPT,
            IMPROVE_PROMPT,
            VALIDATION_PROMPT,
            REFINE_PROMPT,
        ] {
            assert!(prompt.contains("JSON"));
        }
    }

    #[test]
    fn test_generate_prompt_embeds_state() {
        let prompt = JsonPrompter::new().generate_prompt(1, &sample());
        assert!(prompt.starts_with(GENERATE_PROMPT));
        assert!(prompt.contains("quarterly revenue grew"));
        assert!(!prompt.contains("alternatives"));
    }

    #[test]
    fn test_generate_prompt_asks_for_branches() {
        let prompt = JsonPrompter::new().generate_prompt(3, &sample());
        assert!(prompt.contains("Propose 3 alternatives"));
    }

    #[test]
    fn test_score_prompt_numbers_candidates() {
        let states = vec![sample(), state_from_value(json!({"text": "costs fell"}))];
        let prompt = JsonPrompter::new().score_prompt(&states);
        assert!(prompt.contains("Candidate 1:"));
        assert!(prompt.contains("Candidate 2:"));
        assert!(prompt.contains("costs fell"));
    }

    #[test]
    fn test_prompts_are_deterministic() {
        let prompter = JsonPrompter::new();
        let states = vec![sample()];
        assert_eq!(
            prompter.aggregation_prompt(&states),
            prompter.aggregation_prompt(&states)
        );
        assert_eq!(
            prompter.improve_prompt(&sample()),
            prompter.improve_prompt(&sample())
        );
        assert!(prompter.validation_prompt(&sample()).contains("\"valid\""));
    }

    #[test]
    fn test_refine_prompt_embeds_state() {
        let prompt = JsonPrompter::new().refine_prompt(&sample());
        assert!(prompt.starts_with(REFINE_PROMPT));
        assert!(prompt.contains("quarterly revenue grew"));
    }
}
