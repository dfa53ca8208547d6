//! Response parsing: turning raw completion text into thought state.
//!
//! [`ResponseParser`] is the seam operations call. [`JsonResponseParser`] is a
//! generic implementation that tolerates malformed completions by producing
//! error-flagged state instead of failing, so one bad response does not sink
//! a whole generation step.

use serde_json::{json, Value};
use tracing::warn;

use crate::error::ParseResult;
use crate::thought::ThoughtState;

/// Key holding the raw completion when it could not be parsed.
pub const RAW_RESPONSE_KEY: &str = "raw_response";
/// Key holding the parse error message.
pub const PARSE_ERROR_KEY: &str = "parse_error";

/// Result of parsing an aggregation answer: one merged state or several.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedStates {
    /// A single merged state.
    One(ThoughtState),
    /// Several alternative merged states.
    Many(Vec<ThoughtState>),
}

impl ParsedStates {
    /// Normalize into a list; a single state becomes a singleton list.
    pub fn into_vec(self) -> Vec<ThoughtState> {
        match self {
            ParsedStates::One(state) => vec![state],
            ParsedStates::Many(states) => states,
        }
    }
}

/// Converts completion texts into state deltas, scores and verdicts.
///
/// An `Err` signals an unexpected failure and aborts the run; malformed text
/// should instead come back as well-formed, error-flagged state.
#[cfg_attr(test, mockall::automock)]
pub trait ResponseParser: Send + Sync {
    /// One state delta per generated alternative.
    fn parse_generate_answer(
        &self,
        state: &ThoughtState,
        texts: &[String],
    ) -> ParseResult<Vec<ThoughtState>>;

    /// One score per entry of `states`.
    fn parse_score_answer(&self, states: &[ThoughtState], texts: &[String])
        -> ParseResult<Vec<f64>>;

    /// Merged state(s) for an aggregation.
    fn parse_aggregation_answer(
        &self,
        states: &[ThoughtState],
        texts: &[String],
    ) -> ParseResult<ParsedStates>;

    /// State delta repairing an invalid state or refining an acceptable one.
    fn parse_improve_answer(&self, state: &ThoughtState, texts: &[String])
        -> ParseResult<ThoughtState>;

    /// Validity verdict for a state.
    fn parse_validation_answer(&self, state: &ThoughtState, texts: &[String]) -> ParseResult<bool>;
}

/// Extract JSON from a completion string, handling markdown code blocks.
///
/// Attempts extraction in this order:
/// 1. Raw JSON (fast path)
/// 2. ```json ... ``` code blocks
/// 3. ``` ... ``` code blocks
pub fn extract_json_from_completion(completion: &str) -> Result<&str, String> {
    let trimmed = completion.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(trimmed);
    }

    if completion.contains("```json") {
        return completion
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ```json block but content was empty or malformed".to_string());
    }

    if completion.contains("```") {
        return completion
            .split("```")
            .nth(1)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ``` block but content was empty or malformed".to_string());
    }

    Err(format!(
        "No JSON found in response. First 100 chars: '{}'",
        completion.chars().take(100).collect::<String>()
    ))
}

/// Generic parser for JSON-speaking models.
#[derive(Debug, Clone, Default)]
pub struct JsonResponseParser;

impl JsonResponseParser {
    /// Create a new JSON response parser.
    pub fn new() -> Self {
        Self
    }
}

fn parse_value(text: &str) -> Result<Value, String> {
    let raw = extract_json_from_completion(text)?;
    serde_json::from_str(raw).map_err(|e| e.to_string())
}

fn error_state(text: &str, message: &str) -> ThoughtState {
    warn!(
        error = %message,
        completion_preview = %text.chars().take(200).collect::<String>(),
        "Failed to parse completion, using error-flagged state"
    );
    let mut state = ThoughtState::new();
    state.insert(RAW_RESPONSE_KEY.to_string(), json!(text));
    state.insert(PARSE_ERROR_KEY.to_string(), json!(message));
    state
}

/// Parse one completion into zero or more state deltas.
fn parse_states(text: &str) -> Vec<ThoughtState> {
    match parse_value(text) {
        Ok(Value::Object(map)) => vec![map],
        Ok(Value::Array(items)) => {
            let states: Vec<ThoughtState> = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect();
            if states.is_empty() {
                vec![error_state(text, "JSON array held no objects")]
            } else {
                states
            }
        }
        Ok(_) => vec![error_state(text, "JSON was not an object")],
        Err(message) => vec![error_state(text, &message)],
    }
}

/// Scores carried by one completion, in candidate order.
fn parse_scores(text: &str) -> Vec<f64> {
    match parse_value(text) {
        Ok(Value::Object(map)) => {
            if let Some(Value::Array(scores)) = map.get("scores") {
                return scores.iter().filter_map(Value::as_f64).collect();
            }
            map.get("score").and_then(Value::as_f64).into_iter().collect()
        }
        Ok(Value::Array(scores)) => scores.iter().filter_map(Value::as_f64).collect(),
        Ok(Value::Number(n)) => n.as_f64().into_iter().collect(),
        _ => first_number(text).into_iter().collect(),
    }
}

/// First decimal number appearing in free text, with its sign.
fn first_number(text: &str) -> Option<f64> {
    let mut current = String::new();
    let mut previous = None;
    for c in text.chars() {
        if c.is_ascii_digit() || (c == '.' && !current.is_empty() && !current.contains('.')) {
            if current.is_empty() && previous == Some('-') {
                current.push('-');
            }
            current.push(c);
        } else if !current.is_empty() {
            break;
        }
        previous = Some(c);
    }
    current.trim_end_matches('.').parse().ok()
}

fn parse_verdict(text: &str) -> Option<bool> {
    match parse_value(text) {
        Ok(Value::Object(map)) => map.get("valid").and_then(Value::as_bool),
        Ok(Value::Bool(b)) => Some(b),
        _ => {
            let lowered = text.trim().to_lowercase();
            if lowered.starts_with("true") || lowered.starts_with("yes") {
                Some(true)
            } else if lowered.starts_with("false") || lowered.starts_with("no") {
                Some(false)
            } else {
                None
            }
        }
    }
}

impl ResponseParser for JsonResponseParser {
    fn parse_generate_answer(
        &self,
        _state: &ThoughtState,
        texts: &[String],
    ) -> ParseResult<Vec<ThoughtState>> {
        Ok(texts.iter().flat_map(|text| parse_states(text)).collect())
    }

    fn parse_score_answer(
        &self,
        states: &[ThoughtState],
        texts: &[String],
    ) -> ParseResult<Vec<f64>> {
        let samples: Vec<Vec<f64>> = texts.iter().map(|text| parse_scores(text)).collect();

        Ok((0..states.len())
            .map(|index| {
                let values: Vec<f64> = samples.iter().filter_map(|s| s.get(index).copied()).collect();
                if values.is_empty() {
                    warn!(candidate = index, "No score found in completions, defaulting to 0");
                    0.0
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                }
            })
            .collect())
    }

    fn parse_aggregation_answer(
        &self,
        _states: &[ThoughtState],
        texts: &[String],
    ) -> ParseResult<ParsedStates> {
        let mut merged: Vec<ThoughtState> = texts.iter().flat_map(|text| parse_states(text)).collect();
        if merged.len() == 1 {
            if let Some(state) = merged.pop() {
                return Ok(ParsedStates::One(state));
            }
        }
        Ok(ParsedStates::Many(merged))
    }

    fn parse_improve_answer(
        &self,
        _state: &ThoughtState,
        texts: &[String],
    ) -> ParseResult<ThoughtState> {
        let first = texts.first().map(String::as_str).unwrap_or_default();
        Ok(parse_states(first)
            .into_iter()
            .next()
            .unwrap_or_else(|| error_state(first, "no improvement returned")))
    }

    fn parse_validation_answer(&self, _state: &ThoughtState, texts: &[String]) -> ParseResult<bool> {
        let verdicts: Vec<bool> = texts.iter().filter_map(|text| parse_verdict(text)).collect();
        let positive = verdicts.iter().filter(|v| **v).count();
        Ok(!verdicts.is_empty() && positive * 2 > verdicts.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_raw_json() {
        assert_eq!(extract_json_from_completion(" {\"a\": 1} ").unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_fenced_json() {
        let completion = "Here you go:\n```json\n{\"a\": 1}\n```\nDone";
        assert_eq!(extract_json_from_completion(completion).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_plain_fence() {
        let completion = "```\n[1, 2]\n```";
        assert_eq!(extract_json_from_completion(completion).unwrap(), "[1, 2]");
    }

    #[test]
    fn test_extract_no_json() {
        assert!(extract_json_from_completion("no json here").is_err());
    }

    #[test]
    fn test_generate_object_and_array() {
        let parser = JsonResponseParser::new();
        let parsed = parser
            .parse_generate_answer(
                &ThoughtState::new(),
                &texts(&[r#"{"text": "a"}"#, r#"[{"text": "b"}, {"text": "c"}]"#]),
            )
            .unwrap();
        let values: Vec<&Value> = parsed.iter().map(|s| &s["text"]).collect();
        assert_eq!(values, [&json!("a"), &json!("b"), &json!("c")]);
    }

    #[test]
    fn test_generate_malformed_is_error_flagged() {
        let parser = JsonResponseParser::new();
        let parsed = parser
            .parse_generate_answer(&ThoughtState::new(), &texts(&["not json"]))
            .unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0][RAW_RESPONSE_KEY], json!("not json"));
        assert!(parsed[0].contains_key(PARSE_ERROR_KEY));
    }

    #[test]
    fn test_generate_empty_completion_is_error_flagged() {
        let parser = JsonResponseParser::new();
        let parsed = parser
            .parse_generate_answer(&ThoughtState::new(), &texts(&[""]))
            .unwrap();
        assert_eq!(parsed.len(), 1);
        assert!(parsed[0].contains_key(PARSE_ERROR_KEY));
    }

    #[test]
    fn test_score_batch_and_average() {
        let parser = JsonResponseParser::new();
        let states = vec![ThoughtState::new(), ThoughtState::new()];
        let scores = parser
            .parse_score_answer(
                &states,
                &texts(&[r#"{"scores": [2.0, 8.0]}"#, r#"{"scores": [4.0, 6.0]}"#]),
            )
            .unwrap();
        assert_eq!(scores, vec![3.0, 7.0]);
    }

    #[test]
    fn test_score_single_and_free_text() {
        let parser = JsonResponseParser::new();
        let states = vec![ThoughtState::new()];
        assert_eq!(
            parser
                .parse_score_answer(&states, &texts(&[r#"{"score": 5}"#]))
                .unwrap(),
            vec![5.0]
        );
        assert_eq!(
            parser
                .parse_score_answer(&states, &texts(&["I would rate this 7.5 out of 10."]))
                .unwrap(),
            vec![7.5]
        );
    }

    #[test]
    fn test_score_missing_defaults_to_zero() {
        let parser = JsonResponseParser::new();
        let states = vec![ThoughtState::new(), ThoughtState::new()];
        let scores = parser
            .parse_score_answer(&states, &texts(&[r#"{"scores": [9]}"#]))
            .unwrap();
        assert_eq!(scores, vec![9.0, 0.0]);
    }

    #[test]
    fn test_first_number() {
        assert_eq!(first_number("score: 12.5."), Some(12.5));
        assert_eq!(first_number("none"), None);
        assert_eq!(first_number("score: -3"), Some(-3.0));
        assert_eq!(first_number("range 2-4"), Some(2.0));
    }

    #[test]
    fn test_aggregation_single_object_is_one() {
        let parser = JsonResponseParser::new();
        let parsed = parser
            .parse_aggregation_answer(&[], &texts(&[r#"{"summary": "x"}"#]))
            .unwrap();
        assert!(matches!(parsed, ParsedStates::One(_)));
        assert_eq!(parsed.into_vec().len(), 1);
    }

    #[test]
    fn test_aggregation_many() {
        let parser = JsonResponseParser::new();
        let parsed = parser
            .parse_aggregation_answer(&[], &texts(&[r#"{"a": 1}"#, r#"{"a": 2}"#]))
            .unwrap();
        assert_eq!(parsed.into_vec().len(), 2);
    }

    #[test]
    fn test_improve_uses_first_text() {
        let parser = JsonResponseParser::new();
        let delta = parser
            .parse_improve_answer(&ThoughtState::new(), &texts(&[r#"{"fixed": true}"#, "{}"]))
            .unwrap();
        assert_eq!(delta["fixed"], json!(true));
    }

    #[test]
    fn test_improve_without_texts_is_error_flagged() {
        let parser = JsonResponseParser::new();
        let delta = parser.parse_improve_answer(&ThoughtState::new(), &[]).unwrap();
        assert!(delta.contains_key(PARSE_ERROR_KEY));
    }

    #[test]
    fn test_validation_majority() {
        let parser = JsonResponseParser::new();
        let state = ThoughtState::new();
        assert!(parser
            .parse_validation_answer(&state, &texts(&[r#"{"valid": true}"#, "yes", "false"]))
            .unwrap());
        assert!(!parser
            .parse_validation_answer(&state, &texts(&[r#"{"valid": false}"#]))
            .unwrap());
        assert!(!parser.parse_validation_answer(&state, &texts(&["maybe"])).unwrap());
    }
}
