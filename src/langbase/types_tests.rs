//! Unit tests for Langbase API types.
//!
//! Tests request/response serialization and the pipe creation builder.

use super::*;
use serde_json::json;

#[test]
fn test_message_system() {
    let msg = Message::system("You are a helpful assistant");
    assert!(matches!(msg.role, MessageRole::System));
    assert_eq!(msg.content, "You are a helpful assistant");
}

#[test]
fn test_message_user() {
    let msg = Message::user("Hello, world!");
    assert!(matches!(msg.role, MessageRole::User));
    assert_eq!(msg.content, "Hello, world!");
}

#[test]
fn test_message_role_serializes_lowercase() {
    let json = serde_json::to_value(Message::system("x")).unwrap();
    assert_eq!(json["role"], "system");
}

#[test]
fn test_pipe_request_new() {
    let req = PipeRequest::new("test-pipe", vec![Message::user("test")]);
    assert_eq!(req.name, "test-pipe");
    assert_eq!(req.messages.len(), 1);
    assert!(!req.stream);
}

#[test]
fn test_pipe_request_serialization() {
    let req = PipeRequest::new("got", vec![Message::user("prompt")]);
    let json = serde_json::to_value(&req).unwrap();
    assert_eq!(json["name"], "got");
    assert_eq!(json["stream"], false);
    assert_eq!(json["messages"][0]["role"], "user");
    assert_eq!(json["messages"][0]["content"], "prompt");
}

#[test]
fn test_pipe_response_with_usage() {
    let response: PipeResponse = serde_json::from_value(json!({
        "success": true,
        "completion": "{\"text\": \"x\"}",
        "raw": {
            "model": "gpt-4o-mini",
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }
    }))
    .unwrap();

    assert!(response.success);
    let usage = response.raw.unwrap().usage.unwrap();
    assert_eq!(usage.prompt_tokens, Some(10));
    assert_eq!(usage.completion_tokens, Some(5));
}

#[test]
fn test_pipe_response_without_raw() {
    let response: PipeResponse = serde_json::from_value(json!({
        "success": true,
        "completion": "plain"
    }))
    .unwrap();
    assert!(response.raw.is_none());
}

#[test]
fn test_create_pipe_request_defaults() {
    let req = CreatePipeRequest::new("got-pipe", "openai:gpt-4o-mini", "sys");

    assert_eq!(req.name, "got-pipe");
    assert_eq!(req.description, PIPE_DESCRIPTION);
    assert_eq!(req.model, "openai:gpt-4o-mini");
    assert!(req.upsert);
    assert!(req.json);
    assert_eq!(req.messages.len(), 1);
    assert!(matches!(req.messages[0].role, MessageRole::System));
}

#[test]
fn test_create_pipe_request_serialization() {
    let json = serde_json::to_value(CreatePipeRequest::new("p", "m", "sys")).unwrap();
    assert_eq!(json["name"], "p");
    assert_eq!(json["upsert"], true);
    assert_eq!(json["json"], true);
    assert_eq!(json["max_tokens"], 4096);
    assert_eq!(json["messages"][0]["content"], "sys");
}

#[test]
fn test_create_pipe_response_ignores_extra_fields() {
    let response: CreatePipeResponse = serde_json::from_value(json!({
        "name": "p",
        "status": "public",
        "url": "https://langbase.com/x/p"
    }))
    .unwrap();
    assert_eq!(response.name, "p");
    assert_eq!(response.status.as_deref(), Some("public"));
}
