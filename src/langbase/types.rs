use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;

/// Message in a Langbase conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

/// Message role
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

/// Request to run a Langbase pipe
#[derive(Debug, Clone, Serialize)]
pub struct PipeRequest {
    /// Pipe name (required by Langbase API)
    pub name: String,
    pub messages: Vec<Message>,
    /// Disable streaming (default: false for non-streaming response)
    #[serde(default)]
    pub stream: bool,
}

/// Response from a Langbase pipe
#[derive(Debug, Clone, Deserialize)]
pub struct PipeResponse {
    pub success: bool,
    pub completion: String,
    pub raw: Option<RawCompletion>,
}

/// Raw model response details
#[derive(Debug, Clone, Deserialize)]
pub struct RawCompletion {
    pub model: Option<String>,
    pub usage: Option<Usage>,
}

/// Token usage information
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

impl PipeRequest {
    /// Create a new pipe request with name and messages
    pub fn new(name: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            name: name.into(),
            messages,
            stream: false,
        }
    }
}

/// Pipe definition sent when creating or updating the engine's pipe
#[derive(Debug, Clone, Serialize)]
pub struct CreatePipeRequest {
    pub name: String,
    pub description: String,
    pub model: String,
    /// Update the pipe if it already exists
    pub upsert: bool,
    /// JSON output mode
    pub json: bool,
    pub temperature: f64,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
}

impl CreatePipeRequest {
    /// Upserting JSON-mode pipe with `system_prompt` as its only message
    pub fn new(name: impl Into<String>, model: impl Into<String>, system_prompt: &str) -> Self {
        Self {
            name: name.into(),
            description: PIPE_DESCRIPTION.to_string(),
            model: model.into(),
            upsert: true,
            json: true,
            temperature: 1.0,
            max_tokens: 4096,
            messages: vec![Message::system(system_prompt)],
        }
    }
}

/// Description attached to created pipes
pub const PIPE_DESCRIPTION: &str = "Graph-of-Operations engine";

/// Response from creating a pipe
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePipeResponse {
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
}
