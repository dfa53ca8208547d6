use thiserror::Error;

use crate::graph::OperationId;
use crate::thought::ThoughtId;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Structural violation: {0}")]
    Structural(#[from] StructuralError),

    #[error("Collaborator failure: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Language model error: {0}")]
    LanguageModel(#[from] LanguageModelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Precondition failures caused by a malformed graph.
///
/// These always abort the run: they describe a graph the caller built wrong,
/// not a runtime or data problem.
#[derive(Debug, Error)]
pub enum StructuralError {
    #[error("Operation {operation_id} executed before all predecessors completed")]
    NotReady { operation_id: OperationId },

    #[error("Operation {operation_id} has already been executed")]
    AlreadyExecuted { operation_id: OperationId },

    #[error("{kind} operation {operation_id} needs at least one predecessor")]
    MissingPredecessor {
        kind: &'static str,
        operation_id: OperationId,
    },

    #[error("KeepBestN operation {operation_id} received unscored thought {thought_id}")]
    UnscoredThought {
        operation_id: OperationId,
        thought_id: ThoughtId,
    },

    #[error("KeepBestN operation must keep at least one thought")]
    InvalidKeepCount,

    #[error("The operations graph has no root")]
    EmptyGraph,

    #[error("First operation should have no predecessors")]
    FirstOperationHasPredecessors,

    #[error("Unknown operation: {operation_id}")]
    UnknownOperation { operation_id: OperationId },

    #[error("Edge {from} -> {to} would create a cycle")]
    Cycle { from: OperationId, to: OperationId },

    #[error("Edge {from} -> {to} already exists")]
    DuplicateEdge { from: OperationId, to: OperationId },

    #[error("The run method has not been executed")]
    RunNotExecuted,
}

/// Failures reported by the language model or response parser while an
/// operation executes.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("Parse failed: {message}")]
    Parse { message: String },

    #[error("Parser returned no score for operation {operation_id}")]
    MissingScore { operation_id: OperationId },
}

/// Language model errors
#[derive(Debug, Error)]
pub enum LanguageModelError {
    #[error("Language model unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for response parsing
pub type ParseResult<T> = Result<T, CollaboratorError>;

/// Result type alias for language model operations
pub type LanguageModelResult<T> = Result<T, LanguageModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "missing key".to_string(),
        };
        assert_eq!(err.to_string(), "Configuration error: missing key");
    }

    #[test]
    fn test_structural_error_display() {
        let err = StructuralError::NotReady {
            operation_id: OperationId::new(3),
        };
        assert_eq!(
            err.to_string(),
            "Operation op-3 executed before all predecessors completed"
        );

        let err = StructuralError::MissingPredecessor {
            kind: "Score",
            operation_id: OperationId::new(0),
        };
        assert_eq!(
            err.to_string(),
            "Score operation op-0 needs at least one predecessor"
        );

        let err = StructuralError::UnscoredThought {
            operation_id: OperationId::new(2),
            thought_id: ThoughtId::new(7),
        };
        assert_eq!(
            err.to_string(),
            "KeepBestN operation op-2 received unscored thought 7"
        );

        assert_eq!(
            StructuralError::RunNotExecuted.to_string(),
            "The run method has not been executed"
        );
        assert_eq!(
            StructuralError::EmptyGraph.to_string(),
            "The operations graph has no root"
        );
    }

    #[test]
    fn test_collaborator_error_display() {
        let err = CollaboratorError::Parse {
            message: "not json".to_string(),
        };
        assert_eq!(err.to_string(), "Parse failed: not json");

        let err = CollaboratorError::MissingScore {
            operation_id: OperationId::new(1),
        };
        assert_eq!(err.to_string(), "Parser returned no score for operation op-1");
    }

    #[test]
    fn test_language_model_error_display() {
        let err = LanguageModelError::Unavailable {
            message: "server down".to_string(),
            retries: 3,
        };
        assert_eq!(
            err.to_string(),
            "Language model unavailable: server down (retries: 3)"
        );

        let err = LanguageModelError::Api {
            status: 401,
            message: "unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 401 - unauthorized");

        let err = LanguageModelError::Timeout { timeout_ms: 5000 };
        assert_eq!(err.to_string(), "Request timeout after 5000ms");
    }

    #[test]
    fn test_structural_error_conversion_to_app_error() {
        let app_err: AppError = StructuralError::EmptyGraph.into();
        assert!(matches!(app_err, AppError::Structural(_)));
        assert!(app_err.to_string().contains("no root"));
    }

    #[test]
    fn test_collaborator_error_conversion_to_app_error() {
        let err = CollaboratorError::Parse {
            message: "bad".to_string(),
        };
        let app_err: AppError = err.into();
        assert!(matches!(app_err, AppError::Collaborator(_)));
    }

    #[test]
    fn test_language_model_error_conversion_to_app_error() {
        let app_err: AppError = LanguageModelError::Timeout { timeout_ms: 1000 }.into();
        assert!(matches!(app_err, AppError::LanguageModel(_)));
    }
}
