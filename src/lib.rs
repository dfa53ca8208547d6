//! # Graph of Operations
//!
//! An execution engine for LLM reasoning workflows expressed as a directed
//! acyclic graph of operations. Each operation consumes the thoughts of its
//! predecessors and produces its own: generating alternatives, scoring them,
//! keeping the best, merging, validating and repairing.
//!
//! ## Architecture
//!
//! ```text
//! Workflow builder → GraphOfOperations → Controller (FIFO ready-queue)
//!                                            ↓
//!                      LanguageModel / Prompter / ResponseParser
//!                                            ↓
//!                        Langbase Pipes (HTTP) or scripted replay
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use graph_of_operations::{workflows, Controller, JsonPrompter, JsonResponseParser};
//! use graph_of_operations::language_model::ReplayModel;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let graph = workflows::best_of_n(3, 1, None)?;
//!     let lm = Arc::new(ReplayModel::new([r#"{"text": "draft"}"#, r#"{"score": 7}"#]));
//!     let mut controller = Controller::new(
//!         lm,
//!         graph,
//!         Arc::new(JsonPrompter::new()),
//!         Arc::new(JsonResponseParser::new()),
//!         serde_json::Map::new(),
//!     );
//!     controller.run().await?;
//!     println!("{:?}", controller.final_thoughts()?);
//!     Ok(())
//! }
//! ```

/// Configuration loaded from the environment.
pub mod config;
/// Scheduler, execution tracking and graph snapshots.
pub mod controller;
/// Error types and result aliases.
pub mod error;
/// The operation graph arena.
pub mod graph;
/// Langbase Pipes client.
pub mod langbase;
/// Language model seam and offline replay model.
pub mod language_model;
/// Operation variants and their execution context.
pub mod operations;
/// Completion parsing.
pub mod parser;
/// Prompt templates.
pub mod prompts;
/// Thoughts and identifier sequences.
pub mod thought;
/// Prebuilt workflow graphs.
pub mod workflows;

pub use config::Config;
pub use controller::{Controller, ExecutionTrace, SnapshotEntry};
pub use error::{AppError, AppResult, CollaboratorError, StructuralError};
pub use graph::{GraphOfOperations, OperationId};
pub use language_model::{LanguageModel, ReplayModel, UsageSummary};
pub use parser::{JsonResponseParser, ResponseParser};
pub use prompts::{JsonPrompter, Prompter};
pub use thought::{IdSequence, Thought, ThoughtId, ThoughtState};
