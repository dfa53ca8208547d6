//! Langbase Pipes client used as the live [`crate::language_model::LanguageModel`].

mod client;
mod types;

pub use client::*;
pub use types::*;
