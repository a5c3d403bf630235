//! # minixy-inference
//!
//! LLM inference backends and row enrichment for minixy.
//!
//! This crate provides:
//! - Ollama implementation of [`GenerationBackend`] (default)
//! - OpenAI-compatible implementation (feature `openai`)
//! - The enrichment output schema and its validation gate
//! - [`LlmEnricher`], the model-backed [`RowEnricher`]
//! - [`RuleBasedEnricher`], a deterministic offline [`RowEnricher`]
//!
//! # Feature Flags
//!
//! - `ollama` (default): Enable Ollama backend
//! - `openai` (default): Enable OpenAI-compatible backend
//! - `mock`: Expose the scripted backend in [`mock`] to dependent crates
//!
//! # Example
//!
//! ```rust,no_run
//! use minixy_inference::{LlmEnricher, OllamaBackend};
//! use minixy_core::{CleanedRow, RowEnricher};
//!
//! #[tokio::main]
//! async fn main() {
//!     let enricher = LlmEnricher::new(OllamaBackend::new()).unwrap();
//!     let row = CleanedRow {
//!         company_name: "Acme".to_string(),
//!         ..Default::default()
//!     };
//!     let enriched = enricher.enrich(&row).await.unwrap();
//!     println!("{}", enriched.domain);
//! }
//! ```

pub mod enrichment;
pub mod rules;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

// Scripted backend for tests
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use minixy_core::*;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaBackend, OllamaConfig};

#[cfg(feature = "openai")]
pub use openai::{OpenAIBackend, OpenAIConfig};

pub use enrichment::{output_schema, validate_response, LlmEnricher};
pub use rules::RuleBasedEnricher;
