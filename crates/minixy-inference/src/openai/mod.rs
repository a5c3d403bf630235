//! OpenAI-compatible inference backend.
//!
//! Works with any endpoint that implements `/chat/completions` with
//! `response_format: json_schema`, including:
//!
//! - OpenAI cloud API
//! - Azure OpenAI
//! - Ollama (in OpenAI compatibility mode)
//! - vLLM
//! - OpenRouter
//!
//! # Example
//!
//! ```rust,no_run
//! use minixy_inference::openai::{OpenAIBackend, OpenAIConfig};
//! use minixy_core::GenerationBackend;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = OpenAIConfig {
//!         base_url: "http://localhost:11434/v1".to_string(), // Ollama
//!         api_key: None, // Not needed for local
//!         gen_model: "llama3.1:8b".to_string(),
//!         ..Default::default()
//!     };
//!     let backend = OpenAIBackend::new(config).unwrap();
//!     let schema = json!({"type": "object", "properties": {"greeting": {"type": "string"}}});
//!     let text = backend
//!         .generate_structured("Reply in JSON.", "Hello", &schema)
//!         .await
//!         .unwrap();
//! }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{OpenAIBackend, OpenAIConfig, DEFAULT_GEN_MODEL, DEFAULT_OPENAI_URL, DEFAULT_TIMEOUT_SECS};
pub use error::{to_minixy_error, OpenAIErrorCode};
pub use types::*;
