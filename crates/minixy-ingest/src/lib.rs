//! # minixy-ingest
//!
//! Bulk company ingestion pipeline for minixy.
//!
//! Raw upload text flows through three stages:
//!
//! 1. [`parser::parse`] splits delimited text into ordered rows, collecting
//!    structural problems as warnings instead of failing.
//! 2. [`normalizer::clean`] deterministically tidies each row.
//! 3. [`BatchOrchestrator`] enriches rows concurrently through a
//!    [`RowEnricher`](minixy_core::RowEnricher), isolating per-row failures.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use minixy_ingest::{BatchOrchestrator, IngestConfig};
//! use minixy_inference::RuleBasedEnricher;
//!
//! let orchestrator = BatchOrchestrator::new(
//!     Arc::new(RuleBasedEnricher::new()?),
//!     IngestConfig::default(),
//! );
//! let result = orchestrator.process("company_name,country\nAcme,Paris\n").await;
//! assert_eq!(result.row_count, 1);
//! ```

pub mod config;
pub mod normalizer;
pub mod orchestrator;
pub mod parser;

// Re-export core types
pub use minixy_core::*;

pub use config::IngestConfig;
pub use normalizer::clean;
pub use orchestrator::BatchOrchestrator;
pub use parser::parse;
