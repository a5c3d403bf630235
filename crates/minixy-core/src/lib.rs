//! # minixy-core
//!
//! Core types, traits, and abstractions for the minixy company ingestion
//! service.
//!
//! This crate provides the foundational data structures (the raw → cleaned →
//! enriched row lifecycle, persisted company records, upload results) and the
//! trait seams that the store, inference, and pipeline crates implement.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;
pub mod upload_safety;

// Re-export commonly used types at crate root
pub use error::{EnrichError, EnrichErrorKind, Error, Result};
pub use models::*;
pub use traits::*;
pub use upload_safety::{is_csv_upload, validate_upload};
