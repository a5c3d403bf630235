//! Core traits for minixy abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::{EnrichError, Result};
use crate::models::*;

// =============================================================================
// COMPANY REPOSITORY
// =============================================================================

/// Record Store Gateway for company records.
///
/// Implementations assign `id`, `created_at` and `updated_at`; callers never
/// supply them.
#[async_trait]
pub trait CompanyRepository: Send + Sync {
    /// Insert a single company.
    async fn insert(&self, company: NewCompany) -> Result<CompanyRecord>;

    /// Append many companies as one operation, returning them with their
    /// assigned identities in input order.
    async fn insert_many(&self, companies: Vec<NewCompany>) -> Result<Vec<CompanyRecord>>;

    /// List companies matching the filter, ordered by id.
    async fn list(&self, filter: CompanyFilter) -> Result<Vec<CompanyRecord>>;

    /// Remove every company. Returns the number of deleted records.
    async fn delete_all(&self) -> Result<u64>;

    /// Check if the store is reachable.
    async fn health_check(&self) -> Result<bool>;
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for schema-constrained text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a response constrained to the given JSON Schema.
    ///
    /// Returns the raw response text; backends enforce the schema on a
    /// best-effort basis, so callers must still validate it.
    async fn generate_structured(
        &self,
        system: &str,
        prompt: &str,
        schema: &JsonValue,
    ) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Generation backend that can report its own availability.
#[async_trait]
pub trait InferenceBackend: GenerationBackend {
    /// Check if the backend is available and responding.
    async fn health_check(&self) -> Result<bool>;
}

// =============================================================================
// ENRICHMENT
// =============================================================================

/// Resolves a cleaned row into a fully populated, validated enriched row.
///
/// Implementations must either return a complete [`EnrichedRow`] or fail;
/// they never return partially filled data.
#[async_trait]
pub trait RowEnricher: Send + Sync {
    async fn enrich(&self, row: &CleanedRow) -> std::result::Result<EnrichedRow, EnrichError>;

    /// Short name for logs and health output.
    fn name(&self) -> &str;

    /// Check that whatever the enricher depends on is reachable.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
