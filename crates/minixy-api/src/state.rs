//! Shared handler state and its construction from configuration.

use std::sync::Arc;

use tracing::info;

use minixy_core::{CompanyRepository, Result, RowEnricher};
use minixy_db::{Database, InMemoryCompanyRepository};
use minixy_inference::{LlmEnricher, OllamaBackend, OpenAIBackend, RuleBasedEnricher};
use minixy_ingest::BatchOrchestrator;

use crate::config::{AppConfig, BackendKind, DatabaseConfig, InferenceSettings, UploadConfig};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CompanyRepository>,
    pub orchestrator: BatchOrchestrator,
    pub upload: UploadConfig,
}

impl AppState {
    pub fn new(
        store: Arc<dyn CompanyRepository>,
        orchestrator: BatchOrchestrator,
        upload: UploadConfig,
    ) -> Self {
        Self {
            store,
            orchestrator,
            upload,
        }
    }

    /// Connect the store and build the enricher described by `config`.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let store = connect_store(&config.database).await?;
        let enricher = build_enricher(&config.inference)?;
        let orchestrator = BatchOrchestrator::new(enricher, config.ingest.clone());
        Ok(Self::new(store, orchestrator, config.upload.clone()))
    }
}

/// Open the configured record store, running migrations for PostgreSQL.
pub async fn connect_store(config: &DatabaseConfig) -> Result<Arc<dyn CompanyRepository>> {
    if config.is_memory() {
        info!(subsystem = "db", "Using in-memory company store");
        return Ok(Arc::new(InMemoryCompanyRepository::new()));
    }

    let db = Database::connect_with_config(&config.url, config.pool_config()).await?;
    db.migrate().await?;
    info!(subsystem = "db", "Database migrations applied");
    Ok(Arc::new(db.companies))
}

/// Build the row enricher for the configured backend.
pub fn build_enricher(settings: &InferenceSettings) -> Result<Arc<dyn RowEnricher>> {
    let enricher: Arc<dyn RowEnricher> = match settings.backend {
        BackendKind::Ollama => {
            let config = settings.ollama_config();
            info!(
                subsystem = "inference",
                backend = "ollama",
                url = %config.base_url,
                model = %config.gen_model,
                "Configured enrichment backend"
            );
            Arc::new(LlmEnricher::new(OllamaBackend::with_config(config))?)
        }
        BackendKind::OpenAI => {
            let config = settings.openai_config();
            info!(
                subsystem = "inference",
                backend = "openai",
                url = %config.base_url,
                model = %config.gen_model,
                has_api_key = config.api_key.is_some(),
                "Configured enrichment backend"
            );
            Arc::new(LlmEnricher::new(OpenAIBackend::new(config)?)?)
        }
        BackendKind::Rules => {
            info!(subsystem = "inference", backend = "rules", "Configured enrichment backend");
            Arc::new(RuleBasedEnricher::new()?)
        }
    };
    Ok(enricher)
}
