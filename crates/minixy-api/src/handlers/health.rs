//! Liveness and dependency status.

use std::time::Duration;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use tracing::warn;

use minixy_core::defaults;

use crate::state::AppState;

/// Turn a health probe into a status string, bounded by the health-check timeout.
async fn probe<F>(name: &str, check: F) -> &'static str
where
    F: std::future::Future<Output = minixy_core::Result<bool>>,
{
    let timeout = Duration::from_secs(defaults::HEALTH_CHECK_TIMEOUT_SECS);
    match tokio::time::timeout(timeout, check).await {
        Ok(Ok(true)) => "ok",
        Ok(Ok(false)) => "unavailable",
        Ok(Err(e)) => {
            warn!(dependency = name, error = %e, "Health check failed");
            "unavailable"
        }
        Err(_) => {
            warn!(dependency = name, "Health check timed out");
            "unavailable"
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store = probe("store", state.store.health_check()).await;
    let enrichment = probe("enrichment", state.orchestrator.enricher().health_check()).await;

    Json(serde_json::json!({
        "status": if store == "ok" { "healthy" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "store": store,
        "enrichment": enrichment,
    }))
}
