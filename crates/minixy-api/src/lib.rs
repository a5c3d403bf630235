//! # minixy-api
//!
//! HTTP surface for the minixy company ingestion service.
//!
//! | Route | Method | Purpose |
//! |-------|--------|---------|
//! | `/api/upload-csv` | POST | multipart CSV upload (`file` part), enrich and store |
//! | `/api/companies` | GET | list with `domain`, `country`, `employeeSize` filters |
//! | `/api/companies` | POST | create one company |
//! | `/api/companies` | DELETE | delete every company |
//! | `/health` | GET | service and dependency status |

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub use config::AppConfig;
pub use error::ApiError;
pub use state::AppState;

/// Multipart framing allowance on top of the file size limit.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Build the application router with middleware.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .upload
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/upload-csv", post(handlers::upload_csv))
        .route(
            "/api/companies",
            get(handlers::list_companies)
                .post(handlers::create_company)
                .delete(handlers::delete_companies),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT]),
        )
        .with_state(state)
}
