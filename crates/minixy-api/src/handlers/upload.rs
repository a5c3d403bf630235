//! CSV upload: validate, run the ingestion pipeline, persist enriched rows.

use std::time::Instant;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use tracing::{error, info, warn};

use minixy_core::{validate_upload, EnrichedRow, NewCompany, ParseWarning, RowFailure};

use crate::error::ApiError;
use crate::state::AppState;

pub const UPLOAD_SUCCESS_MESSAGE: &str = "CSV uploaded and processed successfully";

/// Response of the enrichment variant.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: &'static str,
    pub row_count: usize,
    pub headers: Vec<String>,
    pub data: Vec<EnrichedRow>,
    pub failures: Vec<RowFailure>,
    pub parse_errors: Vec<ParseWarning>,
}

/// Response of the parse-only variant.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseOnlyResponse {
    pub message: &'static str,
    pub row_count: usize,
    pub headers: Vec<String>,
}

struct UploadedFile {
    filename: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

/// Take the first part named `file`.
async fn read_file_part(multipart: &mut Multipart) -> Result<Option<UploadedFile>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read file data: {}", e)))?
                .to_vec();
            return Ok(Some(UploadedFile {
                filename,
                content_type,
                data,
            }));
        }
    }
    Ok(None)
}

pub async fn upload_csv(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let start = Instant::now();
    let file = read_file_part(&mut multipart)
        .await?
        .ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;

    validate_upload(
        file.filename.as_deref(),
        file.content_type.as_deref(),
        &file.data,
        state.upload.max_upload_bytes,
    )
    .map_err(|e| {
        warn!(
            subsystem = "api",
            filename = file.filename.as_deref().unwrap_or(""),
            upload_bytes = file.data.len(),
            error = %e,
            "Upload rejected"
        );
        ApiError::from(e)
    })?;

    let text = String::from_utf8_lossy(&file.data);
    info!(
        subsystem = "api",
        filename = file.filename.as_deref().unwrap_or(""),
        upload_bytes = file.data.len(),
        enrich = state.upload.enrich,
        "CSV upload received"
    );

    if !state.upload.enrich {
        let table = state.orchestrator.process_without_enrichment(&text);
        return Ok((
            StatusCode::CREATED,
            Json(serde_json::to_value(ParseOnlyResponse {
                message: UPLOAD_SUCCESS_MESSAGE,
                row_count: table.rows.len(),
                headers: table.headers,
            })
            .map_err(|e| ApiError::Internal(e.to_string()))?),
        ));
    }

    let result = state.orchestrator.process(&text).await;

    if state.upload.persist && !result.enriched_rows.is_empty() {
        let companies: Vec<NewCompany> = result.enriched_rows.iter().map(NewCompany::from).collect();
        state.store.insert_many(companies).await.map_err(|e| {
            error!(subsystem = "api", op = "insert_many", error = %e, "Error storing enriched rows");
            ApiError::Internal("Failed to process CSV file".to_string())
        })?;
    }

    info!(
        subsystem = "api",
        row_count = result.row_count,
        success_count = result.enriched_rows.len(),
        failure_count = result.failures.len(),
        persisted = state.upload.persist,
        duration_ms = start.elapsed().as_millis() as u64,
        "CSV upload processed"
    );

    let response = UploadResponse {
        message: UPLOAD_SUCCESS_MESSAGE,
        row_count: result.row_count,
        headers: result.headers,
        data: result.enriched_rows,
        failures: result.failures,
        parse_errors: result.parse_errors,
    };
    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(response).map_err(|e| ApiError::Internal(e.to_string()))?),
    ))
}
