//! Upload validation for tabular (CSV) files.
//!
//! Checks, in order:
//! 1. File type: name ends in `.csv` or declared content type is `text/csv`
//! 2. Size limit
//! 3. Magic byte detection: binary payloads (spreadsheets, archives, PDFs)
//!    are rejected even when named `.csv`

use crate::error::{Error, Result};

/// True when the upload is acceptable as CSV by name or declared type.
///
/// Either signal is sufficient; an upload is rejected only when the name does
/// not end in `.csv` *and* the content type is not `text/csv`.
pub fn is_csv_upload(filename: Option<&str>, content_type: Option<&str>) -> bool {
    let by_name = filename
        .map(|n| n.to_lowercase().ends_with(".csv"))
        .unwrap_or(false);
    let by_type = content_type
        .map(|ct| {
            ct.split(';')
                .next()
                .map(|essence| essence.trim().eq_ignore_ascii_case("text/csv"))
                .unwrap_or(false)
        })
        .unwrap_or(false);
    by_name || by_type
}

/// Validate an uploaded file before parsing.
///
/// Returns `Error::InvalidInput` with a human-readable message on rejection.
pub fn validate_upload(
    filename: Option<&str>,
    content_type: Option<&str>,
    data: &[u8],
    max_size_bytes: usize,
) -> Result<()> {
    if !is_csv_upload(filename, content_type) {
        return Err(Error::InvalidInput("File must be a CSV".to_string()));
    }

    if data.len() > max_size_bytes {
        return Err(Error::InvalidInput(format!(
            "File size must be less than {}MB",
            max_size_bytes / (1024 * 1024)
        )));
    }

    if let Some(kind) = infer::get(data) {
        return Err(Error::InvalidInput(format!(
            "File must be a CSV (detected {})",
            kind.mime_type()
        )));
    }

    Ok(())
}
