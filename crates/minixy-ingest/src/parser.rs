//! Tabular (CSV) parser.
//!
//! Never fails: structural problems are reported as [`ParseWarning`]s and
//! whatever rows can be read are returned in input order.

use std::collections::HashSet;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, warn};

use minixy_core::{ParseWarning, ParsedTable, RawRow};

/// Prefix for cells beyond the header width.
pub const EXTRA_COLUMN_PREFIX: &str = "__extra_";

const BOM: char = '\u{feff}';

/// A record with a single whitespace-only cell is a blank line.
fn is_blank(record: &StringRecord) -> bool {
    record.len() == 1 && record.get(0).map(|c| c.trim().is_empty()).unwrap_or(true)
}

/// Trim header names and make duplicates unique (`name`, `name_1`, ...).
fn normalize_headers(record: &StringRecord) -> Vec<String> {
    let mut seen = HashSet::new();
    record
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let base = if i == 0 { h.trim_start_matches(BOM) } else { h }.trim().to_string();
            let mut name = base.clone();
            let mut n = 1;
            while !seen.insert(name.clone()) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            name
        })
        .collect()
}

/// Parse delimited text with a header row.
///
/// The header is the first non-blank record, so leading blank lines do not
/// hide the data below them.
pub fn parse(raw_text: &str) -> ParsedTable {
    let text = raw_text.trim_start_matches(BOM);
    let mut reader = ReaderBuilder::new()
        .delimiter(b',')
        .has_headers(false)
        .trim(Trim::None)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut table = ParsedTable::default();
    let mut width = 0;

    for result in reader.records() {
        // A skipped record never appears in `rows`; its warning points at the
        // slot it would have taken.
        let row_index = table.rows.len();
        let record = match result {
            Ok(r) => r,
            // Reachable only through reader I/O errors; in-memory UTF-8 text
            // with flexible records always decodes.
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or_default();
                warn!(
                    subsystem = "ingest",
                    component = "parser",
                    row_index,
                    line,
                    error = %e,
                    "Skipping unreadable record"
                );
                table.warnings.push(ParseWarning {
                    row_index,
                    message: format!("Unreadable record at line {}: {}", line, e),
                });
                continue;
            }
        };

        if record.is_empty() || is_blank(&record) {
            continue;
        }

        if table.headers.is_empty() {
            table.headers = normalize_headers(&record);
            width = table.headers.len();
            continue;
        }

        let mut row = RawRow::new();
        for (i, header) in table.headers.iter().enumerate() {
            row.insert(header.clone(), record.get(i).map(str::to_string));
        }

        if record.len() != width {
            let message = if record.len() < width {
                format!(
                    "Row has {} fields, expected {}; missing fields left empty",
                    record.len(),
                    width
                )
            } else {
                for (i, cell) in record.iter().enumerate().skip(width) {
                    row.insert(format!("{}{}", EXTRA_COLUMN_PREFIX, i), Some(cell.to_string()));
                }
                format!(
                    "Row has {} fields, expected {}; extra fields kept",
                    record.len(),
                    width
                )
            };
            debug!(row_index, fields = record.len(), expected = width, "Field count mismatch");
            table.warnings.push(ParseWarning { row_index, message });
        }

        table.rows.push(row);
    }

    debug!(
        subsystem = "ingest",
        component = "parser",
        row_count = table.rows.len(),
        warning_count = table.warnings.len(),
        "Parsed upload"
    );
    table
}
