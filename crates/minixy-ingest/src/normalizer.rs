//! Deterministic per-row cleanup.
//!
//! Pure and infallible. Column-shift repair is left to enrichment, which has
//! the semantic context to detect it.

use minixy_core::{CleanedRow, RawRow};

/// Canonical form of a header used for tolerant lookup.
fn canonical(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Raw value for a tracked column: exact header first, then canonical match.
fn lookup<'a>(row: &'a RawRow, field: &str) -> &'a str {
    if let Some(v) = row.get(field) {
        return v.as_deref().unwrap_or("");
    }
    let wanted = canonical(field);
    row.iter()
        .find(|(k, _)| canonical(k) == wanted)
        .and_then(|(_, v)| v.as_deref())
        .unwrap_or("")
}

/// Drop control characters that are not whitespace.
fn strip_control(value: &str) -> impl Iterator<Item = char> + '_ {
    value.chars().filter(|c| c.is_whitespace() || !c.is_control())
}

/// Trim and collapse internal whitespace runs to a single space.
pub fn collapse_whitespace(value: &str) -> String {
    let stripped: String = strip_control(value).collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove every whitespace and control character.
pub fn compact(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect()
}

/// Normalize one parsed row. Absent or missing columns become empty strings.
pub fn clean(row: &RawRow) -> CleanedRow {
    CleanedRow {
        company_name: collapse_whitespace(lookup(row, "company_name")),
        country: collapse_whitespace(lookup(row, "country")),
        employee_size: collapse_whitespace(lookup(row, "employee_size")),
        city: collapse_whitespace(lookup(row, "city")),
        domain: compact(lookup(row, "domain")),
    }
}
