//! Data model for the ingestion pipeline and the company store.
//!
//! A row moves through three stages: [`RawRow`] (as parsed from the upload),
//! [`CleanedRow`] (deterministically normalized) and [`EnrichedRow`]
//! (schema-validated output of enrichment). Only enriched rows are ever
//! turned into [`NewCompany`] inserts.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{EnrichError, EnrichErrorKind, Error};

// =============================================================================
// PARSER OUTPUT
// =============================================================================

/// One parsed upload row: column name → cell value. `None` means the row had
/// no cell at that position.
pub type RawRow = BTreeMap<String, Option<String>>;

/// Non-fatal problem found while parsing a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseWarning {
    /// Zero-based index into the parsed rows.
    pub row_index: usize,
    pub message: String,
}

/// Output of the tabular parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    pub warnings: Vec<ParseWarning>,
}

// =============================================================================
// EMPLOYEE SIZE BUCKETS
// =============================================================================

/// Fixed, ordered employee-size bucket enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EmployeeSize {
    #[serde(rename = "1-10")]
    Micro,
    #[serde(rename = "11-50")]
    Small,
    #[serde(rename = "51-200")]
    Medium,
    #[serde(rename = "201-500")]
    MidMarket,
    #[serde(rename = "501-1000")]
    Large,
    #[serde(rename = "1001-5000")]
    Enterprise,
    #[serde(rename = "5001-10000")]
    BigEnterprise,
    #[serde(rename = "10000+")]
    Giant,
}

impl EmployeeSize {
    /// All buckets in ascending order.
    pub const ALL: [EmployeeSize; 8] = [
        EmployeeSize::Micro,
        EmployeeSize::Small,
        EmployeeSize::Medium,
        EmployeeSize::MidMarket,
        EmployeeSize::Large,
        EmployeeSize::Enterprise,
        EmployeeSize::BigEnterprise,
        EmployeeSize::Giant,
    ];

    /// Canonical wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Micro => "1-10",
            Self::Small => "11-50",
            Self::Medium => "51-200",
            Self::MidMarket => "201-500",
            Self::Large => "501-1000",
            Self::Enterprise => "1001-5000",
            Self::BigEnterprise => "5001-10000",
            Self::Giant => "10000+",
        }
    }

    /// Canonical wire values in bucket order.
    pub fn values() -> Vec<&'static str> {
        Self::ALL.iter().map(|b| b.as_str()).collect()
    }

    /// Bucket containing an exact headcount.
    pub fn from_headcount(count: u64) -> Self {
        match count {
            0..=10 => Self::Micro,
            11..=50 => Self::Small,
            51..=200 => Self::Medium,
            201..=500 => Self::MidMarket,
            501..=1000 => Self::Large,
            1001..=5000 => Self::Enterprise,
            5001..=10000 => Self::BigEnterprise,
            _ => Self::Giant,
        }
    }
}

impl fmt::Display for EmployeeSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmployeeSize {
    type Err = Error;

    /// Strict: only the exact canonical values are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "employee_size must be one of {}, got {:?}",
                    Self::values().join(", "),
                    s
                ))
            })
    }
}

// =============================================================================
// CLEANED / ENRICHED ROWS
// =============================================================================

/// Deterministically normalized view of a [`RawRow`].
///
/// Every value is trimmed with internal whitespace runs collapsed to one
/// space; `domain` contains no whitespace at all. Absent columns are empty.
/// `company_name` is carried as context only and is never enriched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanedRow {
    pub company_name: String,
    pub country: String,
    pub employee_size: String,
    pub city: String,
    pub domain: String,
}

/// A fully enriched, schema-conforming row.
///
/// Never partially populated: the four tracked fields are always non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedRow {
    pub company_name: Option<String>,
    pub country: String,
    pub employee_size: EmployeeSize,
    pub city: String,
    pub domain: String,
}

// =============================================================================
// STORE ENTITIES
// =============================================================================

/// Persisted company record. Identity and timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub id: i64,
    pub company_name: Option<String>,
    pub employee_size: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub domain: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for the store. Carries no id or timestamps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompany {
    pub company_name: Option<String>,
    pub employee_size: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub domain: Option<String>,
}

impl From<&EnrichedRow> for NewCompany {
    fn from(row: &EnrichedRow) -> Self {
        Self {
            company_name: row.company_name.clone(),
            employee_size: Some(row.employee_size.as_str().to_string()),
            country: Some(row.country.clone()),
            city: Some(row.city.clone()),
            domain: Some(row.domain.clone()),
        }
    }
}

impl NewCompany {
    /// Check every value against its column width in the store.
    pub fn validate(&self) -> crate::Result<()> {
        let columns = [
            ("company_name", &self.company_name, defaults::COMPANY_NAME_MAX_CHARS),
            ("employee_size", &self.employee_size, defaults::EMPLOYEE_SIZE_MAX_CHARS),
            ("country", &self.country, defaults::COUNTRY_MAX_CHARS),
            ("city", &self.city, defaults::CITY_MAX_CHARS),
            ("domain", &self.domain, defaults::DOMAIN_MAX_CHARS),
        ];
        for (column, value, max) in columns {
            if let Some(value) = value {
                let len = value.chars().count();
                if len > max {
                    return Err(Error::InvalidInput(format!(
                        "{} is {} characters long, maximum is {}",
                        column, len, max
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Listing filter. All constraints are optional and combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyFilter {
    /// Case-insensitive substring match on `domain`.
    pub domain_contains: Option<String>,
    /// Exact match on `country`.
    pub country: Option<String>,
    /// Exact match on `employee_size`.
    pub employee_size: Option<String>,
}

impl CompanyFilter {
    /// True when no constraint is set.
    pub fn is_empty(&self) -> bool {
        self.domain_contains.is_none() && self.country.is_none() && self.employee_size.is_none()
    }

    /// Evaluate the filter against a record. A record with a NULL field never
    /// satisfies a constraint on that field.
    pub fn matches(&self, record: &CompanyRecord) -> bool {
        if let Some(needle) = &self.domain_contains {
            let hit = record
                .domain
                .as_deref()
                .map(|d| d.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false);
            if !hit {
                return false;
            }
        }
        if let Some(country) = &self.country {
            if record.country.as_deref() != Some(country.as_str()) {
                return false;
            }
        }
        if let Some(size) = &self.employee_size {
            if record.employee_size.as_deref() != Some(size.as_str()) {
                return false;
            }
        }
        true
    }
}

// =============================================================================
// BATCH RESULT
// =============================================================================

/// Failure marker for one row of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFailure {
    /// Index of the row in the parsed upload.
    pub index: usize,
    pub kind: EnrichErrorKind,
    pub reason: String,
}

impl RowFailure {
    pub fn new(index: usize, err: &EnrichError) -> Self {
        Self {
            index,
            kind: err.kind(),
            reason: err.to_string(),
        }
    }
}

/// Aggregate outcome of processing one upload. Not persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    /// Number of data rows seen (blank lines excluded).
    pub row_count: usize,
    pub headers: Vec<String>,
    /// Successfully enriched rows, in original row order.
    pub enriched_rows: Vec<EnrichedRow>,
    /// Failed rows, sorted by index.
    pub failures: Vec<RowFailure>,
    pub parse_errors: Vec<ParseWarning>,
}
