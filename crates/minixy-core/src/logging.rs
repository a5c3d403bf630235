//! Structured logging schema and field name constants for minixy.
//!
//! All crates use these constants for consistent structured logging fields.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Request-level failure (store unreachable, unreadable upload) |
//! | WARN  | Row-level enrichment failure, parse warning, slow call |
//! | INFO  | Lifecycle events (startup, shutdown), batch completions |
//! | DEBUG | Per-row decisions, config choices |
//! | TRACE | Raw model payloads |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → batch → inference calls.
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "inference", "ingest"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "parser", "orchestrator", "ollama", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "parse", "enrich", "insert_many", "list"
pub const OPERATION: &str = "op";

// ─── Batch fields ──────────────────────────────────────────────────────────

/// Index of a row within its upload.
pub const ROW_INDEX: &str = "row_index";

/// Number of data rows in an upload.
pub const ROW_COUNT: &str = "row_count";

/// Number of rows that were enriched successfully.
pub const SUCCESS_COUNT: &str = "success_count";

/// Number of rows that failed enrichment.
pub const FAILURE_COUNT: &str = "failure_count";

/// Enrichment attempt number (1-based).
pub const ATTEMPT: &str = "attempt";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of records returned by a query.
pub const RESULT_COUNT: &str = "result_count";

/// Byte length of a prompt.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

/// Byte length of an uploaded file.
pub const UPLOAD_BYTES: &str = "upload_bytes";
