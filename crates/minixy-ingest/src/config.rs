//! Batch ingestion settings.

use std::time::Duration;

use minixy_core::defaults;

/// Tuning for [`BatchOrchestrator`](crate::BatchOrchestrator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Worker-pool bound for concurrent enrichment (at least 1).
    pub max_concurrency: usize,
    /// Wall-clock budget per row, retries included.
    pub row_timeout: Duration,
    /// Extra attempts for retryable failures.
    pub max_retries: u32,
    /// Linear backoff step between attempts.
    pub retry_backoff: Duration,
    /// Inference calls per second across the batch; 0 disables limiting.
    pub max_requests_per_sec: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_concurrency: defaults::INGEST_MAX_CONCURRENCY,
            row_timeout: Duration::from_secs(defaults::INGEST_ROW_TIMEOUT_SECS),
            max_retries: defaults::INGEST_MAX_RETRIES,
            retry_backoff: Duration::from_millis(defaults::INGEST_RETRY_BACKOFF_MS),
            max_requests_per_sec: defaults::INGEST_MAX_REQUESTS_PER_SEC,
        }
    }
}

impl IngestConfig {
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    pub fn with_row_timeout(mut self, timeout: Duration) -> Self {
        self.row_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_max_requests_per_sec(mut self, rps: u32) -> Self {
        self.max_requests_per_sec = rps;
        self
    }
}
