//! Batch orchestration: parse, normalize, then enrich every row concurrently.
//!
//! Rows are fanned out on a [`JoinSet`] behind a [`Semaphore`] so at most
//! `max_concurrency` enrichment calls run at once. Each row is bounded by
//! `row_timeout` (retries included). A failed row is recorded against its
//! index and never aborts the batch. Dropping the future returned by
//! [`BatchOrchestrator::process`] aborts every in-flight row.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use minixy_core::{
    CleanedRow, EnrichError, EnrichedRow, NewCompany, ParsedTable, RowEnricher, RowFailure,
    UploadResult,
};

use crate::config::IngestConfig;
use crate::normalizer::clean;
use crate::parser::parse;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

type RowOutcome = std::result::Result<EnrichedRow, EnrichError>;

/// Runs uploads through the ingestion pipeline.
#[derive(Clone)]
pub struct BatchOrchestrator {
    enricher: Arc<dyn RowEnricher>,
    config: IngestConfig,
    limiter: Option<Arc<DirectLimiter>>,
}

impl BatchOrchestrator {
    pub fn new(enricher: Arc<dyn RowEnricher>, config: IngestConfig) -> Self {
        let limiter = NonZeroU32::new(config.max_requests_per_sec)
            .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps))));
        Self {
            enricher,
            config,
            limiter,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn enricher(&self) -> &Arc<dyn RowEnricher> {
        &self.enricher
    }

    /// Parse only. Rows are not enriched and nothing fails per row.
    pub fn process_without_enrichment(&self, raw_text: &str) -> ParsedTable {
        let table = parse(raw_text);
        log_parse_warnings(&table);
        info!(
            subsystem = "ingest",
            component = "orchestrator",
            op = "parse",
            row_count = table.rows.len(),
            "Upload parsed without enrichment"
        );
        table
    }

    /// Parse, normalize and enrich an upload.
    ///
    /// `enriched_rows` keeps input order for the successful subset and
    /// `failures` is sorted by row index.
    pub async fn process(&self, raw_text: &str) -> UploadResult {
        let start = Instant::now();
        let table = parse(raw_text);
        log_parse_warnings(&table);

        let row_count = table.rows.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut task_rows = HashMap::with_capacity(row_count);

        for (index, raw) in table.rows.iter().enumerate() {
            let worker = RowWorker {
                enricher: Arc::clone(&self.enricher),
                limiter: self.limiter.clone(),
                semaphore: Arc::clone(&semaphore),
                config: self.config.clone(),
            };
            let row = clean(raw);
            let handle = tasks.spawn(async move { (index, worker.run(index, row).await) });
            task_rows.insert(handle.id(), index);
        }

        let mut outcomes: Vec<(usize, RowOutcome)> = Vec::with_capacity(row_count);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    let Some(index) = task_rows.get(&e.id()).copied() else {
                        error!(error = %e, "Enrichment task failed for an unknown row");
                        continue;
                    };
                    let err = if e.is_cancelled() {
                        EnrichError::Cancelled
                    } else {
                        EnrichError::Internal(format!("enrichment task panicked: {}", e))
                    };
                    warn!(row_index = index, error = %err, "Enrichment task did not complete");
                    outcomes.push((index, Err(err)));
                }
            }
        }
        outcomes.sort_by_key(|(index, _)| *index);

        let mut enriched_rows = Vec::new();
        let mut failures = Vec::new();
        for (index, outcome) in outcomes {
            match outcome {
                Ok(row) => enriched_rows.push(row),
                Err(err) => failures.push(RowFailure::new(index, &err)),
            }
        }

        info!(
            subsystem = "ingest",
            component = "orchestrator",
            op = "enrich",
            enricher = self.enricher.name(),
            row_count,
            success_count = enriched_rows.len(),
            failure_count = failures.len(),
            parse_warning_count = table.warnings.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch enrichment completed"
        );

        UploadResult {
            row_count,
            headers: table.headers,
            enriched_rows,
            failures,
            parse_errors: table.warnings,
        }
    }
}

fn log_parse_warnings(table: &ParsedTable) {
    for w in &table.warnings {
        warn!(
            subsystem = "ingest",
            component = "parser",
            row_index = w.row_index,
            message = %w.message,
            "Parse warning"
        );
    }
}

/// Reject rows the store could not hold, so one oversized value cannot fail
/// the whole batch insert.
fn storable(row: EnrichedRow) -> RowOutcome {
    NewCompany::from(&row)
        .validate()
        .map_err(|e| EnrichError::InvalidRecord(e.to_string()))?;
    Ok(row)
}

/// Everything a spawned row task needs, owned.
struct RowWorker {
    enricher: Arc<dyn RowEnricher>,
    limiter: Option<Arc<DirectLimiter>>,
    semaphore: Arc<Semaphore>,
    config: IngestConfig,
}

impl RowWorker {
    async fn run(self, index: usize, row: CleanedRow) -> RowOutcome {
        let _permit = match Arc::clone(&self.semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return Err(EnrichError::Cancelled),
        };

        let start = Instant::now();
        let budget = self.config.row_timeout;
        let outcome = match tokio::time::timeout(budget, self.attempt_all(index, &row)).await {
            Ok(outcome) => outcome.and_then(storable),
            Err(_) => Err(EnrichError::Timeout(format!(
                "row exceeded {}s budget",
                budget.as_secs_f64()
            ))),
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => debug!(row_index = index, duration_ms, "Row enriched"),
            Err(e) => warn!(
                subsystem = "ingest",
                component = "orchestrator",
                row_index = index,
                kind = ?e.kind(),
                error = %e,
                duration_ms,
                "Row enrichment failed"
            ),
        }
        outcome
    }

    async fn attempt_all(&self, index: usize, row: &CleanedRow) -> RowOutcome {
        let mut attempt: u32 = 1;
        loop {
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }
            match self.enricher.enrich(row).await {
                Ok(enriched) => return Ok(enriched),
                Err(e) if e.is_retryable() && attempt <= self.config.max_retries => {
                    let backoff = self.config.retry_backoff * attempt;
                    debug!(
                        row_index = index,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Retrying row enrichment"
                    );
                    if backoff > Duration::ZERO {
                        tokio::time::sleep(backoff).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use minixy_core::{EmployeeSize, EnrichErrorKind, Error};
    use minixy_inference::mock::ScriptedBackend;
    use minixy_inference::LlmEnricher;

    const HEADER: &str = "company_name,country,employee_size,city,domain\n";

    fn answer(country: &str) -> String {
        format!(
            r#"{{"country":"{}","employee_size":"11-50","city":"Somewhere","domain":"example.com"}}"#,
            country
        )
    }

    fn orchestrator(backend: ScriptedBackend, config: IngestConfig) -> BatchOrchestrator {
        let enricher = LlmEnricher::new(backend).unwrap();
        BatchOrchestrator::new(Arc::new(enricher), config)
    }

    fn fast_config() -> IngestConfig {
        IngestConfig::default()
            .with_max_retries(0)
            .with_retry_backoff(Duration::ZERO)
    }

    /// The cleaned row embedded in an enrichment prompt.
    fn prompt_row(prompt: &str) -> serde_json::Value {
        let start = prompt.find('{').unwrap_or(0);
        serde_json::from_str(&prompt[start..]).unwrap_or_default()
    }

    /// Echoes the row's country back; rows whose country is "bad" violate the schema.
    fn echo_backend() -> ScriptedBackend {
        ScriptedBackend::new().with_responder(|prompt| {
            let row = prompt_row(prompt);
            let country = row["country"].as_str().unwrap_or_default().to_string();
            if country == "bad" {
                Ok(r#"{"country":"X","employee_size":"huge","city":"Y","domain":"z"}"#.into())
            } else {
                Ok(answer(&country))
            }
        })
    }

    fn csv(countries: &[&str]) -> String {
        let mut text = HEADER.to_string();
        for (i, c) in countries.iter().enumerate() {
            text.push_str(&format!("Co{i},{c},,,\n"));
        }
        text
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_batch() {
        let orch = orchestrator(echo_backend(), fast_config());
        let result = orch.process(&csv(&["A", "B", "bad", "D", "E"])).await;

        assert_eq!(result.row_count, 5);
        assert_eq!(result.enriched_rows.len(), 4);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].index, 2);
        assert_eq!(result.failures[0].kind, EnrichErrorKind::SchemaViolation);
        assert_eq!(result.headers.len(), 5);
    }

    #[tokio::test]
    async fn test_order_preserved_with_varying_latency() {
        let backend = ScriptedBackend::new().with_latency_ms(5).with_responder(|prompt| {
            let row = prompt_row(prompt);
            Ok(answer(row["country"].as_str().unwrap_or_default()))
        });
        let countries: Vec<String> = (0..20).map(|i| format!("C{i}")).collect();
        let refs: Vec<&str> = countries.iter().map(String::as_str).collect();

        let orch = orchestrator(backend, fast_config().with_max_concurrency(4));
        let result = orch.process(&csv(&refs)).await;

        let got: Vec<_> = result.enriched_rows.iter().map(|r| r.country.clone()).collect();
        assert_eq!(got, countries);
        let names: Vec<_> = result
            .enriched_rows
            .iter()
            .map(|r| r.company_name.clone().unwrap())
            .collect();
        assert_eq!(names[0], "Co0");
        assert_eq!(names[19], "Co19");
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let backend = ScriptedBackend::new()
            .with_latency_ms(20)
            .with_default_response(answer("Spain"));
        let orch = orchestrator(backend.clone(), fast_config().with_max_concurrency(3));

        let result = orch.process(&csv(&["a"; 12])).await;

        assert_eq!(result.enriched_rows.len(), 12);
        assert!(backend.max_concurrent_calls() <= 3);
        assert!(backend.max_concurrent_calls() >= 1);
        assert_eq!(backend.call_count(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_row_timeout() {
        let backend = ScriptedBackend::new()
            .with_latency_ms(5_000)
            .with_default_response(answer("France"));
        let config = fast_config().with_row_timeout(Duration::from_secs(1));
        let orch = orchestrator(backend, config);

        let result = orch.process(&csv(&["France", "France"])).await;

        assert!(result.enriched_rows.is_empty());
        assert_eq!(result.failures.len(), 2);
        assert!(result.failures.iter().all(|f| f.kind == EnrichErrorKind::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_failure_is_retried() {
        let backend = ScriptedBackend::new()
            .then_err(Error::RateLimited("429".into()))
            .with_default_response(answer("Italy"));
        let config = fast_config()
            .with_max_retries(1)
            .with_retry_backoff(Duration::from_millis(100));
        let orch = orchestrator(backend.clone(), config);

        let result = orch.process(&csv(&["Italy"])).await;

        assert_eq!(result.enriched_rows.len(), 1);
        assert!(result.failures.is_empty());
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_oversized_value_fails_only_its_row() {
        let backend = ScriptedBackend::new().with_default_response(answer("Spain"));
        let orch = orchestrator(backend.clone(), fast_config().with_max_retries(2));
        let long_name = "N".repeat(300);
        let text = format!("{HEADER}Acme,Spain,,,\n{long_name},Spain,,,\nGlobex,Spain,,,\n");

        let result = orch.process(&text).await;

        assert_eq!(result.enriched_rows.len(), 2);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].index, 1);
        assert_eq!(result.failures[0].kind, EnrichErrorKind::InvalidRecord);
        assert!(result.failures[0].reason.contains("company_name"));
        // Not retried: the value comes from the upload itself.
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let backend = ScriptedBackend::new()
            .then_err(Error::Inference("down".into()))
            .then_err(Error::Inference("still down".into()))
            .with_default_response(answer("Italy"));
        let orch = orchestrator(backend.clone(), fast_config().with_max_retries(1));

        let result = orch.process(&csv(&["Italy"])).await;

        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].kind, EnrichErrorKind::Transport);
        assert!(result.failures[0].reason.contains("still down"));
    }

    #[tokio::test]
    async fn test_parse_warnings_and_blank_lines() {
        let orch = orchestrator(echo_backend(), fast_config());
        let text = format!("{HEADER}\nAcme,France,1-10,Paris,acme.fr\n\nShort,Spain\n\n");

        let result = orch.process(&text).await;

        assert_eq!(result.row_count, 2);
        assert_eq!(result.enriched_rows.len(), 2);
        assert_eq!(result.parse_errors.len(), 1);
        assert_eq!(result.parse_errors[0].row_index, 1);
    }

    #[tokio::test]
    async fn test_empty_upload() {
        let backend = ScriptedBackend::new();
        let orch = orchestrator(backend.clone(), fast_config());

        let result = orch.process(HEADER).await;

        assert_eq!(result.row_count, 0);
        assert!(result.enriched_rows.is_empty());
        assert!(result.failures.is_empty());
        assert!(backend.get_calls().is_empty());
    }

    struct PanicOnSecond;

    #[async_trait]
    impl RowEnricher for PanicOnSecond {
        async fn enrich(&self, row: &CleanedRow) -> std::result::Result<EnrichedRow, EnrichError> {
            if row.country == "boom" {
                panic!("enricher bug");
            }
            Ok(EnrichedRow {
                company_name: None,
                country: row.country.clone(),
                employee_size: EmployeeSize::Micro,
                city: "c".into(),
                domain: "d.io".into(),
            })
        }

        fn name(&self) -> &str {
            "panicky"
        }
    }

    #[tokio::test]
    async fn test_panicking_row_is_internal_failure() {
        let orch = BatchOrchestrator::new(Arc::new(PanicOnSecond), fast_config());

        let result = orch.process(&csv(&["ok", "boom", "fine"])).await;

        assert_eq!(result.enriched_rows.len(), 2);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].index, 1);
        assert_eq!(result.failures[0].kind, EnrichErrorKind::Internal);
    }

    #[tokio::test]
    async fn test_rate_limited_batch_completes() {
        let backend = ScriptedBackend::new().with_default_response(answer("Peru"));
        let orch = orchestrator(backend, fast_config().with_max_requests_per_sec(1000));

        let result = orch.process(&csv(&["Peru", "Peru", "Peru"])).await;
        assert_eq!(result.enriched_rows.len(), 3);
    }

    #[test]
    fn test_process_without_enrichment() {
        let orch = orchestrator(ScriptedBackend::new(), fast_config());
        let table = orch.process_without_enrichment(&csv(&["A", "B"]));
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.headers[0], "company_name");
    }
}
