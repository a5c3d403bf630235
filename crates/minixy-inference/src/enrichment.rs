//! Model-backed row enrichment.
//!
//! A cleaned row is sent to a generation backend together with a JSON
//! Schema describing the only acceptable answer. Whatever comes back goes
//! through [`ResponseValidator`] before it becomes an [`EnrichedRow`]; there
//! is no other path from model output to accepted data.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, instrument};

use minixy_core::{
    CleanedRow, EmployeeSize, EnrichError, EnrichedRow, Error, InferenceBackend, Result,
    RowEnricher,
};

/// Fields every enrichment answer must carry, in prompt order.
pub const OUTPUT_FIELDS: [&str; 4] = ["country", "employee_size", "city", "domain"];

/// System prompt for company row enrichment.
pub const SYSTEM_PROMPT: &str = r#"You clean and complete company records imported from spreadsheets.

You receive one record as JSON with the fields company_name, country, employee_size, city and domain. Values may be empty, misspelled, padded, or placed in the wrong field.

Rules:
1. Return ONLY a JSON object with exactly the keys country, employee_size, city, domain. No markdown, no commentary.
2. Never leave a field empty. If a value is missing, infer the most plausible one from the other fields and the company name.
3. Detect shifted columns: if a city name appears in the country field, a domain appears in the city field, or similar, move each value to the field it belongs to.
4. country is the full English country name (for example "United States", "Germany").
5. city is the city where the company is headquartered.
6. domain is the bare registrable domain in lowercase (for example "acme.io"), with no scheme, path, "www." prefix or spaces.
7. employee_size must be exactly one of: "1-10", "11-50", "51-200", "201-500", "501-1000", "1001-5000", "5001-10000", "10000+". Convert exact headcounts to the matching range. If no size is given, estimate it from what you know about the company and typical 2025 company-size distributions."#;

/// JSON Schema for an enrichment answer.
///
/// String fields use a non-whitespace `pattern` instead of `minLength`, which
/// strict OpenAI structured output does not accept. The pattern also rules
/// out the empty string.
pub fn output_schema() -> JsonValue {
    let non_blank = json!({ "type": "string", "pattern": "\\S" });
    json!({
        "type": "object",
        "properties": {
            "country": non_blank,
            "employee_size": {
                "type": "string",
                "enum": EmployeeSize::values(),
            },
            "city": non_blank,
            "domain": non_blank,
        },
        "required": OUTPUT_FIELDS,
        "additionalProperties": false,
    })
}

/// Build the user prompt for one row.
pub fn build_prompt(row: &CleanedRow) -> String {
    let record = json!({
        "company_name": row.company_name,
        "country": row.country,
        "employee_size": row.employee_size,
        "city": row.city,
        "domain": row.domain,
    });
    format!(
        "Complete this company record:\n{}",
        serde_json::to_string_pretty(&record).unwrap_or_else(|_| record.to_string())
    )
}

/// Remove a surrounding Markdown code fence and any prose around the object.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string (```json) up to the first newline.
        text = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
        text = text.trim_end();
        text = text.strip_suffix("```").unwrap_or(text).trim();
    }
    if !text.starts_with('{') {
        if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
            if start < end {
                return &text[start..=end];
            }
        }
    }
    text
}

/// Typed view of a schema-conforming answer.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnrichmentOutput {
    country: String,
    employee_size: EmployeeSize,
    city: String,
    domain: String,
}

/// The single gate between model output and accepted data.
pub struct ResponseValidator {
    schema: JsonValue,
    validator: jsonschema::Validator,
}

impl ResponseValidator {
    /// Compile the enrichment output schema.
    pub fn new() -> Result<Self> {
        let schema = output_schema();
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| Error::Internal(format!("Invalid output schema: {}", e)))?;
        Ok(Self { schema, validator })
    }

    /// The schema enforced by this validator.
    pub fn schema(&self) -> &JsonValue {
        &self.schema
    }

    /// Validate a raw model answer.
    ///
    /// The returned row has no `company_name`; the caller copies it from the
    /// input row.
    pub fn validate(&self, raw: &str) -> std::result::Result<EnrichedRow, EnrichError> {
        let body = strip_code_fences(raw);
        if body.is_empty() {
            return Err(EnrichError::SchemaViolation("empty response".to_string()));
        }

        let value: JsonValue = serde_json::from_str(body)
            .map_err(|e| EnrichError::SchemaViolation(format!("response is not JSON: {}", e)))?;

        let errors: Vec<String> = self
            .validator
            .iter_errors(&value)
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect();
        if !errors.is_empty() {
            return Err(EnrichError::SchemaViolation(errors.join("; ")));
        }

        let output: EnrichmentOutput = serde_json::from_value(value)
            .map_err(|e| EnrichError::SchemaViolation(e.to_string()))?;

        Ok(EnrichedRow {
            company_name: None,
            country: output.country.trim().to_string(),
            employee_size: output.employee_size,
            city: output.city.trim().to_string(),
            domain: output.domain.split_whitespace().collect(),
        })
    }
}

/// Validate a raw answer with a freshly compiled validator.
///
/// Prefer holding a [`ResponseValidator`] when validating repeatedly.
pub fn validate_response(raw: &str) -> std::result::Result<EnrichedRow, EnrichError> {
    ResponseValidator::new()
        .map_err(EnrichError::from)?
        .validate(raw)
}

/// [`RowEnricher`] backed by a generative model.
///
/// Makes exactly one backend call per `enrich`; retries are the caller's
/// decision.
pub struct LlmEnricher<B: InferenceBackend + ?Sized> {
    backend: Arc<B>,
    validator: ResponseValidator,
}

impl<B: InferenceBackend> LlmEnricher<B> {
    /// Create an enricher that owns its backend.
    pub fn new(backend: B) -> Result<Self> {
        Self::from_arc(Arc::new(backend))
    }
}

impl<B: InferenceBackend + ?Sized> LlmEnricher<B> {
    /// Create an enricher over a shared backend.
    pub fn from_arc(backend: Arc<B>) -> Result<Self> {
        Ok(Self {
            backend,
            validator: ResponseValidator::new()?,
        })
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[async_trait]
impl<B: InferenceBackend + ?Sized> RowEnricher for LlmEnricher<B> {
    #[instrument(skip(self, row), fields(subsystem = "inference", component = "enrichment", op = "enrich", model = %self.backend.model_name()))]
    async fn enrich(&self, row: &CleanedRow) -> std::result::Result<EnrichedRow, EnrichError> {
        let start = Instant::now();
        let prompt = build_prompt(row);

        let raw = self
            .backend
            .generate_structured(SYSTEM_PROMPT, &prompt, self.validator.schema())
            .await?;

        let mut enriched = self.validator.validate(&raw)?;
        if !row.company_name.is_empty() {
            enriched.company_name = Some(row.company_name.clone());
        }

        debug!(
            response_len = raw.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            employee_size = %enriched.employee_size,
            "Row enriched"
        );
        Ok(enriched)
    }

    fn name(&self) -> &str {
        "llm"
    }

    async fn health_check(&self) -> Result<bool> {
        self.backend.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedBackend;

    fn validator() -> ResponseValidator {
        ResponseValidator::new().unwrap()
    }

    const GOOD: &str =
        r#"{"country":"France","employee_size":"51-200","city":"Paris","domain":"acme.fr"}"#;

    // ==========================================================================
    // Schema
    // ==========================================================================

    #[test]
    fn test_schema_requires_all_fields_and_no_extras() {
        let schema = output_schema();
        assert_eq!(schema["required"], json!(OUTPUT_FIELDS));
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(
            schema["properties"]["employee_size"]["enum"]
                .as_array()
                .unwrap()
                .len(),
            8
        );
    }

    #[test]
    fn test_system_prompt_lists_every_bucket() {
        for bucket in EmployeeSize::values() {
            assert!(SYSTEM_PROMPT.contains(&format!("\"{}\"", bucket)), "{bucket}");
        }
        assert!(SYSTEM_PROMPT.contains("2025"));
    }

    #[test]
    fn test_prompt_contains_row_values() {
        let row = CleanedRow {
            company_name: "Acme".into(),
            country: "Paris".into(),
            ..Default::default()
        };
        let prompt = build_prompt(&row);
        assert!(prompt.contains("\"company_name\": \"Acme\""));
        assert!(prompt.contains("\"country\": \"Paris\""));
        assert!(prompt.contains("\"domain\": \"\""));
    }

    // ==========================================================================
    // Validation gate
    // ==========================================================================

    #[test]
    fn test_accepts_conforming_answer() {
        let row = validator().validate(GOOD).unwrap();
        assert_eq!(row.country, "France");
        assert_eq!(row.employee_size, EmployeeSize::Medium);
        assert_eq!(row.city, "Paris");
        assert_eq!(row.domain, "acme.fr");
        assert!(row.company_name.is_none());
    }

    #[test]
    fn test_accepts_fenced_answer() {
        let raw = format!("```json\n{}\n```", GOOD);
        assert!(validator().validate(&raw).is_ok());
    }

    #[test]
    fn test_accepts_answer_with_surrounding_prose() {
        let raw = format!("Here is the record: {} Hope this helps.", GOOD);
        assert!(validator().validate(&raw).is_ok());
    }

    #[test]
    fn test_trims_values_and_strips_domain_whitespace() {
        let raw = r#"{"country":" France ","employee_size":"1-10","city":"Paris ","domain":"ac me.fr"}"#;
        let row = validator().validate(raw).unwrap();
        assert_eq!(row.country, "France");
        assert_eq!(row.city, "Paris");
        assert_eq!(row.domain, "acme.fr");
    }

    #[test]
    fn test_rejects_bucket_outside_enumeration() {
        let raw = r#"{"country":"France","employee_size":"50-200","city":"Paris","domain":"acme.fr"}"#;
        let err = validator().validate(raw).unwrap_err();
        assert!(matches!(err, EnrichError::SchemaViolation(ref m) if m.contains("employee_size")));
    }

    #[test]
    fn test_rejects_missing_field() {
        let raw = r#"{"country":"France","employee_size":"1-10","city":"Paris"}"#;
        let err = validator().validate(raw).unwrap_err();
        assert!(matches!(err, EnrichError::SchemaViolation(ref m) if m.contains("domain")));
    }

    #[test]
    fn test_rejects_blank_value() {
        let raw = r#"{"country":"   ","employee_size":"1-10","city":"Paris","domain":"a.fr"}"#;
        assert!(matches!(
            validator().validate(raw),
            Err(EnrichError::SchemaViolation(_))
        ));
        let raw = r#"{"country":"","employee_size":"1-10","city":"Paris","domain":"a.fr"}"#;
        assert!(matches!(
            validator().validate(raw),
            Err(EnrichError::SchemaViolation(_))
        ));
    }

    #[test]
    fn test_rejects_extra_field() {
        let raw = r#"{"country":"France","employee_size":"1-10","city":"Paris","domain":"a.fr","revenue":"1M"}"#;
        assert!(matches!(
            validator().validate(raw),
            Err(EnrichError::SchemaViolation(_))
        ));
    }

    #[test]
    fn test_rejects_wrong_shape() {
        for raw in ["", "not json", "[]", "null", r#"{"country": 3}"#] {
            assert!(
                matches!(validator().validate(raw), Err(EnrichError::SchemaViolation(_))),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn test_validate_response_convenience() {
        assert!(validate_response(GOOD).is_ok());
    }

    // ==========================================================================
    // Enricher
    // ==========================================================================

    #[tokio::test]
    async fn test_enricher_copies_company_name() {
        let backend = ScriptedBackend::new().with_default_response(GOOD);
        let enricher = LlmEnricher::new(backend).unwrap();
        let row = CleanedRow {
            company_name: "Acme".into(),
            ..Default::default()
        };
        let enriched = enricher.enrich(&row).await.unwrap();
        assert_eq!(enriched.company_name.as_deref(), Some("Acme"));
        assert_eq!(enricher.backend().call_count(), 1);
    }

    #[tokio::test]
    async fn test_enricher_empty_company_name_is_none() {
        let enricher =
            LlmEnricher::new(ScriptedBackend::new().with_default_response(GOOD)).unwrap();
        let enriched = enricher.enrich(&CleanedRow::default()).await.unwrap();
        assert!(enriched.company_name.is_none());
    }

    #[tokio::test]
    async fn test_enricher_sends_schema() {
        let backend = ScriptedBackend::new().with_default_response(GOOD);
        let enricher = LlmEnricher::new(backend).unwrap();
        enricher.enrich(&CleanedRow::default()).await.unwrap();
        let calls = enricher.backend().get_calls();
        assert_eq!(calls[0].schema, output_schema());
        assert_eq!(calls[0].system, SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn test_enricher_maps_backend_errors() {
        let backend = ScriptedBackend::new()
            .then_err(Error::RateLimited("429".into()))
            .then_err(Error::Timeout("slow".into()))
            .then_ok("{\"country\":\"France\"}");
        let enricher = LlmEnricher::new(backend).unwrap();
        let row = CleanedRow::default();

        assert!(matches!(
            enricher.enrich(&row).await,
            Err(EnrichError::RateLimited(_))
        ));
        assert!(matches!(
            enricher.enrich(&row).await,
            Err(EnrichError::Timeout(_))
        ));
        assert!(matches!(
            enricher.enrich(&row).await,
            Err(EnrichError::SchemaViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_enricher_over_trait_object() {
        let backend: Arc<dyn InferenceBackend> =
            Arc::new(ScriptedBackend::new().with_default_response(GOOD));
        let enricher = LlmEnricher::from_arc(backend).unwrap();
        assert!(enricher.enrich(&CleanedRow::default()).await.is_ok());
        assert!(enricher.health_check().await.unwrap());
    }
}
