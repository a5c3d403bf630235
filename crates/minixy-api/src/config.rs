//! Process configuration, read once at startup.
//!
//! Environment variables:
//!   HOST / PORT                 - bind address (default: 0.0.0.0:3000)
//!   DATABASE_URL                - store connection string ("memory://" for the in-memory store)
//!   DB_MAX_CONNECTIONS          - pool size (default: 10)
//!   INFERENCE_BACKEND           - "ollama", "openai" or "rules" (default: "ollama")
//!   INFERENCE_BASE_URL          - endpoint override
//!   INFERENCE_API_KEY           - bearer token (OpenAI-compatible only)
//!   INFERENCE_MODEL             - generation model override
//!   INFERENCE_TIMEOUT_SECS      - HTTP timeout per inference call (default: 60)
//!   INGEST_MAX_CONCURRENCY      - concurrent enrichment calls per upload (default: 8)
//!   INGEST_ROW_TIMEOUT_SECS     - per-row budget including retries (default: 90)
//!   INGEST_MAX_RETRIES          - retries of retryable failures (default: 1)
//!   INGEST_RETRY_BACKOFF_MS     - linear backoff step (default: 250)
//!   INGEST_MAX_REQUESTS_PER_SEC - inference rate limit, 0 = off (default: 0)
//!   INGEST_ENRICH               - enrich uploaded rows (default: true)
//!   INGEST_PERSIST              - store enriched rows (default: true)
//!   MAX_UPLOAD_BYTES            - upload size limit (default: 10 MiB)
//!   LOG_FORMAT / LOG_FILE / LOG_ANSI - logging output

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use minixy_core::{defaults, Error, Result};
use minixy_db::PoolConfig;
use minixy_inference::{OllamaConfig, OpenAIConfig};
use minixy_ingest::IngestConfig;

/// Complete process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub inference: InferenceSettings,
    pub ingest: IngestConfig,
    pub upload: UploadConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// True when the in-memory store is selected.
    pub fn is_memory(&self) -> bool {
        self.url.starts_with(defaults::MEMORY_DATABASE_URL)
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::default().max_connections(self.max_connections)
    }
}

/// Which enricher handles uploaded rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Ollama,
    OpenAI,
    Rules,
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "rules" => Ok(Self::Rules),
            other => Err(Error::Config(format!(
                "INFERENCE_BACKEND must be one of ollama, openai, rules; got {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceSettings {
    pub backend: BackendKind,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: u64,
}

impl InferenceSettings {
    pub fn ollama_config(&self) -> OllamaConfig {
        let defaults = OllamaConfig::default();
        OllamaConfig {
            base_url: self.base_url.clone().unwrap_or(defaults.base_url),
            gen_model: self.model.clone().unwrap_or(defaults.gen_model),
            timeout_seconds: self.timeout_secs,
        }
    }

    pub fn openai_config(&self) -> OpenAIConfig {
        OpenAIConfig {
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| defaults::OPENAI_URL.to_string()),
            api_key: self.api_key.clone(),
            gen_model: self
                .model
                .clone()
                .unwrap_or_else(|| defaults::OPENAI_GEN_MODEL.to_string()),
            timeout_seconds: self.timeout_secs,
        }
    }
}

/// Upload endpoint behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Run rows through enrichment; otherwise parse only.
    pub enrich: bool,
    /// Append enriched rows to the store.
    pub persist: bool,
    pub max_upload_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            enrich: true,
            persist: true,
            max_upload_bytes: defaults::MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub file: Option<PathBuf>,
    /// ANSI override; auto-detected when unset.
    pub ansi: Option<bool>,
}

/// Typed variable lookup over an arbitrary source.
struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-empty, trimmed value.
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> Result<T> {
        match self.get(key) {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::Config(format!("Invalid value for {}: {:?}", key, raw))),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key).map(|v| v.to_lowercase()) {
            None => Ok(default),
            Some(v) if matches!(v.as_str(), "true" | "1" | "yes" | "on") => Ok(true),
            Some(v) if matches!(v.as_str(), "false" | "0" | "no" | "off") => Ok(false),
            Some(v) => Err(Error::Config(format!("Invalid boolean for {}: {:?}", key, v))),
        }
    }
}

impl AppConfig {
    /// Build from process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let port: u16 = vars.parse("PORT", defaults::SERVER_PORT)?;
        if port == 0 {
            return Err(Error::Config("PORT must be non-zero".to_string()));
        }
        let server = ServerConfig {
            host: vars
                .get("HOST")
                .unwrap_or_else(|| defaults::SERVER_HOST.to_string()),
            port,
        };

        let database = DatabaseConfig {
            url: vars
                .get("DATABASE_URL")
                .unwrap_or_else(|| defaults::DATABASE_URL.to_string()),
            max_connections: vars.parse("DB_MAX_CONNECTIONS", defaults::DB_MAX_CONNECTIONS)?,
        };

        let base_url = vars.get("INFERENCE_BASE_URL");
        if let Some(url) = &base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "INFERENCE_BASE_URL must be an http(s) URL, got {:?}",
                    url
                )));
            }
        }
        let inference = InferenceSettings {
            backend: vars.parse("INFERENCE_BACKEND", BackendKind::Ollama)?,
            base_url,
            api_key: vars.get("INFERENCE_API_KEY"),
            model: vars.get("INFERENCE_MODEL"),
            timeout_secs: vars.parse("INFERENCE_TIMEOUT_SECS", defaults::INFERENCE_TIMEOUT_SECS)?,
        };

        let ingest = IngestConfig::default()
            .with_max_concurrency(
                vars.parse("INGEST_MAX_CONCURRENCY", defaults::INGEST_MAX_CONCURRENCY)?,
            )
            .with_row_timeout(Duration::from_secs(
                vars.parse("INGEST_ROW_TIMEOUT_SECS", defaults::INGEST_ROW_TIMEOUT_SECS)?,
            ))
            .with_max_retries(vars.parse("INGEST_MAX_RETRIES", defaults::INGEST_MAX_RETRIES)?)
            .with_retry_backoff(Duration::from_millis(
                vars.parse("INGEST_RETRY_BACKOFF_MS", defaults::INGEST_RETRY_BACKOFF_MS)?,
            ))
            .with_max_requests_per_sec(vars.parse(
                "INGEST_MAX_REQUESTS_PER_SEC",
                defaults::INGEST_MAX_REQUESTS_PER_SEC,
            )?);

        let upload = UploadConfig {
            enrich: vars.flag("INGEST_ENRICH", true)?,
            persist: vars.flag("INGEST_PERSIST", true)?,
            max_upload_bytes: vars.parse("MAX_UPLOAD_BYTES", defaults::MAX_UPLOAD_BYTES)?,
        };

        let log = LogConfig {
            format: match vars.get("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            file: vars.get("LOG_FILE").map(PathBuf::from),
            ansi: vars.get("LOG_ANSI").map(|v| v == "true" || v == "1"),
        };

        Ok(Self {
            server,
            database,
            inference,
            ingest,
            upload,
            log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.server.bind_addr(), "0.0.0.0:3000");
        assert_eq!(c.database.url, defaults::DATABASE_URL);
        assert!(!c.database.is_memory());
        assert_eq!(c.inference.backend, BackendKind::Ollama);
        assert_eq!(c.ingest, IngestConfig::default());
        assert_eq!(c.upload, UploadConfig::default());
        assert_eq!(c.log.format, LogFormat::Text);
        assert_eq!(c.log.ansi, None);
    }

    #[test]
    fn test_overrides() {
        let c = config(&[
            ("PORT", "8080"),
            ("DATABASE_URL", "memory://"),
            ("INFERENCE_BACKEND", "OpenAI"),
            ("INFERENCE_BASE_URL", "http://localhost:9000/v1"),
            ("INFERENCE_API_KEY", "sk-test"),
            ("INFERENCE_MODEL", "gpt-test"),
            ("INGEST_MAX_CONCURRENCY", "2"),
            ("INGEST_ENRICH", "false"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(c.server.port, 8080);
        assert!(c.database.is_memory());
        assert_eq!(c.inference.backend, BackendKind::OpenAI);
        assert_eq!(c.ingest.max_concurrency, 2);
        assert!(!c.upload.enrich);
        assert_eq!(c.log.format, LogFormat::Json);

        let openai = c.inference.openai_config();
        assert_eq!(openai.base_url, "http://localhost:9000/v1");
        assert_eq!(openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(openai.gen_model, "gpt-test");
    }

    #[test]
    fn test_ollama_defaults_fill_gaps() {
        let c = config(&[("INFERENCE_TIMEOUT_SECS", "5")]).unwrap();
        let ollama = c.inference.ollama_config();
        assert_eq!(ollama.base_url, defaults::OLLAMA_URL);
        assert_eq!(ollama.gen_model, defaults::OLLAMA_GEN_MODEL);
        assert_eq!(ollama.timeout_seconds, 5);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        assert!(matches!(config(&[("INFERENCE_BACKEND", "gpt")]), Err(Error::Config(_))));
        assert!(matches!(config(&[("PORT", "0")]), Err(Error::Config(_))));
        assert!(matches!(config(&[("PORT", "http")]), Err(Error::Config(_))));
        assert!(matches!(
            config(&[("INFERENCE_BASE_URL", "localhost:11434")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(config(&[("INGEST_PERSIST", "maybe")]), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        let c = config(&[("INGEST_MAX_CONCURRENCY", "0")]).unwrap();
        assert_eq!(c.ingest.max_concurrency, 1);
    }
}
