//! Ollama inference backend implementation.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, trace, warn};

use minixy_core::{defaults, Error, GenerationBackend, InferenceBackend, Result};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = defaults::OLLAMA_URL;

/// Default generation model.
pub const DEFAULT_GEN_MODEL: &str = defaults::OLLAMA_GEN_MODEL;

/// Timeout for generation requests (seconds).
pub const GEN_TIMEOUT_SECS: u64 = defaults::INFERENCE_TIMEOUT_SECS;

/// Configuration for the Ollama backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server.
    pub base_url: String,
    /// Model to use for generation.
    pub gen_model: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            gen_model: DEFAULT_GEN_MODEL.to_string(),
            timeout_seconds: GEN_TIMEOUT_SECS,
        }
    }
}

/// Ollama inference backend.
pub struct OllamaBackend {
    client: Client,
    config: OllamaConfig,
}

impl OllamaBackend {
    /// Create a new Ollama backend with default settings.
    pub fn new() -> Self {
        Self::with_config(OllamaConfig::default())
    }

    /// Create a new Ollama backend with custom configuration.
    pub fn with_config(config: OllamaConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();

        info!(
            subsystem = "inference",
            component = "ollama",
            url = %config.base_url,
            model = %config.gen_model,
            timeout_secs = config.timeout_seconds,
            "Initializing Ollama backend"
        );

        Self { client, config }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    /// Schema-constrained generation through `/api/chat`.
    ///
    /// Thinking is disabled so reasoning models keep their output to the
    /// schema-constrained content.
    async fn chat(&self, system: &str, prompt: &str, format: JsonValue) -> Result<String> {
        let start = Instant::now();

        debug!("Starting generation via chat API");

        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request = ChatRequest {
            model: self.config.gen_model.clone(),
            messages,
            stream: false,
            format,
            think: false,
        };

        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(&request)
            .send()
            .await
            .map_err(Error::from)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RateLimited(format!("Ollama returned {}: {}", status, body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let content = result.message.content;
        let elapsed = start.elapsed().as_millis() as u64;
        trace!(content = %content, "Raw model response");
        debug!(
            response_len = content.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if elapsed > defaults::SLOW_GENERATION_MS {
            warn!(
                duration_ms = elapsed,
                prompt_len = prompt.len(),
                slow = true,
                "Slow generation operation"
            );
        }
        Ok(content)
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Chat API message for `/api/chat`.
#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Request payload for the Ollama `/api/chat` endpoint.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    /// Structured output: a JSON Schema the response must follow.
    format: JsonValue,
    /// Thinking toggle for models that support it.
    think: bool,
}

/// Response from the Ollama `/api/chat` endpoint.
#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    #[instrument(skip(self, system, prompt, schema), fields(subsystem = "inference", component = "ollama", op = "generate_structured", model = %self.config.gen_model, prompt_len = prompt.len()))]
    async fn generate_structured(
        &self,
        system: &str,
        prompt: &str,
        schema: &JsonValue,
    ) -> Result<String> {
        self.chat(system, prompt, schema.clone()).await
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .timeout(Duration::from_secs(defaults::HEALTH_CHECK_TIMEOUT_SECS))
            .send()
            .await;

        match response {
            Ok(resp) => {
                if resp.status().is_success() {
                    info!("Ollama health check passed");
                    Ok(true)
                } else {
                    warn!("Ollama health check failed: {}", resp.status());
                    Ok(false)
                }
            }
            Err(e) => {
                warn!("Ollama health check error: {}", e);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constants() {
        assert_eq!(DEFAULT_OLLAMA_URL, "http://127.0.0.1:11434");
        assert_eq!(DEFAULT_GEN_MODEL, "llama3.1:8b");
        assert_eq!(GEN_TIMEOUT_SECS, 60);
    }

    #[test]
    fn test_default_config() {
        let backend = OllamaBackend::new();
        assert_eq!(backend.config().base_url, DEFAULT_OLLAMA_URL);
        assert_eq!(backend.model_name(), DEFAULT_GEN_MODEL);
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        let backend = OllamaBackend::with_config(OllamaConfig {
            base_url: "http://custom:1234/".to_string(),
            ..Default::default()
        });
        assert_eq!(backend.url("/api/chat"), "http://custom:1234/api/chat");
    }

    #[test]
    fn test_chat_request_carries_schema_and_disables_thinking() {
        let schema = serde_json::json!({"type": "object"});
        let request = ChatRequest {
            model: "m".to_string(),
            messages: vec![],
            stream: false,
            format: schema.clone(),
            think: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["format"], schema);
        assert_eq!(json["think"], false);
    }

    #[test]
    fn test_chat_response_deserialization() {
        let json = r#"{"model":"m","message":{"role":"assistant","content":"{}"},"done":true}"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.message.content, "{}");
    }
}
