//! Scripted inference backend for deterministic testing.
//!
//! Responses are served from a queue, then from a prompt-based responder,
//! then from a fixed default. Every call is logged, and the number of
//! concurrently running calls is tracked so callers can assert on
//! concurrency bounds.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use minixy_inference::mock::ScriptedBackend;
//! use minixy_core::{Error, GenerationBackend};
//!
//! let backend = ScriptedBackend::new()
//!     .then_err(Error::RateLimited("429".into()))
//!     .with_default_response("{}");
//!
//! let schema = serde_json::json!({"type": "object"});
//! assert!(backend.generate_structured("", "a", &schema).await.is_err());
//! assert_eq!(backend.generate_structured("", "b", &schema).await.unwrap(), "{}");
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use minixy_core::{Error, GenerationBackend, InferenceBackend, Result};

type Responder = dyn Fn(&str) -> Result<String> + Send + Sync;

/// One logged backend call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub system: String,
    pub prompt: String,
    pub schema: JsonValue,
}

/// Mock generation backend with scripted answers.
#[derive(Clone)]
pub struct ScriptedBackend {
    script: Arc<Mutex<VecDeque<Result<String>>>>,
    responder: Option<Arc<Responder>>,
    default_response: Option<String>,
    latency: Duration,
    healthy: bool,
    model: String,
    call_log: Arc<Mutex<Vec<MockCall>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedBackend {
    /// Create a backend with an empty script and no default response.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            responder: None,
            default_response: None,
            latency: Duration::ZERO,
            healthy: true,
            model: "scripted".to_string(),
            call_log: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue a successful response.
    pub fn then_ok(self, response: impl Into<String>) -> Self {
        lock(&self.script).push_back(Ok(response.into()));
        self
    }

    /// Queue a failure.
    pub fn then_err(self, err: Error) -> Self {
        lock(&self.script).push_back(Err(err));
        self
    }

    /// Answer based on the prompt once the queue is drained.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&str) -> Result<String> + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Response used when neither the queue nor a responder applies.
    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = Some(response.into());
        self
    }

    /// Simulated latency for every call.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency = Duration::from_millis(latency_ms);
        self
    }

    /// Make `health_check` report the backend as down.
    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        lock(&self.call_log).clone()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        lock(&self.call_log).len()
    }

    /// Highest number of calls that were running at the same time.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn respond(&self, system: &str, prompt: &str, schema: &JsonValue) -> Result<String> {
        lock(&self.call_log).push(MockCall {
            system: system.to_string(),
            prompt: prompt.to_string(),
            schema: schema.clone(),
        });

        let _guard = InFlight::enter(&self.in_flight, &self.max_in_flight);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let scripted = lock(&self.script).pop_front();
        let result = match scripted {
            Some(result) => result,
            None => match (&self.responder, &self.default_response) {
                (Some(responder), _) => responder(prompt),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Err(Error::Inference("no scripted response left".to_string())),
            },
        };
        result
    }
}

/// Counts a running call; released on drop so abandoned calls are not leaked.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate_structured(
        &self,
        system: &str,
        prompt: &str,
        schema: &JsonValue,
    ) -> Result<String> {
        self.respond(system, prompt, schema).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    async fn health_check(&self) -> Result<bool> {
        Ok(self.healthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ask(backend: &ScriptedBackend, prompt: &str) -> Result<String> {
        backend
            .generate_structured("system", prompt, &serde_json::json!({}))
            .await
    }

    #[tokio::test]
    async fn test_script_then_default() {
        let backend = ScriptedBackend::new()
            .then_ok("first")
            .then_err(Error::Timeout("t".into()))
            .with_default_response("rest");

        assert_eq!(ask(&backend, "a").await.unwrap(), "first");
        assert!(matches!(ask(&backend, "b").await, Err(Error::Timeout(_))));
        assert_eq!(ask(&backend, "c").await.unwrap(), "rest");
        assert_eq!(backend.get_calls().len(), 3);
    }

    #[tokio::test]
    async fn test_responder_sees_prompt() {
        let backend = ScriptedBackend::new().with_responder(|prompt| {
            if prompt.contains("bad") {
                Err(Error::Inference("boom".into()))
            } else {
                Ok(prompt.to_uppercase())
            }
        });
        assert_eq!(ask(&backend, "ok").await.unwrap(), "OK");
        assert!(ask(&backend, "bad").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_script_without_default_fails() {
        let backend = ScriptedBackend::new();
        assert!(matches!(ask(&backend, "x").await, Err(Error::Inference(_))));
    }

    #[tokio::test]
    async fn test_clones_share_log() {
        let backend = ScriptedBackend::new().with_default_response("x");
        let clone = backend.clone();
        clone
            .generate_structured("s", "p", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(backend.call_count(), 1);
        assert_eq!(backend.get_calls()[0].system, "s");
    }

    #[tokio::test]
    async fn test_health_flag() {
        assert!(ScriptedBackend::new().health_check().await.unwrap());
        assert!(!ScriptedBackend::new().unhealthy().health_check().await.unwrap());
    }
}
