//! Extraction orchestration: try each model in priority order until one
//! returns a schema-valid extraction.
//!
//! ## Fallback Policy
//!
//! ```text
//! primary ──fail──▶ secondary ──fail──▶ … ──fail──▶ ExtractionFailed
//!    │                  │
//!    ok                 ok
//!    ▼                  ▼
//! ExtractionResult   ExtractionResult
//! ```
//!
//! * Attempts are strictly sequential; a model never races another.
//! * There are no retries inside an attempt. The only retry is substitution
//!   by the next model.
//! * A reply that fails schema validation is a failed attempt, exactly like a
//!   transport error or a timeout.
//! * The error message of a failed attempt is handed unmodified to the next
//!   model through [`ExtractionRequest::previous_error`].

use crate::error::{AttemptError, AttemptFailure, ExtractionFailed};
use crate::pipeline::input::SourceDocument;
use crate::pipeline::sanitize::clean_response;
use crate::progress::ProgressCallback;
use crate::schema::{parse_extraction, ExtractionResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What a model attempt receives.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    pub source: &'a SourceDocument,
    /// The message of the previous failed attempt, if any.
    pub previous_error: Option<&'a str>,
}

/// One model capable of answering an extraction request.
///
/// Implementations return the model's raw text. They do not validate it; the
/// orchestrator sanitises and parses every reply the same way.
#[async_trait]
pub trait ExtractionModel: Send + Sync {
    /// Label used in logs and errors, e.g. `gemini/gemini-2.5-flash`.
    fn name(&self) -> &str;

    async fn extract(&self, request: ExtractionRequest<'_>) -> Result<String, AttemptError>;
}

/// A model that could not be constructed.
///
/// Keeps its slot in the chain so the failure shows up as an attempt and the
/// next model still gets its turn.
pub struct UnavailableModel {
    name: String,
    reason: String,
}

impl UnavailableModel {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ExtractionModel for UnavailableModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(&self, _request: ExtractionRequest<'_>) -> Result<String, AttemptError> {
        Err(AttemptError::NotConfigured {
            detail: self.reason.clone(),
        })
    }
}

/// Drives the model chain for one source document.
pub struct ExtractionOrchestrator {
    models: Vec<Arc<dyn ExtractionModel>>,
    attempt_timeout: Duration,
    progress: Option<ProgressCallback>,
}

impl ExtractionOrchestrator {
    pub fn new(models: Vec<Arc<dyn ExtractionModel>>, attempt_timeout: Duration) -> Self {
        Self {
            models,
            attempt_timeout,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Number of configured models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Run the chain. Fails only after every model was tried.
    pub async fn extract(
        &self,
        source: &SourceDocument,
    ) -> Result<ExtractionResult, ExtractionFailed> {
        let total = self.models.len();
        let mut failures: Vec<AttemptFailure> = Vec::with_capacity(total);
        let mut previous_error: Option<String> = None;

        for (idx, model) in self.models.iter().enumerate() {
            let attempt = idx + 1;
            let name = model.name();
            if let Some(ref cb) = self.progress {
                cb.on_attempt_start(name, attempt, total);
            }
            info!("Extraction attempt {}/{} with {}", attempt, total, name);

            let start = Instant::now();
            let request = ExtractionRequest {
                source,
                previous_error: previous_error.as_deref(),
            };
            match self.run_attempt(model.as_ref(), request).await {
                Ok(result) => {
                    info!(
                        "{}: {} structural nodes, {} content items in {:?}",
                        name,
                        result.structure.len(),
                        result.content.len(),
                        start.elapsed()
                    );
                    if let Some(ref cb) = self.progress {
                        cb.on_extraction_complete(name, result.structure.len(), result.content.len());
                    }
                    return Ok(result);
                }
                Err(error) => {
                    let message = error.to_string();
                    warn!("{}: attempt {} failed: {}", name, attempt, message);
                    if let Some(ref cb) = self.progress {
                        cb.on_attempt_failed(name, attempt, message.clone());
                    }
                    previous_error = Some(message);
                    failures.push(AttemptFailure {
                        model: name.to_string(),
                        error,
                    });
                }
            }
        }

        Err(ExtractionFailed { attempts: failures })
    }

    /// One attempt: call under the timeout, sanitise, validate.
    async fn run_attempt(
        &self,
        model: &dyn ExtractionModel,
        request: ExtractionRequest<'_>,
    ) -> Result<ExtractionResult, AttemptError> {
        let raw = tokio::time::timeout(self.attempt_timeout, model.extract(request))
            .await
            .map_err(|_| AttemptError::Timeout {
                secs: self.attempt_timeout.as_secs(),
            })??;

        if raw.trim().is_empty() {
            return Err(AttemptError::EmptyResponse);
        }
        let cleaned = clean_response(&raw);
        debug!("{}: {} bytes of JSON after sanitising", model.name(), cleaned.len());
        parse_extraction(&cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Scripted {
        name: &'static str,
        reply: Result<&'static str, AttemptError>,
        seen_previous: Mutex<Vec<Option<String>>>,
    }

    impl Scripted {
        fn new(name: &'static str, reply: Result<&'static str, AttemptError>) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply,
                seen_previous: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ExtractionModel for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn extract(&self, request: ExtractionRequest<'_>) -> Result<String, AttemptError> {
            self.seen_previous
                .lock()
                .push(request.previous_error.map(str::to_string));
            self.reply.clone().map(str::to_string)
        }
    }

    struct Sleepy;

    #[async_trait]
    impl ExtractionModel for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        async fn extract(&self, _request: ExtractionRequest<'_>) -> Result<String, AttemptError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(String::new())
        }
    }

    fn source() -> SourceDocument {
        SourceDocument {
            bytes: b"%PDF-1.4".to_vec(),
            mime_type: "application/pdf".into(),
            name: "t.pdf".into(),
        }
    }

    const VALID: &str = r#"{"content": [{"text": "hi"}], "structure": [{"type": "page_break"}]}"#;

    fn transport(detail: &str) -> AttemptError {
        AttemptError::Transport {
            detail: detail.into(),
        }
    }

    #[tokio::test]
    async fn primary_success_skips_secondary() {
        let primary = Scripted::new("primary", Ok(VALID));
        let secondary = Scripted::new("secondary", Ok(VALID));
        let models: Vec<Arc<dyn ExtractionModel>> = vec![primary.clone(), secondary.clone()];
        let orch = ExtractionOrchestrator::new(models, Duration::from_secs(5));
        let result = orch.extract(&source()).await.unwrap();
        assert_eq!(result.content.len(), 1);
        assert_eq!(primary.seen_previous.lock().len(), 1);
        assert!(secondary.seen_previous.lock().is_empty());
    }

    #[tokio::test]
    async fn secondary_receives_primary_error_verbatim() {
        let primary = Scripted::new("primary", Err(transport("HTTP 503 overloaded")));
        let secondary = Scripted::new("secondary", Ok(VALID));
        let models: Vec<Arc<dyn ExtractionModel>> = vec![primary.clone(), secondary.clone()];
        let orch = ExtractionOrchestrator::new(models, Duration::from_secs(5));
        let result = orch.extract(&source()).await.unwrap();
        assert_eq!(result.structure.len(), 1);
        assert_eq!(
            *secondary.seen_previous.lock(),
            vec![Some("model call failed: HTTP 503 overloaded".to_string())]
        );
        assert_eq!(*primary.seen_previous.lock(), vec![None]);
    }

    #[tokio::test]
    async fn schema_invalid_reply_falls_through() {
        let primary = Scripted::new("primary", Ok(r#"{"content": "oops"}"#));
        let secondary = Scripted::new("secondary", Ok(VALID));
        let models: Vec<Arc<dyn ExtractionModel>> = vec![primary, secondary];
        let orch = ExtractionOrchestrator::new(models, Duration::from_secs(5));
        assert!(orch.extract(&source()).await.is_ok());
    }

    #[tokio::test]
    async fn all_failures_are_collected() {
        let primary = Scripted::new("primary", Err(transport("connection refused")));
        let secondary = Scripted::new("secondary", Ok("not json at all"));
        let models: Vec<Arc<dyn ExtractionModel>> = vec![primary, secondary];
        let orch = ExtractionOrchestrator::new(models, Duration::from_secs(5));
        let err = orch.extract(&source()).await.unwrap_err();
        assert_eq!(err.attempts.len(), 2);
        assert_eq!(err.attempts[0].model, "primary");
        assert!(matches!(
            err.attempts[1].error,
            AttemptError::SchemaValidation { .. }
        ));
        let msg = err.to_string();
        assert!(msg.contains("connection refused"), "got: {msg}");
        assert!(msg.contains("schema validation"), "got: {msg}");
    }

    #[tokio::test]
    async fn empty_reply_is_a_failure() {
        let only = Scripted::new("only", Ok("   "));
        let models: Vec<Arc<dyn ExtractionModel>> = vec![only];
        let orch = ExtractionOrchestrator::new(models, Duration::from_secs(5));
        let err = orch.extract(&source()).await.unwrap_err();
        assert_eq!(err.last_error(), Some(&AttemptError::EmptyResponse));
    }

    #[tokio::test]
    async fn timeout_counts_as_failed_attempt() {
        let secondary = Scripted::new("secondary", Ok(VALID));
        let models: Vec<Arc<dyn ExtractionModel>> = vec![Arc::new(Sleepy), secondary];
        let orch = ExtractionOrchestrator::new(models, Duration::from_millis(20));
        let result = orch.extract(&source()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn unavailable_model_keeps_its_slot() {
        let models: Vec<Arc<dyn ExtractionModel>> = vec![
            Arc::new(UnavailableModel::new("openai/x", "OPENAI_API_KEY not set")),
            Scripted::new("secondary", Ok(VALID)),
        ];
        let orch = ExtractionOrchestrator::new(models, Duration::from_secs(5));
        assert_eq!(orch.len(), 2);
        assert!(orch.extract(&source()).await.is_ok());
    }

    #[tokio::test]
    async fn no_models_fails_immediately() {
        let orch = ExtractionOrchestrator::new(vec![], Duration::from_secs(5));
        assert!(orch.is_empty());
        let err = orch.extract(&source()).await.unwrap_err();
        assert!(err.attempts.is_empty());
    }
}
