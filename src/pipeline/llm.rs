//! Generic provider backend: one extraction attempt through `edgequake_llm`.
//!
//! Works with every provider `edgequake_llm::ProviderFactory` knows (OpenAI,
//! Anthropic, Gemini, Ollama, …). API keys come from the provider's usual
//! environment variable. All prompt text lives in [`crate::prompts`].

use crate::config::{ConversionConfig, ModelSpec};
use crate::error::AttemptError;
use crate::pipeline::encode::encode_attachment;
use crate::pipeline::orchestrator::{ExtractionModel, ExtractionRequest};
use crate::prompts::{previous_failure_note, DEFAULT_SYSTEM_PROMPT, EXTRACTION_INSTRUCTION};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// An [`ExtractionModel`] backed by an `edgequake_llm` provider.
pub struct LlmExtractionModel {
    label: String,
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
}

impl LlmExtractionModel {
    /// Wrap an already-constructed provider.
    pub fn new(
        label: impl Into<String>,
        provider: Arc<dyn LLMProvider>,
        config: &ConversionConfig,
    ) -> Self {
        Self {
            label: label.into(),
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            options: build_options(config),
        }
    }

    /// Construct the provider named by `spec` via `ProviderFactory`.
    ///
    /// Fails when the provider is unknown or its API key is missing.
    pub fn from_spec(spec: &ModelSpec, config: &ConversionConfig) -> Result<Self, String> {
        let provider = ProviderFactory::create_llm_provider(&spec.provider, &spec.model)
            .map_err(|e| format!("{e}"))?;
        Ok(Self::new(spec.label(), provider, config))
    }
}

#[async_trait]
impl ExtractionModel for LlmExtractionModel {
    fn name(&self) -> &str {
        &self.label
    }

    async fn extract(&self, request: ExtractionRequest<'_>) -> Result<String, AttemptError> {
        let start = Instant::now();
        let messages = build_messages(&self.system_prompt, request);

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| AttemptError::Transport {
                detail: format!("{e}"),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            self.label,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

/// ## Message Layout
///
/// 1. **System message**: the schema prompt (or user-supplied override)
/// 2. **User message**: the instruction, the failure note after a failed
///    attempt, and the document attachment
fn build_messages(system_prompt: &str, request: ExtractionRequest<'_>) -> Vec<ChatMessage> {
    let mut text = EXTRACTION_INSTRUCTION.to_string();
    if let Some(previous) = request.previous_error {
        text.push_str("\n\n");
        text.push_str(&previous_failure_note(previous));
    }
    vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user_with_images(text, vec![encode_attachment(request.source)]),
    ]
}

/// Build `CompletionOptions` from the conversion config.
fn build_options(config: &ConversionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
