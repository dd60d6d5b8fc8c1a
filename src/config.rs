//! Configuration types for scanned-document-to-DOCX conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. One struct holds the model chain, the
//! credential source, the fallback converter and every timeout, so a config can
//! be shared across concurrent conversions and logged as a unit.

use crate::credentials::KeyRotationProvider;
use crate::error::Pdf2DocxError;
use crate::fallback::FallbackConverter;
use crate::pipeline::orchestrator::ExtractionModel;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Default Gemini REST endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// One entry of the model fallback chain: `provider/model`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Provider name understood by `edgequake_llm::ProviderFactory`, or `gemini`.
    pub provider: String,
    pub model: String,
}

impl ModelSpec {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// `provider/model`, used in logs and error messages.
    pub fn label(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

impl FromStr for ModelSpec {
    type Err = Pdf2DocxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (provider, model) = s.trim().split_once('/').ok_or_else(|| {
            Pdf2DocxError::InvalidConfig(format!(
                "model '{s}' must be written as provider/model, e.g. gemini/gemini-2.5-flash"
            ))
        })?;
        let (provider, model) = (provider.trim(), model.trim());
        if provider.is_empty() || model.is_empty() {
            return Err(Pdf2DocxError::InvalidConfig(format!(
                "model '{s}' has an empty provider or model name"
            )));
        }
        Ok(Self::new(provider.to_ascii_lowercase(), model))
    }
}

/// The default chain: a primary model and a cheaper secondary.
pub fn default_models() -> Vec<ModelSpec> {
    vec![
        ModelSpec::new("gemini", "gemini-2.5-flash"),
        ModelSpec::new("gemini", "gemini-2.0-flash"),
    ]
}

/// Configuration for a conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2docx::{ConversionConfig, ModelSpec};
///
/// let config = ConversionConfig::builder()
///     .models(vec![
///         ModelSpec::new("gemini", "gemini-2.5-flash"),
///         ModelSpec::new("openai", "gpt-4.1-mini"),
///     ])
///     .api_timeout_secs(90)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Models to try, in priority order. Default: gemini-2.5-flash, then gemini-2.0-flash.
    pub models: Vec<ModelSpec>,

    /// Pre-constructed models. When non-empty, replaces `models` entirely.
    pub extractors: Vec<Arc<dyn ExtractionModel>>,

    /// Credential source consulted before each Gemini call.
    ///
    /// When `None`, Gemini models go through `edgequake_llm` and read
    /// `GEMINI_API_KEY` from the environment like every other provider.
    pub credentials: Option<Arc<dyn KeyRotationProvider>>,

    /// Pre-constructed non-AI converter. Takes precedence over `fallback_endpoint`.
    pub fallback: Option<Arc<dyn FallbackConverter>>,

    /// URL of an HTTP conversion service used as the non-AI converter.
    pub fallback_endpoint: Option<String>,

    /// Sampling temperature for the model. Default: 0.1.
    ///
    /// Extraction is transcription; low temperature keeps the model faithful.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 8192.
    ///
    /// The JSON reply is larger than plain Markdown of the same document.
    pub max_tokens: usize,

    /// Custom system prompt. If None, uses built-in default.
    pub system_prompt: Option<String>,

    /// Per-model-attempt timeout in seconds. Default: 120.
    ///
    /// A timed-out attempt counts as a failed attempt and the next model runs.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Timeout for the HTTP fallback converter in seconds. Default: 300.
    pub fallback_timeout_secs: u64,

    /// Base URL of the Gemini REST API. Default: [`DEFAULT_GEMINI_BASE_URL`].
    pub gemini_base_url: String,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            models: default_models(),
            extractors: Vec::new(),
            credentials: None,
            fallback: None,
            fallback_endpoint: None,
            temperature: 0.1,
            max_tokens: 8192,
            system_prompt: None,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            fallback_timeout_secs: 300,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("models", &self.models)
            .field(
                "extractors",
                &self.extractors.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .field(
                "credentials",
                &self.credentials.as_ref().map(|_| "<dyn KeyRotationProvider>"),
            )
            .field("fallback", &self.fallback.as_ref().map(|_| "<dyn FallbackConverter>"))
            .field("fallback_endpoint", &self.fallback_endpoint)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("fallback_timeout_secs", &self.fallback_timeout_secs)
            .field("gemini_base_url", &self.gemini_base_url)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Per-attempt timeout as a `Duration`.
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn models(mut self, models: Vec<ModelSpec>) -> Self {
        self.config.models = models;
        self
    }

    /// Append one model to the end of the chain.
    pub fn model(mut self, model: ModelSpec) -> Self {
        self.config.models.push(model);
        self
    }

    pub fn extractor(mut self, model: Arc<dyn ExtractionModel>) -> Self {
        self.config.extractors.push(model);
        self
    }

    pub fn credentials(mut self, provider: Arc<dyn KeyRotationProvider>) -> Self {
        self.config.credentials = Some(provider);
        self
    }

    pub fn fallback(mut self, converter: Arc<dyn FallbackConverter>) -> Self {
        self.config.fallback = Some(converter);
        self
    }

    pub fn fallback_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.fallback_endpoint = Some(url.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn fallback_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fallback_timeout_secs = secs;
        self
    }

    pub fn gemini_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.gemini_base_url = url.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2DocxError> {
        let c = &self.config;
        if c.models.is_empty() && c.extractors.is_empty() {
            return Err(Pdf2DocxError::InvalidConfig(
                "at least one model must be configured".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(Pdf2DocxError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.download_timeout_secs == 0 || c.fallback_timeout_secs == 0 {
            return Err(Pdf2DocxError::InvalidConfig(
                "download and fallback timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(Pdf2DocxError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if let Some(ref url) = c.fallback_endpoint {
            if !crate::pipeline::input::is_url(url) {
                return Err(Pdf2DocxError::InvalidConfig(format!(
                    "fallback endpoint '{url}' is not an HTTP/HTTPS URL"
                )));
            }
        }
        Ok(self.config)
    }
}
