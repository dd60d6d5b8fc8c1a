//! Conversion entry points and the top-level fallback policy.
//!
//! ## State machine
//!
//! ```text
//!              ┌── no_ocr ──▶ FallbackConverter ─────────────────────▶ Done
//! ModeSelect ──┤
//!              └── ocr ─────▶ resolve ─▶ orchestrator ─▶ assemble ─▶ pack ─▶ Done
//!                               │             │
//!                               └──── fail ───┴──▶ FallbackConverter ─▶ Done
//!                                                        │
//!                                                       fail ─▶ ConversionFailed
//! ```
//!
//! Every call is independent: nothing is cached between requests, so one
//! [`ConversionConfig`] can drive any number of concurrent conversions.

use crate::config::ConversionConfig;
use crate::error::Pdf2DocxError;
use crate::fallback::{FallbackConverter, HttpFallbackConverter};
use crate::output::{to_data_uri, ConversionOutput};
use crate::pipeline::assemble::assemble;
use crate::pipeline::gemini::{GeminiExtractionModel, GEMINI_PROVIDER};
use crate::pipeline::input::{resolve_source, sniff_mime_type};
use crate::pipeline::llm::LlmExtractionModel;
use crate::pipeline::orchestrator::{ExtractionModel, ExtractionOrchestrator, UnavailableModel};
use crate::pipeline::package::pack;
use crate::request::{ConversionInput, ConversionMode};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert one document.
///
/// # Errors
/// * In `no_ocr` mode, whatever the fallback converter reports (or
///   [`Pdf2DocxError::FallbackNotConfigured`]).
/// * In `ocr` mode, [`Pdf2DocxError::ConversionFailed`] when both the AI path
///   and the fallback failed, or [`Pdf2DocxError::Packaging`] when the DOCX
///   serializer rejected the assembled document.
pub async fn convert(
    input: &ConversionInput,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2DocxError> {
    let start = Instant::now();
    info!("Starting {} conversion: {}", input.mode, display_uri(&input.source_uri));
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(input.mode);
    }

    let output = match input.mode {
        ConversionMode::NoOcr => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_fallback(None);
            }
            resolve_fallback(config)?.convert_without_ai(input).await?
        }
        ConversionMode::Ocr => match convert_with_ai(input, config).await {
            Ok(output) => output,
            // A serializer bug is not something another converter can fix.
            Err(e @ Pdf2DocxError::Packaging(_)) => return Err(e),
            Err(cause) => recover_with_fallback(input, config, cause).await?,
        },
    };

    info!(
        "Conversion complete: {} chars of document URI in {:?}",
        output.document_uri.len(),
        start.elapsed()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(output.document_uri.len());
    }
    Ok(output)
}

/// Convert and write the decoded document to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
/// Returns the number of bytes written.
pub async fn convert_to_file(
    input: &ConversionInput,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<usize, Pdf2DocxError> {
    let output = convert(input, config).await?;
    let bytes = output.document_bytes()?;
    let path = output_path.as_ref();

    let write_err = |source| Pdf2DocxError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("docx.tmp");
    tokio::fs::write(&tmp_path, &bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(bytes.len())
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: &ConversionInput,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2DocxError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2DocxError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input, config))
}

/// Convert an in-memory PDF or page image.
///
/// The bytes are embedded as a data URI, so no temporary file is created.
pub async fn convert_from_bytes(
    bytes: &[u8],
    mode: ConversionMode,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2DocxError> {
    let mime = sniff_mime_type(bytes).ok_or_else(|| Pdf2DocxError::UnsupportedDocument {
        source_uri: "<bytes>".to_string(),
        magic: bytes.iter().take(4).copied().collect(),
    })?;
    let input = ConversionInput::new(to_data_uri(mime, bytes), mode);
    convert(&input, config).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// The AI path: resolve, extract, assemble, pack.
async fn convert_with_ai(
    input: &ConversionInput,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2DocxError> {
    let source = resolve_source(&input.source_uri, config.download_timeout_secs).await?;

    let orchestrator = ExtractionOrchestrator::new(resolve_models(config), config.api_timeout())
        .with_progress(config.progress_callback.clone());
    let result = orchestrator.extract(&source).await?;
    if result.is_empty() {
        warn!("{}: model found no content; producing an empty document", source.name);
    }

    let blocks = assemble(result);
    let bytes = pack(&blocks)?;
    Ok(ConversionOutput::from_docx_bytes(&bytes))
}

/// Hand the request to the non-AI converter after the AI path failed.
///
/// The returned error reports `cause`; the fallback's own error rides along in
/// `fallback_error`.
async fn recover_with_fallback(
    input: &ConversionInput,
    config: &ConversionConfig,
    cause: Pdf2DocxError,
) -> Result<ConversionOutput, Pdf2DocxError> {
    warn!("AI path failed, switching to fallback converter: {}", cause);
    if let Some(ref cb) = config.progress_callback {
        cb.on_fallback(Some(cause.to_string()));
    }

    let attempt = match resolve_fallback(config) {
        Ok(fallback) => fallback.convert_without_ai(input).await,
        Err(e) => Err(e),
    };
    attempt.map_err(|fallback_error| {
        warn!("Fallback converter failed: {}", fallback_error);
        Pdf2DocxError::ConversionFailed {
            cause: Box::new(cause),
            fallback_error: Some(Box::new(fallback_error)),
        }
    })
}

/// Build the model chain, in priority order.
///
/// 1. **Pre-built models** (`config.extractors`): used as-is.
/// 2. **Gemini with a credential store**: the REST backend, which asks the
///    store for a key on every call.
/// 3. **Anything else**: `edgequake_llm::ProviderFactory`, reading the
///    provider's API key from the environment.
///
/// A model that cannot be built keeps its place as an [`UnavailableModel`].
pub fn resolve_models(config: &ConversionConfig) -> Vec<Arc<dyn ExtractionModel>> {
    if !config.extractors.is_empty() {
        return config.extractors.clone();
    }

    config
        .models
        .iter()
        .map(|spec| -> Arc<dyn ExtractionModel> {
            match config.credentials {
                Some(ref creds) if spec.provider == GEMINI_PROVIDER => Arc::new(
                    GeminiExtractionModel::new(spec.model.clone(), Arc::clone(creds), config),
                ),
                _ => match LlmExtractionModel::from_spec(spec, config) {
                    Ok(model) => Arc::new(model),
                    Err(reason) => {
                        warn!("Model {} is unavailable: {}", spec, reason);
                        Arc::new(UnavailableModel::new(spec.label(), reason))
                    }
                },
            }
        })
        .collect()
}

/// Pick the non-AI converter: pre-built, then endpoint.
pub fn resolve_fallback(
    config: &ConversionConfig,
) -> Result<Arc<dyn FallbackConverter>, Pdf2DocxError> {
    if let Some(ref fallback) = config.fallback {
        return Ok(Arc::clone(fallback));
    }
    if let Some(ref endpoint) = config.fallback_endpoint {
        return Ok(Arc::new(HttpFallbackConverter::new(
            endpoint.clone(),
            config.fallback_timeout_secs,
        )));
    }
    Err(Pdf2DocxError::FallbackNotConfigured)
}

/// Data URIs are shortened for logs.
fn display_uri(uri: &str) -> String {
    const MAX: usize = 80;
    if uri.len() <= MAX {
        return uri.to_string();
    }
    let cut = (0..=MAX).rev().find(|&i| uri.is_char_boundary(i)).unwrap_or(0);
    format!("{}… ({} bytes)", &uri[..cut], uri.len())
}
