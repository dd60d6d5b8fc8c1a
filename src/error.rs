//! Error types for the edgequake-pdf2docx library.
//!
//! Three layers of failure exist, one per stage of the fallback policy:
//!
//! * [`AttemptError`] (**recoverable**): a single model attempt failed
//!   (transport error, timeout, schema-invalid reply). The orchestrator
//!   records it and moves on to the next model.
//!
//! * [`ExtractionFailed`]: every configured model was tried and failed.
//!   Carries one [`AttemptFailure`] per model so operators can see which
//!   stage failed and why.
//!
//! * [`Pdf2DocxError`] (**fatal**): returned from the top-level `convert*`
//!   functions once every fallback (secondary model, then the non-AI
//!   converter) is exhausted, or for errors no fallback can fix.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Hint appended to [`ExtractionFailed`] messages.
pub const EXTRACTION_HINT: &str = "Verify that the model API credentials are valid and that \
outbound network access to the model endpoint is allowed.";

/// All fatal errors returned by the edgequake-pdf2docx library.
#[derive(Debug, Error)]
pub enum Pdf2DocxError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Source file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a data URI, file path or valid HTTP/HTTPS URL.
    #[error("Invalid source '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// The source bytes are neither a PDF nor a supported image format.
    #[error("Unsupported source document '{source_uri}'\nFirst bytes: {magic:?}")]
    UnsupportedDocument { source_uri: String, magic: Vec<u8> },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// Every configured model failed.
    #[error(transparent)]
    Extraction(#[from] ExtractionFailed),

    /// The DOCX serializer rejected the block tree.
    #[error(transparent)]
    Packaging(#[from] PackagingError),

    /// The non-AI converter was invoked and failed.
    #[error("Fallback converter failed: {detail}")]
    FallbackFailed { detail: String },

    /// The non-AI converter was needed but none is configured.
    #[error("No fallback converter is configured.\nSet --fallback-url or provide a FallbackConverter.")]
    FallbackNotConfigured,

    /// Both the AI path and the fallback path failed.
    ///
    /// The message reports the AI path's cause. The fallback's own error is
    /// kept in `fallback_error` for callers that want to inspect it.
    #[error("Conversion failed: {cause}")]
    ConversionFailed {
        #[source]
        cause: Box<Pdf2DocxError>,
        fallback_error: Option<Box<Pdf2DocxError>>,
    },

    // ── Credential store errors ───────────────────────────────────────────
    /// Could not read or write the credential store file.
    #[error("Credential store I/O error on '{path}': {source}")]
    CredentialStoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The credential store file is not valid JSON.
    #[error("Credential store '{path}' is corrupt: {source}")]
    CredentialStoreCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No credential with the given id exists.
    #[error("Credential '{id}' not found")]
    CredentialNotFound { id: String },

    /// A credential with the given id already exists.
    #[error("Credential '{id}' already exists")]
    DuplicateCredential { id: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output DOCX file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The output reference is not a base64 data URI.
    #[error("Cannot decode document URI: {reason}")]
    InvalidOutputUri { reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a single model attempt failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptError {
    /// The reply did not match the extraction schema.
    #[error("response failed schema validation: {detail}")]
    SchemaValidation { detail: String },

    /// The model call itself failed (network, HTTP status, provider error).
    #[error("model call failed: {detail}")]
    Transport { detail: String },

    /// The model call did not complete within the attempt timeout.
    #[error("model call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The model could not be constructed (unknown provider, missing key).
    #[error("model is not configured: {detail}")]
    NotConfigured { detail: String },

    /// The credential store holds no eligible credential for the provider.
    #[error("no eligible credential for provider '{provider}'")]
    MissingCredential { provider: String },

    /// The model replied with no text at all.
    #[error("model returned an empty response")]
    EmptyResponse,
}

/// One failed attempt: which model, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub model: String,
    pub error: AttemptError,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.model, self.error)
    }
}

/// Every configured model was tried and none produced a valid result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render_attempts(&self.attempts))]
pub struct ExtractionFailed {
    pub attempts: Vec<AttemptFailure>,
}

impl ExtractionFailed {
    /// The error of the last attempt, if any attempt was made.
    pub fn last_error(&self) -> Option<&AttemptError> {
        self.attempts.last().map(|a| &a.error)
    }
}

/// Numbered attempt list followed by [`EXTRACTION_HINT`].
fn render_attempts(attempts: &[AttemptFailure]) -> String {
    if attempts.is_empty() {
        return format!("Extraction failed: no models are configured.\n{EXTRACTION_HINT}");
    }
    let mut out = format!(
        "Extraction failed after {} model attempt(s):\n",
        attempts.len()
    );
    for (i, attempt) in attempts.iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", i + 1, attempt));
    }
    out.push_str(EXTRACTION_HINT);
    out
}

/// The DOCX library rejected the document while packing it.
///
/// Does not occur for blocks produced by the assembler; treat as a bug.
#[derive(Debug, Error)]
#[error("Failed to pack DOCX: {0}")]
pub struct PackagingError(pub String);
