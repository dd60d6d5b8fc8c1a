//! # edgequake-pdf2docx
//!
//! Convert scanned PDFs and page images into editable DOCX documents using
//! structured extraction from multimodal Language Models.
//!
//! ## Why this crate?
//!
//! OCR-to-text tools lose the layout: headings, tables and lists come out as
//! one flat stream of lines. Instead this crate asks a model to describe the
//! document as a typed JSON tree (headings, paragraphs, lists, tables, image
//! placeholders, breaks, plus styled text runs), validates that tree, and
//! then builds the `.docx` locally and deterministically. The model never
//! writes document XML.
//!
//! ## Pipeline Overview
//!
//! ```text
//! sourceUri
//!  │
//!  ├─ 1. Input     data URI, URL or local path → bytes + media type
//!  ├─ 2. Extract   primary model → secondary model → … (schema-validated)
//!  ├─ 3. Assemble  structural blocks, then styled content runs
//!  ├─ 4. Package   docx-rs → .docx bytes
//!  └─ 5. Output    data:application/vnd…wordprocessingml.document;base64,…
//!
//!  any failure in 1–2 ─▶ non-AI fallback converter
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2docx::{convert, ConversionConfig, ConversionInput};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Gemini keys are read from GEMINI_API_KEY unless a credential store is set.
//!     let config = ConversionConfig::builder()
//!         .fallback_endpoint("https://convert.example.com/pdf2docx")
//!         .build()?;
//!     let output = convert(&ConversionInput::ocr("scan.pdf"), &config).await?;
//!     std::fs::write("scan.docx", output.document_bytes()?)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2docx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-pdf2docx = { version = "0.1", default-features = false }
//! ```
//!
//! ## Credential rotation
//!
//! A [`CredentialStore`] holds several keys per provider and hands out one per
//! time bucket (hourly or per minute). Keys can be disabled or flagged as
//! leaked without restarting anything; see [`credentials`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod credentials;
pub mod error;
pub mod fallback;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod request;
pub mod schema;

#[cfg(test)]
mod testing;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{default_models, ConversionConfig, ConversionConfigBuilder, ModelSpec};
pub use convert::{convert, convert_from_bytes, convert_sync, convert_to_file};
pub use credentials::{Credential, CredentialStore, KeyRotationProvider, RotationStrategy};
pub use error::{AttemptError, AttemptFailure, ExtractionFailed, PackagingError, Pdf2DocxError};
pub use fallback::{FallbackConverter, HttpFallbackConverter};
pub use output::{ConversionOutput, DOCX_MIME_TYPE};
pub use pipeline::assemble::{assemble, Block};
pub use pipeline::orchestrator::{ExtractionModel, ExtractionOrchestrator, ExtractionRequest};
pub use pipeline::package::pack;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use request::{ConversionInput, ConversionMode};
pub use schema::{ContentItem, ExtractionResult, NodeKind, StructuralNode};
