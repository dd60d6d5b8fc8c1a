//! Pipeline stages for scanned-document-to-DOCX conversion.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the model backends can be swapped without touching
//! assembly or packaging.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ orchestrator ──▶ sanitize ──▶ assemble ──▶ package
//! (URI)     (base64)   (llm / gemini)   (+ schema)    (blocks)     (docx-rs)
//! ```
//!
//! 1. [`input`]: resolve a data URI, URL or path into bytes + media type
//! 2. [`encode`]: base64-wrap the document for the multimodal request
//! 3. [`orchestrator`]: try each model in order; the only stage with network I/O
//! 4. [`sanitize`]: strip fences and prose around the JSON reply
//! 5. [`assemble`]: map the typed extraction onto rendering blocks
//! 6. [`package`]: serialise the blocks as a `.docx` archive
//!
//! [`llm`] and [`gemini`] are the two shipped [`orchestrator::ExtractionModel`]
//! backends.

pub mod assemble;
pub mod encode;
pub mod gemini;
pub mod input;
pub mod llm;
pub mod orchestrator;
pub mod package;
pub mod sanitize;
