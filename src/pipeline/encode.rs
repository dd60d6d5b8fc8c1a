//! Attachment encoding: `SourceDocument` → base64 payload for multimodal calls.
//!
//! Provider APIs (OpenAI, Anthropic, Gemini) accept attachments as base64
//! embedded in the JSON request body. PDFs are sent as-is; models that accept
//! PDF input read every page from the single attachment.

use crate::pipeline::input::SourceDocument;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use tracing::debug;

/// Base64-encode the document bytes.
pub fn encode_base64(doc: &SourceDocument) -> String {
    let b64 = STANDARD.encode(&doc.bytes);
    debug!("Encoded {} → {} bytes base64", doc.name, b64.len());
    b64
}

/// Wrap the document as an `edgequake_llm` attachment.
///
/// `detail: "high"` keeps fine print readable for GPT-4-class models.
pub fn encode_attachment(doc: &SourceDocument) -> ImageData {
    ImageData::new(encode_base64(doc), doc.mime_type.as_str()).with_detail("high")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> SourceDocument {
        SourceDocument {
            bytes: b"%PDF-1.4 tiny".to_vec(),
            mime_type: "application/pdf".into(),
            name: "tiny.pdf".into(),
        }
    }

    #[test]
    fn encodes_attachment() {
        let data = encode_attachment(&doc());
        assert_eq!(data.mime_type, "application/pdf");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(decoded, b"%PDF-1.4 tiny");
    }
}
