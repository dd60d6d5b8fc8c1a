//! Output types returned by the conversion pipeline.

use crate::error::Pdf2DocxError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// Media type of a WordprocessingML document.
pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// The produced document.
///
/// `document_uri` is self-contained: the AI path always emits a base64 data
/// URI tagged with [`DOCX_MIME_TYPE`]. A fallback converter may return any
/// reference it likes; its output is passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionOutput {
    pub document_uri: String,
}

impl ConversionOutput {
    /// Wrap packaged DOCX bytes as a data URI.
    pub fn from_docx_bytes(bytes: &[u8]) -> Self {
        Self {
            document_uri: to_data_uri(DOCX_MIME_TYPE, bytes),
        }
    }

    /// Decode the embedded document bytes.
    ///
    /// Fails when `document_uri` is not a base64 `data:` URI.
    pub fn document_bytes(&self) -> Result<Vec<u8>, Pdf2DocxError> {
        let (_mime, bytes) = decode_data_uri(&self.document_uri)
            .map_err(|reason| Pdf2DocxError::InvalidOutputUri { reason })?;
        Ok(bytes)
    }
}

/// Build `data:<mime>;base64,<payload>`.
pub fn to_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

/// Split a base64 data URI into its media type and decoded payload.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), String> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| "not a data: URI".to_string())?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| "data URI has no ',' separator".to_string())?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| "only base64 data URIs are supported".to_string())?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("invalid base64 payload: {e}"))?;
    Ok((mime.to_string(), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_round_trip() {
        let out = ConversionOutput::from_docx_bytes(b"PK\x03\x04rest");
        assert!(out.document_uri.starts_with(
            "data:application/vnd.openxmlformats-officedocument.wordprocessingml.document;base64,"
        ));
        assert_eq!(out.document_bytes().unwrap(), b"PK\x03\x04rest");
    }

    #[test]
    fn rejects_plain_urls() {
        let out = ConversionOutput {
            document_uri: "https://example.com/out.docx".into(),
        };
        let err = out.document_bytes().unwrap_err();
        assert!(err.to_string().contains("not a data: URI"), "got: {err}");
    }

    #[test]
    fn rejects_non_base64_data_uri() {
        assert!(decode_data_uri("data:text/plain,hello").is_err());
    }

    #[test]
    fn serialises_document_uri_key() {
        let json = serde_json::to_value(ConversionOutput {
            document_uri: "data:x;base64,".into(),
        })
        .unwrap();
        assert_eq!(json["documentUri"], "data:x;base64,");
    }
}
