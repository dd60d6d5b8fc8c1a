//! The conversion request as it arrives from a caller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether to run AI extraction or go straight to the non-AI converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionMode {
    /// Extract structure with a model, then assemble the DOCX locally. (default)
    #[default]
    Ocr,
    /// Skip every model and use the fallback converter directly.
    NoOcr,
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionMode::Ocr => f.write_str("ocr"),
            ConversionMode::NoOcr => f.write_str("no_ocr"),
        }
    }
}

/// A single conversion request.
///
/// `source_uri` is a `data:` URI, an `http(s)://` URL or a local path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionInput {
    pub source_uri: String,
    #[serde(rename = "conversionMode", alias = "mode", default)]
    pub mode: ConversionMode,
}

impl ConversionInput {
    pub fn new(source_uri: impl Into<String>, mode: ConversionMode) -> Self {
        Self {
            source_uri: source_uri.into(),
            mode,
        }
    }

    /// An AI-extraction request for `source_uri`.
    pub fn ocr(source_uri: impl Into<String>) -> Self {
        Self::new(source_uri, ConversionMode::Ocr)
    }

    /// A request that bypasses AI extraction.
    pub fn no_ocr(source_uri: impl Into<String>) -> Self {
        Self::new(source_uri, ConversionMode::NoOcr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_shape() {
        let input: ConversionInput =
            serde_json::from_str(r#"{"sourceUri": "a.pdf", "conversionMode": "no_ocr"}"#).unwrap();
        assert_eq!(input, ConversionInput::no_ocr("a.pdf"));
    }

    #[test]
    fn accepts_mode_alias_and_defaults_to_ocr() {
        let input: ConversionInput =
            serde_json::from_str(r#"{"sourceUri": "a.pdf", "mode": "ocr"}"#).unwrap();
        assert_eq!(input.mode, ConversionMode::Ocr);

        let input: ConversionInput = serde_json::from_str(r#"{"sourceUri": "a.pdf"}"#).unwrap();
        assert_eq!(input.mode, ConversionMode::Ocr);
    }

    #[test]
    fn rejects_unknown_mode() {
        let parsed =
            serde_json::from_str::<ConversionInput>(r#"{"sourceUri": "a", "conversionMode": "fast"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn serialises_conversion_mode_key() {
        let json = serde_json::to_value(ConversionInput::ocr("x")).unwrap();
        assert_eq!(json["conversionMode"], "ocr");
        assert_eq!(json["sourceUri"], "x");
    }
}
