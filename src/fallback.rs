//! Non-AI converter used when no model can be used.
//!
//! The pipeline calls it in two cases: in `no_ocr` mode, and when the AI path
//! has failed. It is opaque. Whatever it returns is handed back to the caller
//! verbatim.

use crate::error::Pdf2DocxError;
use crate::output::{to_data_uri, ConversionOutput};
use crate::pipeline::input::{is_data_uri, is_url, resolve_source};
use crate::request::ConversionInput;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

/// A converter that produces a DOCX without AI extraction.
#[async_trait]
pub trait FallbackConverter: Send + Sync {
    async fn convert_without_ai(
        &self,
        input: &ConversionInput,
    ) -> Result<ConversionOutput, Pdf2DocxError>;
}

/// Posts the request to an HTTP conversion service.
///
/// The body is the `ConversionInput` JSON. The service must answer 2xx with a
/// `ConversionOutput` JSON body. Local file sources are inlined as a data URI
/// first, because the service cannot read the caller's filesystem.
pub struct HttpFallbackConverter {
    endpoint: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpFallbackConverter {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
            timeout_secs,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn outbound_request(
        &self,
        input: &ConversionInput,
    ) -> Result<ConversionInput, Pdf2DocxError> {
        if is_url(&input.source_uri) || is_data_uri(&input.source_uri) {
            return Ok(input.clone());
        }
        let doc = resolve_source(&input.source_uri, self.timeout_secs).await?;
        debug!("Inlining {} ({} bytes) for the fallback service", doc.name, doc.bytes.len());
        Ok(ConversionInput::new(
            to_data_uri(&doc.mime_type, &doc.bytes),
            input.mode,
        ))
    }
}

#[async_trait]
impl FallbackConverter for HttpFallbackConverter {
    async fn convert_without_ai(
        &self,
        input: &ConversionInput,
    ) -> Result<ConversionOutput, Pdf2DocxError> {
        let body = self.outbound_request(input).await?;
        info!("Posting {} to fallback converter {}", input.source_uri, self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| Pdf2DocxError::FallbackFailed {
                detail: if e.is_timeout() {
                    format!("timed out after {}s", self.timeout_secs)
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.text().await {
                Ok(text) => text.trim().to_string(),
                Err(e) => format!("error body unreadable: {e}"),
            };
            return Err(Pdf2DocxError::FallbackFailed {
                detail: format!("HTTP {status}: {message}"),
            });
        }

        let output: ConversionOutput =
            response
                .json()
                .await
                .map_err(|e| Pdf2DocxError::FallbackFailed {
                    detail: format!("response is not a ConversionOutput: {e}"),
                })?;
        if output.document_uri.trim().is_empty() {
            return Err(Pdf2DocxError::FallbackFailed {
                detail: "response has an empty documentUri".into(),
            });
        }
        Ok(output)
    }
}
