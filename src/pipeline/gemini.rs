//! Gemini REST backend with per-request credential rotation.
//!
//! Unlike [`crate::pipeline::llm`], which reads one API key from the
//! environment, this backend asks a [`KeyRotationProvider`] for the key right
//! before every call, so a pool of keys is spread across requests and a key
//! flagged as leaked stops being used immediately.
//!
//! The request asks for `application/json` output, which makes Gemini emit the
//! bare object without fences.

use crate::config::ConversionConfig;
use crate::credentials::KeyRotationProvider;
use crate::error::AttemptError;
use crate::pipeline::encode::encode_base64;
use crate::pipeline::orchestrator::{ExtractionModel, ExtractionRequest};
use crate::prompts::{previous_failure_note, DEFAULT_SYSTEM_PROMPT, EXTRACTION_INSTRUCTION};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Provider name used for credential lookup.
pub const GEMINI_PROVIDER: &str = "gemini";

/// An [`ExtractionModel`] calling `models/{model}:generateContent`.
pub struct GeminiExtractionModel {
    label: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
    credentials: Arc<dyn KeyRotationProvider>,
    system_prompt: String,
    temperature: f32,
    max_tokens: usize,
}

impl GeminiExtractionModel {
    pub fn new(
        model: impl Into<String>,
        credentials: Arc<dyn KeyRotationProvider>,
        config: &ConversionConfig,
    ) -> Self {
        let model = model.into();
        Self {
            label: format!("{GEMINI_PROVIDER}/{model}"),
            model,
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            credentials,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_body(&self, request: ExtractionRequest<'_>) -> serde_json::Value {
        let mut parts = vec![json!({ "text": EXTRACTION_INSTRUCTION })];
        if let Some(previous) = request.previous_error {
            parts.push(json!({ "text": previous_failure_note(previous) }));
        }
        parts.push(json!({
            "inline_data": {
                "mime_type": request.source.mime_type,
                "data": encode_base64(request.source),
            }
        }));

        json!({
            "systemInstruction": { "parts": [{ "text": self.system_prompt }] },
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens,
                "responseMimeType": "application/json",
            }
        })
    }
}

#[async_trait]
impl ExtractionModel for GeminiExtractionModel {
    fn name(&self) -> &str {
        &self.label
    }

    async fn extract(&self, request: ExtractionRequest<'_>) -> Result<String, AttemptError> {
        let key = self
            .credentials
            .current_credential(GEMINI_PROVIDER)
            .ok_or_else(|| AttemptError::MissingCredential {
                provider: GEMINI_PROVIDER.to_string(),
            })?;

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", key)
            .json(&self.build_body(request))
            .send()
            .await
            .map_err(|e| AttemptError::Transport {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.text().await {
                Ok(body) => error_message(&body),
                Err(e) => format!("error body unreadable: {e}"),
            };
            return Err(AttemptError::Transport {
                detail: format!("HTTP {status}: {message}"),
            });
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(|e| AttemptError::Transport {
                detail: format!("unreadable Gemini response: {e}"),
            })?;
        Ok(self.reply_text(&parsed))
    }
}

impl GeminiExtractionModel {
    fn reply_text(&self, parsed: &GenerateContentResponse) -> String {
        if let Some(ref usage) = parsed.usage_metadata {
            debug!(
                "{}: {} input tokens, {} output tokens",
                self.label, usage.prompt_token_count, usage.candidates_token_count
            );
        }
        parsed.text()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

/// Pull `error.message` out of a Gemini error body, or return the body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Credential, CredentialStore, StoreState};
    use crate::pipeline::input::SourceDocument;

    fn source() -> SourceDocument {
        SourceDocument {
            bytes: b"%PDF-1.4".to_vec(),
            mime_type: "application/pdf".into(),
            name: "t.pdf".into(),
        }
    }

    fn model_with(store: CredentialStore) -> GeminiExtractionModel {
        GeminiExtractionModel::new(
            "gemini-2.5-flash",
            Arc::new(store),
            &ConversionConfig::default(),
        )
    }

    #[test]
    fn endpoint_and_label() {
        let m = model_with(CredentialStore::in_memory(StoreState::default()));
        assert_eq!(m.name(), "gemini/gemini-2.5-flash");
        assert_eq!(
            m.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn body_carries_document_and_previous_error() {
        let m = model_with(CredentialStore::in_memory(StoreState::default()));
        let src = source();
        let body = m.build_body(ExtractionRequest {
            source: &src,
            previous_error: Some("HTTP 503"),
        });
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert!(parts[1]["text"].as_str().unwrap().contains("HTTP 503"));
        assert_eq!(parts[2]["inline_data"]["mime_type"], "application/pdf");
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[tokio::test]
    async fn missing_credential_fails_before_network() {
        let store = CredentialStore::in_memory(StoreState {
            credentials: vec![Credential::new("o", "openai", "sk-x")],
            ..Default::default()
        });
        let m = model_with(store);
        let src = source();
        let err = m
            .extract(ExtractionRequest {
                source: &src,
                previous_error: None,
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AttemptError::MissingCredential {
                provider: "gemini".into()
            }
        );
    }

    #[test]
    fn response_text_joins_parts() {
        let parsed: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"content\""}, {"text": ": []}"}]}}],
                "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5}}"#,
        )
        .unwrap();
        assert_eq!(parsed.text(), r#"{"content": []}"#);
        assert_eq!(parsed.usage_metadata.unwrap().prompt_token_count, 10);

        let empty: GenerateContentResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert_eq!(empty.text(), "");
    }

    #[test]
    fn reply_text_survives_usage_logging() {
        let m = model_with(CredentialStore::in_memory(StoreState::default()));
        let parsed: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "{}"}]}}],
                "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 1}}"#,
        )
        .unwrap();
        assert_eq!(m.reply_text(&parsed), "{}");
        assert!(parsed.usage_metadata.is_some());
    }

    #[tokio::test]
    async fn truncated_error_body_is_reported() {
        let addr = crate::testing::serve_once(
            b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 100\r\n\r\n{\"err",
        )
        .await;
        let store = CredentialStore::in_memory(StoreState {
            credentials: vec![Credential::new("g", "gemini", "k")],
            ..Default::default()
        });
        let config = ConversionConfig::builder()
            .gemini_base_url(format!("http://{addr}"))
            .build()
            .unwrap();
        let m = GeminiExtractionModel::new("gemini-2.5-flash", Arc::new(store), &config);
        let src = source();
        let err = m
            .extract(ExtractionRequest {
                source: &src,
                previous_error: None,
            })
            .await
            .unwrap_err();
        match err {
            AttemptError::Transport { detail } => {
                assert!(detail.starts_with("HTTP 503"), "got: {detail}");
                assert!(detail.contains("error body unreadable"), "got: {detail}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error": {"code": 400, "message": "API key not valid"}}"#),
            "API key not valid"
        );
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
    }
}
