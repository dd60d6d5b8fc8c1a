//! Source resolution: turn a `sourceUri` into bytes plus a media type.
//!
//! Three forms are accepted:
//!
//! * `data:<mime>;base64,<payload>`: the document is embedded in the request
//! * `http://` / `https://`: downloaded with the configured timeout
//! * anything else: a local file path
//!
//! The media type is sniffed from magic bytes so a mislabelled upload is
//! caught here rather than by the model provider.

use crate::error::Pdf2DocxError;
use crate::output::decode_data_uri;
use std::path::PathBuf;
use tracing::{debug, info};

/// A source document held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// File name or URL tail, for logs.
    pub name: String,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Check if the input string is a data URI.
pub fn is_data_uri(input: &str) -> bool {
    input.starts_with("data:")
}

/// Media type from magic bytes, for the formats models accept as attachments.
pub fn sniff_mime_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"%PDF") {
        Some("application/pdf")
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        Some("image/tiff")
    } else {
        None
    }
}

/// Resolve `source_uri` to an in-memory document.
pub async fn resolve_source(
    source_uri: &str,
    timeout_secs: u64,
) -> Result<SourceDocument, Pdf2DocxError> {
    let (bytes, declared, name) = if is_data_uri(source_uri) {
        let (mime, bytes) =
            decode_data_uri(source_uri).map_err(|reason| Pdf2DocxError::InvalidInput {
                input: truncate(source_uri),
                reason,
            })?;
        (bytes, Some(mime), "inline".to_string())
    } else if is_url(source_uri) {
        let bytes = download_url(source_uri, timeout_secs).await?;
        (bytes, None, extract_filename(source_uri))
    } else {
        let bytes = read_local(source_uri).await?;
        let name = PathBuf::from(source_uri)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| source_uri.to_string());
        (bytes, None, name)
    };

    let mime_type = match sniff_mime_type(&bytes) {
        Some(m) => m.to_string(),
        None => match declared {
            // Trust an explicit declaration on inline payloads we cannot sniff.
            Some(m) if !m.is_empty() => m,
            _ => {
                return Err(Pdf2DocxError::UnsupportedDocument {
                    source_uri: truncate(source_uri),
                    magic: bytes.iter().take(4).copied().collect(),
                })
            }
        },
    };

    debug!(
        "Resolved source {} → {} bytes of {}",
        name,
        bytes.len(),
        mime_type
    );
    Ok(SourceDocument {
        bytes,
        mime_type,
        name,
    })
}

/// Read a local file, mapping I/O errors to actionable variants.
async fn read_local(path_str: &str) -> Result<Vec<u8>, Pdf2DocxError> {
    let path = PathBuf::from(path_str);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(Pdf2DocxError::PermissionDenied { path })
        }
        Err(_) => Err(Pdf2DocxError::FileNotFound { path }),
    }
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, Pdf2DocxError> {
    info!("Downloading source from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Pdf2DocxError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Pdf2DocxError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Pdf2DocxError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Pdf2DocxError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Pdf2DocxError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded".to_string()
}

/// Keep error messages readable when the source is a large data URI.
fn truncate(s: &str) -> String {
    const MAX: usize = 64;
    if s.len() <= MAX {
        return s.to_string();
    }
    let mut end = MAX;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}
