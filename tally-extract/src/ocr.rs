//! OCR provider seam and the OCR.space HTTP client.
//!
//! The provider turns a document into text. Two parameter sets exist: the
//! standard first pass, and the enhanced recovery pass that also asks for the
//! word overlay so per-word confidences can be reported.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::OcrError;

pub const DEFAULT_ENDPOINT: &str = "https://api.ocr.space/parse/image";

/// Words under this confidence mark a low-confidence region.
const LOW_CONFIDENCE: f64 = 60.0;

/// A document to recognize.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime = mime_for(&name).to_string();
        Self { name, bytes, mime }
    }

    pub async fn from_path(path: &Path) -> Result<Self, OcrError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| OcrError::File {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        Ok(Self::new(name, bytes))
    }
}

fn mime_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Request options sent with every OCR call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrOptions {
    pub language: String,
    pub overlay: bool,
    pub detect_orientation: bool,
    pub scale: bool,
    pub engine: u8,
    pub table: bool,
}

impl OcrOptions {
    /// First pass: plain text only.
    pub fn standard() -> Self {
        Self {
            language: "eng".to_string(),
            overlay: false,
            detect_orientation: true,
            scale: true,
            engine: 2,
            table: true,
        }
    }

    /// Recovery pass: same as standard plus the word overlay.
    pub fn enhanced() -> Self {
        Self {
            overlay: true,
            ..Self::standard()
        }
    }

    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("language", self.language.clone()),
            ("isOverlayRequired", self.overlay.to_string()),
            ("detectOrientation", self.detect_orientation.to_string()),
            ("scale", self.scale.to_string()),
            ("OCREngine", self.engine.to_string()),
            ("isTable", self.table.to_string()),
        ]
    }
}

/// Word-level confidence summary (0-100 scale, as the provider reports it).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OcrConfidence {
    pub average: f64,
    pub word_count: usize,
    pub has_low_confidence_regions: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrPage {
    pub text: String,
    pub confidence: OcrConfidence,
}

#[async_trait]
pub trait OcrProvider: Send + Sync {
    async fn recognize(
        &self,
        file: &SourceFile,
        api_key: &str,
        options: &OcrOptions,
    ) -> Result<OcrPage, OcrError>;
}

// OCR.space wire format

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrResponse {
    #[serde(default)]
    parsed_results: Vec<ParsedResult>,
    #[serde(default)]
    is_errored_on_processing: bool,
    #[serde(default)]
    error_message: Option<ErrorMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorMessage {
    One(String),
    Many(Vec<String>),
}

impl ErrorMessage {
    fn joined(&self) -> String {
        match self {
            ErrorMessage::One(s) => s.clone(),
            ErrorMessage::Many(v) => v.join(", "),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParsedResult {
    #[serde(default)]
    parsed_text: String,
    #[serde(default)]
    text_overlay: Option<TextOverlay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TextOverlay {
    #[serde(default)]
    lines: Vec<OverlayLine>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OverlayLine {
    #[serde(default)]
    words: Vec<OverlayWord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OverlayWord {
    #[serde(default)]
    confidence: Option<f64>,
}

fn overlay_confidence(overlay: Option<&TextOverlay>) -> OcrConfidence {
    let Some(overlay) = overlay else {
        return OcrConfidence::default();
    };
    let scores: Vec<f64> = overlay
        .lines
        .iter()
        .flat_map(|l| &l.words)
        .filter_map(|w| w.confidence)
        .filter(|c| *c > 0.0)
        .collect();
    if scores.is_empty() {
        return OcrConfidence::default();
    }
    OcrConfidence {
        average: scores.iter().sum::<f64>() / scores.len() as f64,
        word_count: scores.len(),
        has_low_confidence_regions: scores.iter().any(|c| *c < LOW_CONFIDENCE),
    }
}

/// Decode a successful (2xx) response body.
pub fn parse_response(body: &str) -> Result<OcrPage, OcrError> {
    let response: OcrResponse = serde_json::from_str(body)?;
    if response.is_errored_on_processing {
        let message = response
            .error_message
            .map(|m| m.joined())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "Unknown processing error".to_string());
        return Err(OcrError::Processing(message));
    }
    let first = response.parsed_results.into_iter().next().ok_or(OcrError::NoText)?;
    if first.parsed_text.trim().is_empty() {
        return Err(OcrError::NoText);
    }
    Ok(OcrPage {
        confidence: overlay_confidence(first.text_overlay.as_ref()),
        text: first.parsed_text,
    })
}

/// Error details from a non-2xx body, if it carries any.
fn status_details(body: &str) -> String {
    serde_json::from_str::<OcrResponse>(body)
        .ok()
        .and_then(|r| r.error_message)
        .map(|m| m.joined())
        .filter(|m| !m.is_empty())
        .map(|m| format!(" Details: {m}"))
        .unwrap_or_default()
}

/// OCR.space over HTTPS.
#[derive(Clone)]
pub struct OcrSpaceClient {
    http: Client,
    endpoint: String,
}

impl OcrSpaceClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, OcrError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl OcrProvider for OcrSpaceClient {
    async fn recognize(
        &self,
        file: &SourceFile,
        api_key: &str,
        options: &OcrOptions,
    ) -> Result<OcrPage, OcrError> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.mime)?;
        let mut form = Form::new().part("file", part).text("apikey", api_key.to_string());
        for (name, value) in options.form_fields() {
            form = form.text(name, value);
        }

        debug!(file = %file.name, overlay = options.overlay, "OCR request");
        let resp = self.http.post(&self.endpoint).multipart(form).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(OcrError::Status {
                status: status.as_u16(),
                details: status_details(&body),
            });
        }
        let page = parse_response(&body)?;
        info!(file = %file.name, chars = page.text.len(), "OCR text received");
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_sets() {
        let standard = OcrOptions::standard();
        let enhanced = OcrOptions::enhanced();
        assert!(!standard.overlay);
        assert!(enhanced.overlay);
        assert_eq!(enhanced.engine, standard.engine);

        let fields = enhanced.form_fields();
        assert!(fields.contains(&("isOverlayRequired", "true".to_string())));
        assert!(fields.contains(&("OCREngine", "2".to_string())));
        assert!(fields.contains(&("isTable", "true".to_string())));
        assert!(fields.contains(&("language", "eng".to_string())));
    }

    #[test]
    fn test_parse_text_and_confidence() {
        let body = r#"{
            "ParsedResults": [{
                "ParsedText": "15 Jun Grocery Store 45.00 955.00",
                "TextOverlay": {"Lines": [
                    {"Words": [{"WordText": "15", "Confidence": 90}, {"WordText": "Jun", "Confidence": 50}]},
                    {"Words": [{"WordText": "x", "Confidence": 0}]}
                ]}
            }],
            "IsErroredOnProcessing": false
        }"#;
        let page = parse_response(body).unwrap();
        assert!(page.text.starts_with("15 Jun"));
        assert_eq!(page.confidence.word_count, 2);
        assert_eq!(page.confidence.average, 70.0);
        assert!(page.confidence.has_low_confidence_regions);
    }

    #[test]
    fn test_processing_error_is_surfaced() {
        let body = r#"{"IsErroredOnProcessing": true, "ErrorMessage": ["File failed validation", "Bad type"]}"#;
        match parse_response(body) {
            Err(OcrError::Processing(msg)) => assert_eq!(msg, "File failed validation, Bad type"),
            other => panic!("unexpected: {other:?}"),
        }
        let single = r#"{"IsErroredOnProcessing": true, "ErrorMessage": "Timed out"}"#;
        assert!(matches!(parse_response(single), Err(OcrError::Processing(m)) if m == "Timed out"));
    }

    #[test]
    fn test_empty_text_is_no_text() {
        let body = r#"{"ParsedResults": [{"ParsedText": "  "}]}"#;
        assert!(matches!(parse_response(body), Err(OcrError::NoText)));
        assert!(matches!(parse_response("{}"), Err(OcrError::NoText)));
    }

    #[test]
    fn test_status_details() {
        assert_eq!(
            status_details(r#"{"ErrorMessage": ["Invalid API key"]}"#),
            " Details: Invalid API key"
        );
        assert_eq!(status_details("<html>bad gateway</html>"), "");
        let err = OcrError::Status {
            status: 403,
            details: status_details(r#"{"ErrorMessage": ["Invalid API key"]}"#),
        };
        assert_eq!(
            err.to_string(),
            "OCR API request failed with status 403. Details: Invalid API key"
        );
    }

    #[test]
    fn test_mime_from_name() {
        assert_eq!(SourceFile::new("june.PDF", vec![]).mime, "application/pdf");
        assert_eq!(SourceFile::new("scan.jpeg", vec![]).mime, "image/jpeg");
        assert_eq!(SourceFile::new("noext", vec![]).mime, "application/octet-stream");
    }
}
