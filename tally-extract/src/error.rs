//! Error types at the OCR and key-service boundaries

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("cannot read {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("OCR request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OCR API request failed with status {status}.{details}")]
    Status { status: u16, details: String },

    #[error("OCR processing error: {0}")]
    Processing(String),

    #[error("invalid OCR response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("OCR returned no text")]
    NoText,

    #[error("OCR request timed out after {0} ms")]
    Timeout(u64),
}

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("OCR API key was not returned: {0}")]
    Missing(String),

    #[error("environment variable {0} is not set")]
    Env(String),

    #[error("key service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("key service returned status {0}")]
    Status(u16),
}
