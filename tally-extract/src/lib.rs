//! tally-extract: OCR-backed extraction pipeline.
//!
//! Wraps an [`OcrProvider`] and an [`ApiKeySource`] around the offline
//! parse/enrich/reconcile pipeline, with a second recovery pass for thin
//! first-pass results.

pub mod api_key;
pub mod config;
pub mod error;
pub mod ocr;
pub mod orchestrator;
pub mod recovery;

pub use api_key::{ApiKeySource, CachedKey, EnvKey, KeyServiceClient, StaticKey, key_source_from};
pub use config::{ExtractConfig, KeyConfig, OcrConfig, ReconcileConfig, RulesConfig};
pub use error::{KeyError, OcrError};
pub use ocr::{OcrConfidence, OcrOptions, OcrPage, OcrProvider, OcrSpaceClient, SourceFile};
pub use orchestrator::{Extraction, Extractor, Stage};
pub use recovery::{RecoveryPolicy, merge_passes};
