use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tally_finance::{DEFAULT_TOLERANCE, RulesSource};

use crate::ocr::{DEFAULT_ENDPOINT, OcrOptions};
use crate::recovery::RecoveryPolicy;

pub const DEFAULT_KEY_ENV: &str = "TALLY_OCR_API_KEY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub ocr: OcrConfig,
    pub key: KeyConfig,
    pub recovery: RecoveryPolicy,
    pub rules: RulesConfig,
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub endpoint: String,
    pub language: String,
    pub engine: u8,
    /// Per OCR call, enforced around the whole request
    pub timeout_ms: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            language: "eng".to_string(),
            engine: 2,
            timeout_ms: 60_000,
        }
    }
}

impl OcrConfig {
    pub fn standard_options(&self) -> OcrOptions {
        OcrOptions {
            language: self.language.clone(),
            engine: self.engine,
            ..OcrOptions::standard()
        }
    }

    pub fn enhanced_options(&self) -> OcrOptions {
        OcrOptions {
            language: self.language.clone(),
            engine: self.engine,
            ..OcrOptions::enhanced()
        }
    }
}

/// Where the OCR API key comes from. First match wins: `api_key`, then the
/// environment variable, then the key service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    pub api_key: Option<String>,
    pub env_var: String,
    pub service_url: Option<String>,
    pub service_token: Option<String>,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            env_var: DEFAULT_KEY_ENV.to_string(),
            service_url: None,
            service_token: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub learned_patterns: Option<PathBuf>,
    pub model_artifacts: Option<PathBuf>,
}

impl RulesConfig {
    pub fn source(&self) -> RulesSource {
        if self.learned_patterns.is_none() && self.model_artifacts.is_none() {
            return RulesSource::Builtin;
        }
        RulesSource::Files {
            learned_patterns: self.learned_patterns.clone(),
            model_artifacts: self.model_artifacts.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub enabled: bool,
    pub tolerance: f64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}
