//! Per-file extraction pipeline.
//!
//! OCR pass 1, classify + parse, optional recovery pass with merge,
//! categorization, reconciliation. Nothing here returns an error: provider
//! and key failures come back as an [`Extraction`] with `error` set and an
//! empty result whose `raw_text` carries the message.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tally_core::{Issuer, ParseResult};
use tally_finance::{CategoryRules, EnrichmentStats, Reconciliation, enrich, load_rules};
use tally_ingest::{ParseContext, ParseRequest, parse_text};
use tracing::{info, warn};

use crate::api_key::{ApiKeySource, key_source_from};
use crate::config::ExtractConfig;
use crate::error::OcrError;
use crate::ocr::{OcrConfidence, OcrOptions, OcrPage, OcrProvider, OcrSpaceClient, SourceFile};
use crate::recovery::{RecoveryPolicy, merge_passes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Requested,
    Pass1Done,
    RecoverySkipped,
    RecoveryAttempted,
    Reconciled,
    Done,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Extraction {
    pub result: ParseResult,
    pub error: Option<String>,
    pub stages: Vec<Stage>,
    pub recovery_performed: bool,
    pub original_count: usize,
    pub recovered_count: usize,
    pub reconciliation: Option<Reconciliation>,
    pub enrichment: EnrichmentStats,
    /// Pass-1 word confidence (empty unless the provider sent an overlay)
    pub ocr_confidence: OcrConfidence,
    /// Word confidence of the enhanced pass, when it ran
    pub recovery_confidence: Option<OcrConfidence>,
}

impl Extraction {
    fn failed(message: String, stages: Vec<Stage>) -> Self {
        Self {
            result: ParseResult::empty(message.clone()),
            error: Some(message),
            stages,
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

pub struct Extractor {
    ocr: Arc<dyn OcrProvider>,
    keys: Arc<dyn ApiKeySource>,
    rules: Arc<CategoryRules>,
    config: ExtractConfig,
}

impl Extractor {
    pub fn new(
        ocr: Arc<dyn OcrProvider>,
        keys: Arc<dyn ApiKeySource>,
        rules: Arc<CategoryRules>,
        config: ExtractConfig,
    ) -> Self {
        Self {
            ocr,
            keys,
            rules,
            config,
        }
    }

    /// Wire up the OCR.space client, key source and rules from `config`.
    pub fn from_config(config: ExtractConfig) -> Result<Self, OcrError> {
        let ocr = OcrSpaceClient::new(
            config.ocr.endpoint.clone(),
            Duration::from_millis(config.ocr.timeout_ms),
        )?;
        let keys = key_source_from(&config.key);
        let rules = load_rules(&config.rules.source());
        Ok(Self::new(Arc::new(ocr), keys, Arc::new(rules), config))
    }

    pub fn rules(&self) -> &CategoryRules {
        &self.rules
    }

    pub fn policy(&self) -> &RecoveryPolicy {
        &self.config.recovery
    }

    async fn recognize(
        &self,
        file: &SourceFile,
        key: &str,
        options: &OcrOptions,
    ) -> Result<OcrPage, OcrError> {
        with_timeout(
            self.config.ocr.timeout_ms,
            self.ocr.recognize(file, key, options),
        )
        .await
    }

    pub async fn extract(
        &self,
        file: &SourceFile,
        bank_override: Option<Issuer>,
        use_recovery: bool,
    ) -> Extraction {
        let mut stages = vec![Stage::Requested];
        info!(file = %file.name, "extraction requested");

        let key = match self.keys.api_key().await {
            Ok(key) => key,
            Err(err) => {
                warn!(error = %err, "OCR API key unavailable");
                return Extraction::failed(
                    format!("OCR functionality is disabled. Failed to retrieve API key: {err}"),
                    stages,
                );
            }
        };

        let page = match self
            .recognize(file, &key, &self.config.ocr.standard_options())
            .await
        {
            Ok(page) => page,
            Err(err) => {
                warn!(file = %file.name, error = %err, "OCR pass failed");
                return Extraction::failed(format!("OCR failed: {err}"), stages);
            }
        };

        let ctx = ParseContext::default().with_source(file.name.clone());
        let mut request = ParseRequest::new(ctx);
        request.bank_override = bank_override;

        let mut parsed = parse_text(&page.text, &request);
        stages.push(Stage::Pass1Done);
        let original_count = parsed.transactions.len();
        info!(file = %file.name, rows = original_count, "first pass done");

        let mut recovery_performed = false;
        let mut recovered_count = 0;
        let mut recovery_confidence = None;

        if use_recovery && self.config.recovery.needs_recovery(original_count) {
            stages.push(Stage::RecoveryAttempted);
            // the second pass reuses what pass 1 detected
            let mut second_request = request.clone();
            if parsed.detected_bank != Issuer::Unknown {
                second_request.bank_override = Some(parsed.detected_bank);
            }
            match self
                .recognize(file, &key, &self.config.ocr.enhanced_options())
                .await
            {
                Ok(enhanced) => {
                    let mut second = parse_text(&enhanced.text, &second_request);
                    let (merged, added) = merge_passes(
                        std::mem::take(&mut parsed.transactions),
                        std::mem::take(&mut second.transactions),
                        &self.config.recovery,
                    );
                    if parsed.detected_bank == Issuer::Unknown {
                        parsed = second;
                    }
                    parsed.transactions = merged;
                    recovery_performed = true;
                    recovered_count = added;
                    recovery_confidence = Some(enhanced.confidence);
                    info!(file = %file.name, added, "recovery pass merged");
                }
                Err(err) => {
                    warn!(file = %file.name, error = %err, "recovery pass failed, keeping first pass");
                }
            }
        } else {
            stages.push(Stage::RecoverySkipped);
        }

        let result = enrich(&self.rules, &parsed).result;
        let mut extraction = self.finish(result, stages);
        extraction.recovery_performed = recovery_performed;
        extraction.original_count = original_count;
        extraction.recovered_count = recovered_count;
        extraction.ocr_confidence = page.confidence;
        extraction.recovery_confidence = recovery_confidence;
        extraction
    }

    /// The pipeline on already recognized text: parse, categorize, reconcile.
    pub fn extract_text(&self, text: &str, bank_override: Option<Issuer>) -> Extraction {
        let mut request = ParseRequest::new(ParseContext::default());
        request.bank_override = bank_override;
        self.extract_text_with(text, &request)
    }

    pub fn extract_text_with(&self, text: &str, request: &ParseRequest) -> Extraction {
        let enriched = enrich(&self.rules, &parse_text(text, request));
        let original_count = enriched.result.transactions.len();
        let stages = vec![Stage::Requested, Stage::Pass1Done, Stage::RecoverySkipped];
        let mut extraction = self.finish(enriched.result, stages);
        extraction.original_count = original_count;
        extraction
    }

    fn finish(&self, mut result: ParseResult, mut stages: Vec<Stage>) -> Extraction {
        let reconciliation = if self.config.reconcile.enabled {
            let rec = tally_finance::reconcile(
                &result.transactions,
                &result.summary,
                self.config.reconcile.tolerance,
            );
            tally_finance::reconcile::apply(&mut result.transactions, &rec);
            stages.push(Stage::Reconciled);
            Some(rec)
        } else {
            None
        };
        stages.push(Stage::Done);

        Extraction {
            enrichment: EnrichmentStats::from_transactions(&result.transactions),
            result,
            stages,
            reconciliation,
            ..Extraction::default()
        }
    }
}

async fn with_timeout<F>(timeout_ms: u64, call: F) -> Result<OcrPage, OcrError>
where
    F: Future<Output = Result<OcrPage, OcrError>>,
{
    match tokio::time::timeout(Duration::from_millis(timeout_ms), call).await {
        Ok(result) => result,
        Err(_) => Err(OcrError::Timeout(timeout_ms)),
    }
}
